use std::time::{Duration, SystemTime, UNIX_EPOCH};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

/// Left-aligns `s` in a column of `width` display cells, truncating if needed.
pub fn pad_unicode(s: &str, width: usize) -> String {
    let truncated = truncate_unicode(s, width);
    let fill = width.saturating_sub(truncated.width());
    format!("{truncated}{}", " ".repeat(fill))
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_rate(kb_per_sec: f64) -> String {
    if kb_per_sec >= 1024.0 {
        format!("{:.1} MB/s", kb_per_sec / 1024.0)
    } else {
        format!("{:.1} KB/s", kb_per_sec)
    }
}

/// Renders seconds since the epoch as `HH:MM:SS` (UTC) when the process
/// started today, else as elapsed days.
pub fn format_start_time(start_secs: u64, now: SystemTime) -> String {
    if start_secs == 0 {
        return String::new();
    }
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let age = now_secs.saturating_sub(start_secs);
    if age >= 86_400 {
        return format!("{}d ago", age / 86_400);
    }
    let of_day = start_secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        of_day / 3600,
        (of_day % 3600) / 60,
        of_day % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn truncation_marks_ellipsis() {
        assert_eq!(truncate_unicode("firefox-bin", 6), "firef\u{2026}");
        assert_eq!(truncate_unicode("sh", 6), "sh");
        assert_eq!(pad_unicode("sh", 4), "sh  ");
    }

    #[test]
    fn start_time_today_and_older() {
        let now = UNIX_EPOCH + Duration::from_secs(10 * 86_400 + 3_700);
        assert_eq!(format_start_time(10 * 86_400 + 3_661, now), "01:01:01");
        assert_eq!(format_start_time(86_400, now), "9d ago");
        assert_eq!(format_start_time(0, now), "");
    }
}
