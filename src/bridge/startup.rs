use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::BridgeError;

const SECTION: &str = "Desktop Entry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StartupScope {
    User,
    System,
}

impl StartupScope {
    pub fn label(self) -> &'static str {
        match self {
            StartupScope::User => "User",
            StartupScope::System => "System",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupEntry {
    pub name: String,
    pub exec: String,
    pub enabled: bool,
    pub scope: StartupScope,
    pub path: PathBuf,
}

/// Keys of interest from the `[Desktop Entry]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopFields {
    pub name: Option<String>,
    pub exec: String,
    pub hidden: bool,
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .map(str::trim)
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Returns `None` when the file has no keys under `[Desktop Entry]`.
pub fn parse_desktop(text: &str) -> Option<DesktopFields> {
    let mut in_section = false;
    let mut seen_key = false;
    let mut fields = DesktopFields::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = section_header(line) {
            in_section = name == SECTION;
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        seen_key = true;
        match key.trim() {
            "Name" => fields.name = Some(value.trim().to_string()),
            "Exec" => fields.exec = value.trim().to_string(),
            "Hidden" => fields.hidden = is_true(value),
            _ => {}
        }
    }

    seen_key.then_some(fields)
}

fn desktop_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::trace!(dir = %dir.display(), %err, "autostart dir not readable");
            return Vec::new();
        }
    };
    let mut out: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("desktop"))
        .collect();
    out.sort();
    out
}

fn load_dir(dir: &Path, scope: StartupScope, out: &mut Vec<StartupEntry>) {
    for path in desktop_files(dir) {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        let Some(fields) = parse_desktop(&text) else {
            continue;
        };
        let name = fields.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });
        out.push(StartupEntry {
            name,
            exec: fields.exec,
            enabled: !fields.hidden,
            scope,
            path,
        });
    }
}

/// Lists user entries first, then each system directory in order.
pub fn scan(user_dir: Option<&Path>, system_dirs: &[PathBuf]) -> Vec<StartupEntry> {
    let mut entries = Vec::new();
    if let Some(dir) = user_dir {
        load_dir(dir, StartupScope::User, &mut entries);
    }
    for dir in system_dirs {
        load_dir(dir, StartupScope::System, &mut entries);
    }
    entries
}

/// Flips `Hidden=` for a user-scope entry. Returns the new enabled state.
pub fn toggle(path: &Path, user_dir: &Path) -> Result<bool, BridgeError> {
    let path = fs::canonicalize(path)?;
    let user_dir = fs::canonicalize(user_dir)?;
    if path.parent() != Some(user_dir.as_path()) {
        return Err(BridgeError::Rejected(format!(
            "{} is not a user autostart entry",
            path.display()
        )));
    }

    let text = fs::read_to_string(&path)?;
    let (rewritten, enabled) = flip_hidden(&text).ok_or_else(|| {
        BridgeError::Rejected(format!("{} has no [{SECTION}] section", path.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, rewritten)?;
    if let Err(err) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }

    tracing::info!(path = %path.display(), enabled, "startup entry toggled");
    Ok(enabled)
}

/// Rewrites `text` with the opposite `Hidden=` value. `None` when there is
/// no `[Desktop Entry]` section to edit.
fn flip_hidden(text: &str) -> Option<(String, bool)> {
    let lines: Vec<&str> = text.lines().collect();

    let mut in_section = false;
    let mut found_section = false;
    let mut section_end = lines.len();
    let mut hidden = false;
    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if let Some(name) = section_header(line) {
            if in_section {
                section_end = i;
            }
            in_section = name == SECTION;
            found_section |= in_section;
            continue;
        }
        if in_section && let Some(value) = line.strip_prefix("Hidden=") {
            hidden = is_true(value);
        }
    }
    if !found_section {
        return None;
    }

    let replacement = format!("Hidden={}", !hidden);
    let mut out = Vec::with_capacity(lines.len() + 1);
    let mut in_section = false;
    let mut written = false;
    for (i, raw) in lines.iter().enumerate() {
        if i == section_end && !written {
            out.push(replacement.clone());
            written = true;
        }
        let line = raw.trim();
        if let Some(name) = section_header(line) {
            in_section = name == SECTION;
        } else if in_section && line.starts_with("Hidden=") {
            out.push(replacement.clone());
            written = true;
            continue;
        }
        out.push((*raw).to_string());
    }
    if !written {
        out.push(replacement);
    }

    let mut rewritten = out.join("\n");
    rewritten.push('\n');
    Some((rewritten, hidden))
}
