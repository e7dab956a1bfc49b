use super::process::ProcessRow;

/// Decides which rows count as system processes.
///
/// A row is a system process when its pid is below `reserved_pid_below` or
/// its owner is one of `system_accounts`. Rows with no resolved owner are
/// judged by pid alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationPolicy {
    pub system_accounts: Vec<String>,
    pub reserved_pid_below: u32,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            system_accounts: vec!["root".into(), "systemd+".into(), "messagebus".into()],
            reserved_pid_below: 100,
        }
    }
}

impl ClassificationPolicy {
    pub fn is_system(&self, row: &ProcessRow) -> bool {
        if row.pid < self.reserved_pid_below {
            return true;
        }
        !row.owner.is_empty() && self.system_accounts.iter().any(|a| *a == row.owner)
    }
}

/// Case-insensitive substring match over pid, name, owner and command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    needle: String,
}

impl SearchFilter {
    pub fn new(text: &str) -> Self {
        Self {
            needle: text.trim().to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, row: &ProcessRow) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let haystack = format!("{} {} {} {}", row.pid, row.name, row.owner, row.command);
        haystack.to_lowercase().contains(&self.needle)
    }
}

/// Visibility and search applied together to one pass.
#[derive(Debug, Clone)]
pub struct RowFilter<'a> {
    pub policy: &'a ClassificationPolicy,
    pub show_system: bool,
    pub search: SearchFilter,
}

impl RowFilter<'_> {
    pub fn admits(&self, row: &ProcessRow) -> bool {
        (self.show_system || !self.policy.is_system(row)) && self.search.matches(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::process::ProcessState;

    fn row(pid: u32, name: &str, owner: &str, command: &str) -> ProcessRow {
        ProcessRow {
            pid,
            name: name.into(),
            owner: owner.into(),
            cpu_percent: 0.0,
            memory_bytes: 0,
            status: ProcessState::Sleeping,
            priority: 0,
            thread_count: 1,
            open_handles: 0,
            start_time: 0,
            command: command.into(),
        }
    }

    #[test]
    fn low_pid_and_system_owner_are_system() {
        let policy = ClassificationPolicy::default();
        assert!(policy.is_system(&row(2, "kthreadd", "", "")));
        assert!(policy.is_system(&row(812, "dbus-daemon", "messagebus", "")));
        assert!(!policy.is_system(&row(4242, "vim", "alice", "vim notes.md")));
        assert!(!policy.is_system(&row(4243, "mystery", "", "")));
    }

    #[test]
    fn hide_system_keeps_only_normal_rows() {
        let policy = ClassificationPolicy::default();
        let rows = [row(1, "init", "root", "/sbin/init"), row(5000, "bash", "alice", "bash")];

        let hide = RowFilter {
            policy: &policy,
            show_system: false,
            search: SearchFilter::default(),
        };
        let kept: Vec<u32> = rows.iter().filter(|r| hide.admits(r)).map(|r| r.pid).collect();
        assert_eq!(kept, vec![5000]);

        let show = RowFilter {
            show_system: true,
            ..hide
        };
        assert_eq!(rows.iter().filter(|r| show.admits(r)).count(), 2);
    }

    #[test]
    fn search_is_case_insensitive_over_all_text_fields() {
        let r = row(4242, "Firefox", "alice", "/usr/lib/firefox --new-tab");
        assert!(SearchFilter::new("FIREFOX").matches(&r));
        assert!(SearchFilter::new("ALICE").matches(&r));
        assert!(SearchFilter::new("4242").matches(&r));
        assert!(SearchFilter::new("  new-tab ").matches(&r));
        assert!(!SearchFilter::new("chrome").matches(&r));
        assert!(SearchFilter::new("").matches(&r));
    }
}
