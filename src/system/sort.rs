use std::cmp::Ordering;

use super::process::ProcessRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Pid,
    Name,
    Owner,
    #[default]
    Cpu,
    Memory,
    Status,
    Priority,
    Threads,
    Handles,
    StartTime,
    Command,
}

impl SortKey {
    pub const ALL: [SortKey; 11] = [
        SortKey::Pid,
        SortKey::Name,
        SortKey::Owner,
        SortKey::Cpu,
        SortKey::Memory,
        SortKey::Status,
        SortKey::Priority,
        SortKey::Threads,
        SortKey::Handles,
        SortKey::StartTime,
        SortKey::Command,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Pid => "PID",
            SortKey::Name => "Name",
            SortKey::Owner => "User",
            SortKey::Cpu => "CPU",
            SortKey::Memory => "Memory",
            SortKey::Status => "Status",
            SortKey::Priority => "Nice",
            SortKey::Threads => "Threads",
            SortKey::Handles => "Handles",
            SortKey::StartTime => "Start",
            SortKey::Command => "Command",
        }
    }

    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pid" => SortKey::Pid,
            "name" => SortKey::Name,
            "user" | "owner" => SortKey::Owner,
            "mem" | "memory" => SortKey::Memory,
            "status" => SortKey::Status,
            "nice" | "priority" => SortKey::Priority,
            "threads" => SortKey::Threads,
            "fds" | "handles" => SortKey::Handles,
            "start" | "start_time" => SortKey::StartTime,
            "cmd" | "command" => SortKey::Command,
            _ => SortKey::Cpu,
        }
    }

    fn compare(self, a: &ProcessRow, b: &ProcessRow) -> Ordering {
        match self {
            SortKey::Pid => a.pid.cmp(&b.pid),
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Owner => a.owner.cmp(&b.owner),
            SortKey::Cpu => a.cpu_percent.total_cmp(&b.cpu_percent),
            SortKey::Memory => a.memory_bytes.cmp(&b.memory_bytes),
            SortKey::Status => a.status.label().cmp(b.status.label()),
            SortKey::Priority => a.priority.cmp(&b.priority),
            SortKey::Threads => a.thread_count.cmp(&b.thread_count),
            SortKey::Handles => a.open_handles.cmp(&b.open_handles),
            SortKey::StartTime => a.start_time.cmp(&b.start_time),
            SortKey::Command => a.command.cmp(&b.command),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Orders `rows` by `key`; ties always fall back to ascending pid.
///
/// Pure projection: the input is left untouched.
pub fn sorted_rows(rows: &[ProcessRow], key: SortKey, order: SortOrder) -> Vec<&ProcessRow> {
    let mut out: Vec<&ProcessRow> = rows.iter().collect();
    out.sort_by(|a, b| {
        let primary = match order {
            SortOrder::Ascending => key.compare(a, b),
            SortOrder::Descending => key.compare(b, a),
        };
        primary.then_with(|| a.pid.cmp(&b.pid))
    });
    out
}
