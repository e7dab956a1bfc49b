//! Plain-text rendering of snapshots for the command-line surface.

use std::fmt::Write;
use std::time::SystemTime;

use crate::bridge::services::ServiceUnit;
use crate::bridge::startup::StartupEntry;
use crate::format::{format_bytes, format_rate, format_start_time, pad_unicode, truncate_unicode};
use crate::system::details::ProcessDetails;
use crate::system::history::Metric;
use crate::system::owners::OwnerSummary;
use crate::system::process::ProcessRow;
use crate::system::snapshot::Snapshot;

const COMMAND_WIDTH: usize = 48;

pub fn process_table(rows: &[&ProcessRow], now: SystemTime) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>7} {} {} {:>6} {:>9} {} {:>4} {:>4} {:>5} {:>9}  COMMAND",
        "PID",
        pad_unicode("NAME", 20),
        pad_unicode("USER", 12),
        "CPU%",
        "MEM",
        pad_unicode("STATUS", 9),
        "NI",
        "THR",
        "FDS",
        "START",
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:>7} {} {} {:>6.1} {:>9} {} {:>4} {:>4} {:>5} {:>9}  {}",
            row.pid,
            pad_unicode(&row.name, 20),
            pad_unicode(&row.owner, 12),
            row.cpu_percent,
            format_bytes(row.memory_bytes),
            pad_unicode(row.status.label(), 9),
            row.priority,
            row.thread_count,
            row.open_handles,
            format_start_time(row.start_time, now),
            truncate_unicode(&row.command, COMMAND_WIDTH),
        );
    }
    out
}

pub fn owner_table(owners: &[OwnerSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {:>6} {:>7} {:>10}",
        pad_unicode("USER", 16),
        "PROCS",
        "CPU%",
        "MEM"
    );
    for owner in owners {
        let _ = writeln!(
            out,
            "{} {:>6} {:>7.1} {:>10}",
            pad_unicode(&owner.owner, 16),
            owner.process_count,
            owner.cpu_percent,
            format_bytes(owner.memory_bytes),
        );
    }
    out
}

/// Status line followed by a one-line host summary.
pub fn host_lines(snapshot: &Snapshot) -> String {
    let host = &snapshot.host;
    let mut out = String::new();
    if snapshot.stale {
        let _ = writeln!(
            out,
            "{}    (stale: pass {} overdue)",
            snapshot.status(),
            snapshot.pass + 1
        );
    } else {
        let _ = writeln!(out, "{}", snapshot.status());
    }
    let _ = writeln!(
        out,
        "Swap: {:.1}%    Net in: {}    Net out: {}    CPUs: {}",
        host.swap_percent(),
        format_rate(host.network.received_kbps),
        format_rate(host.network.sent_kbps),
        host.logical_cpus,
    );
    out
}

/// Last few history points per metric, oldest first.
pub fn history_lines(snapshot: &Snapshot, points: usize) -> String {
    let mut out = String::new();
    for metric in Metric::ALL {
        let series = snapshot.history.snapshot(metric);
        let tail = &series[series.len().saturating_sub(points)..];
        let values = tail
            .iter()
            .map(|v| format!("{v:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{} {values}", pad_unicode(metric.label(), 13));
    }
    out
}

pub fn details(details: &ProcessDetails, now: SystemTime) -> String {
    fn opt<T: ToString>(value: Option<T>) -> String {
        value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
    }

    let mut out = String::new();
    let _ = writeln!(out, "PID:          {}", details.pid);
    let _ = writeln!(out, "Parent:       {}", opt(details.parent));
    let _ = writeln!(out, "Name:         {}", details.name);
    let _ = writeln!(out, "User:         {}", details.owner);
    let _ = writeln!(out, "Status:       {}", details.status.label());
    let _ = writeln!(
        out,
        "Executable:   {}",
        opt(details.executable.as_ref().map(|p| p.display()))
    );
    let _ = writeln!(
        out,
        "Working dir:  {}",
        opt(details.working_dir.as_ref().map(|p| p.display()))
    );
    let _ = writeln!(out, "Command:      {}", details.command);
    let _ = writeln!(out, "Memory:       {}", format_bytes(details.memory_bytes));
    let _ = writeln!(
        out,
        "Virtual:      {}",
        format_bytes(details.virtual_memory_bytes)
    );
    let _ = writeln!(out, "Nice:         {}", opt(details.priority));
    let _ = writeln!(out, "Threads:      {}", opt(details.thread_count));
    let _ = writeln!(out, "Handles:      {}", opt(details.open_handles));
    let _ = writeln!(
        out,
        "Started:      {}",
        format_start_time(details.start_time, now)
    );
    let _ = writeln!(out, "Running for:  {}s", details.run_time_secs);
    out
}

pub fn service_table(units: &[ServiceUnit]) -> String {
    let mut out = String::new();
    for unit in units {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            pad_unicode(&unit.unit, 40),
            pad_unicode(&unit.load, 9),
            pad_unicode(&unit.active, 9),
            pad_unicode(&unit.sub, 9),
            unit.description,
        );
    }
    out
}

pub fn startup_table(entries: &[StartupEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{} {} {} {}  {}",
            pad_unicode(&entry.name, 28),
            pad_unicode(if entry.enabled { "Yes" } else { "No" }, 4),
            pad_unicode(entry.scope.label(), 7),
            pad_unicode(&entry.exec, 40),
            entry.path.display(),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::owners::aggregate_by_owner;
    use crate::system::process::ProcessState;

    fn row(pid: u32, owner: &str, cpu: f32) -> ProcessRow {
        ProcessRow {
            pid,
            name: format!("worker-{pid}"),
            owner: owner.into(),
            cpu_percent: cpu,
            memory_bytes: 2 * 1024 * 1024,
            status: ProcessState::Running,
            priority: 0,
            thread_count: 4,
            open_handles: 12,
            start_time: 0,
            command: "/usr/bin/worker --queue default".into(),
        }
    }

    #[test]
    fn table_has_header_and_one_line_per_row() {
        let rows = [row(4100, "alice", 12.5), row(4200, "bob", 0.0)];
        let refs: Vec<&ProcessRow> = rows.iter().collect();
        let table = process_table(&refs, SystemTime::now());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("PID"));
        assert!(lines[1].contains("worker-4100"));
        assert!(lines[1].contains("12.5"));
        assert!(lines[1].contains("2.0 MB"));
    }

    #[test]
    fn owner_table_lists_each_owner() {
        let rows = [row(1, "alice", 1.0), row(2, "alice", 2.0), row(3, "", 0.0)];
        let table = owner_table(&aggregate_by_owner(&rows));
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("(unknown)"));
    }

    #[test]
    fn history_lines_cover_every_metric() {
        let snapshot = Snapshot::empty(60);
        assert_eq!(
            history_lines(&snapshot, 5).lines().count(),
            Metric::ALL.len()
        );
    }

    #[test]
    fn stale_snapshot_is_flagged_in_host_lines() {
        let fresh = Snapshot {
            pass: 7,
            ..Snapshot::empty(60)
        };
        assert!(!host_lines(&fresh).contains("stale"));
        let first = host_lines(&fresh.marked_stale());
        assert!(first.lines().next().unwrap().ends_with("(stale: pass 8 overdue)"));
    }
}
