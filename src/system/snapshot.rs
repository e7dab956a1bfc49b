use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

use super::history::HistoryRing;
use super::owners::{OwnerSummary, aggregate_by_owner};
use super::process::ProcessRow;
use super::rate::NetworkRates;
use super::sort::{SortKey, SortOrder, sorted_rows};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostSummary {
    pub cpu_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub swap_used: u64,
    pub swap_total: u64,
    pub logical_cpus: usize,
    pub network: NetworkRates,
    /// Every enumerated process, before visibility and search filtering.
    pub process_count: usize,
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0) as f32
    }
}

impl HostSummary {
    pub fn memory_percent(&self) -> f32 {
        percent(self.memory_used, self.memory_total)
    }

    pub fn swap_percent(&self) -> f32 {
        percent(self.swap_used, self.swap_total)
    }

    pub fn status(&self) -> StatusSummary {
        StatusSummary {
            process_count: self.process_count,
            cpu_percent: self.cpu_percent,
            memory_percent: self.memory_percent(),
        }
    }
}

/// The status-bar triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSummary {
    pub process_count: usize,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processes: {}    CPU: {:.1}%    Memory: {:.1}%",
            self.process_count, self.cpu_percent, self.memory_percent
        )
    }
}

/// Result of one sampling pass, shared read-only with every consumer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub pass: u64,
    pub taken_at: SystemTime,
    /// Filtered rows in ascending pid order.
    pub rows: Vec<ProcessRow>,
    pub host: HostSummary,
    pub history: HistoryRing,
    /// Set when the pass that should have replaced this one is still
    /// running past its budget; the data is from `pass`.
    pub stale: bool,
}

impl Snapshot {
    pub fn empty(history_capacity: usize) -> Self {
        Snapshot {
            pass: 0,
            taken_at: SystemTime::now(),
            rows: Vec::new(),
            host: HostSummary::default(),
            history: HistoryRing::new(history_capacity),
            stale: false,
        }
    }

    /// Copy of `self` republished while a pass is overdue.
    pub fn marked_stale(&self) -> Self {
        Snapshot {
            stale: true,
            ..self.clone()
        }
    }

    pub fn sorted(&self, key: SortKey, order: SortOrder) -> Vec<&ProcessRow> {
        sorted_rows(&self.rows, key, order)
    }

    pub fn owners(&self) -> Vec<OwnerSummary> {
        aggregate_by_owner(&self.rows)
    }

    pub fn row(&self, pid: u32) -> Option<&ProcessRow> {
        self.rows
            .binary_search_by_key(&pid, |r| r.pid)
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn status(&self) -> StatusSummary {
        self.host.status()
    }
}
