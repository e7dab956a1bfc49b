use std::collections::HashMap;

use serde::Serialize;

use super::process::ProcessRow;

pub const UNKNOWN_OWNER: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerSummary {
    pub owner: String,
    pub process_count: usize,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Groups rows by owner, heaviest CPU users first.
pub fn aggregate_by_owner(rows: &[ProcessRow]) -> Vec<OwnerSummary> {
    let mut by_owner: HashMap<&str, OwnerSummary> = HashMap::new();
    for row in rows {
        let owner = if row.owner.is_empty() {
            UNKNOWN_OWNER
        } else {
            row.owner.as_str()
        };
        let entry = by_owner.entry(owner).or_insert_with(|| OwnerSummary {
            owner: owner.to_string(),
            process_count: 0,
            cpu_percent: 0.0,
            memory_bytes: 0,
        });
        entry.process_count += 1;
        entry.cpu_percent += row.cpu_percent;
        entry.memory_bytes = entry.memory_bytes.saturating_add(row.memory_bytes);
    }

    let mut out: Vec<OwnerSummary> = by_owner.into_values().collect();
    out.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then_with(|| a.owner.cmp(&b.owner))
    });
    out
}
