use std::collections::BTreeSet;
use std::fmt;

use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
    Stop,
    Continue,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Stop => "SIGSTOP",
            Signal::Continue => "SIGCONT",
        }
    }
}

/// Set of logical processor indices a process may run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuSet(BTreeSet<usize>);

impl CpuSet {
    pub fn all(logical_cpus: usize) -> Self {
        CpuSet((0..logical_cpus).collect())
    }

    pub fn from_indices<I>(indices: I, logical_cpus: usize) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = usize>,
    {
        let set: BTreeSet<usize> = indices.into_iter().collect();
        if set.is_empty() {
            return Err(ActionError::invalid("affinity needs at least one processor"));
        }
        if let Some(&max) = set.last()
            && max >= logical_cpus
        {
            return Err(ActionError::invalid(format!(
                "processor {max} out of range (host has {logical_cpus})"
            )));
        }
        Ok(CpuSet(set))
    }

    /// Parses `*`, `all`, or a comma list with ranges such as `0,2-3`.
    pub fn parse(text: &str, logical_cpus: usize) -> Result<Self, ActionError> {
        let text = text.trim();
        if text == "*" || text.eq_ignore_ascii_case("all") {
            return Self::from_indices(0..logical_cpus, logical_cpus);
        }

        let mut indices = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_index(lo, logical_cpus)?;
                    let hi = parse_index(hi, logical_cpus)?;
                    if lo > hi {
                        return Err(ActionError::invalid(format!("empty range `{part}`")));
                    }
                    indices.extend(lo..=hi);
                }
                None => indices.push(parse_index(part, logical_cpus)?),
            }
        }
        Self::from_indices(indices, logical_cpus)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn contains(&self, cpu: usize) -> bool {
        self.0.contains(&cpu)
    }
}

/// Bounds-checks each endpoint so a range never expands past the host.
fn parse_index(s: &str, logical_cpus: usize) -> Result<usize, ActionError> {
    let s = s.trim();
    let idx: usize = s
        .parse()
        .map_err(|_| ActionError::invalid(format!("`{s}` is not a processor index")))?;
    if idx >= logical_cpus {
        return Err(ActionError::invalid(format!(
            "processor {idx} out of range (host has {logical_cpus})"
        )));
    }
    Ok(idx)
}

impl fmt::Display for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = self
            .0
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&list)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessAction {
    Signal(Signal),
    Renice(i32),
    Affinity(CpuSet),
}

/// An operator request against one process.
///
/// `expected_start` carries the start time seen in the snapshot the operator
/// acted on; a live process with a different start time is a recycled pid.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub pid: u32,
    pub expected_start: Option<u64>,
    pub action: ProcessAction,
}

impl ActionRequest {
    pub fn new(pid: u32, action: ProcessAction) -> Self {
        Self {
            pid,
            expected_start: None,
            action,
        }
    }

    pub fn expecting_start(mut self, start_time: u64) -> Self {
        self.expected_start = Some(start_time);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub pid: u32,
    pub message: String,
}
