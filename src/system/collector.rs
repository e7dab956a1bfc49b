use std::collections::HashSet;
use std::time::{Instant, SystemTime};

use super::filter::{ClassificationPolicy, RowFilter, SearchFilter};
use super::history::{HistoryRing, Metric};
use super::process::{ProcessReading, ProcessRow};
use super::rate::{CpuRateTracker, NetworkTracker};
use super::snapshot::{HostSummary, Snapshot};
use super::source::{ProcessSource, SysinfoSource};
use crate::config::SamplingSettings;

/// Runs sampling passes: enumerate, convert counters to rates, filter, and
/// record history. Owns all state carried between passes.
pub struct Collector<S = SysinfoSource> {
    source: S,
    policy: ClassificationPolicy,
    cpu: CpuRateTracker,
    network: NetworkTracker,
    history: HistoryRing,
    passes: u64,
}

impl Collector<SysinfoSource> {
    pub fn new(policy: ClassificationPolicy, history_capacity: usize) -> Self {
        Self::with_source(SysinfoSource::new(), policy, history_capacity)
    }
}

impl<S: ProcessSource> Collector<S> {
    pub fn with_source(source: S, policy: ClassificationPolicy, history_capacity: usize) -> Self {
        Collector {
            source,
            policy,
            cpu: CpuRateTracker::new(),
            network: NetworkTracker::new(),
            history: HistoryRing::new(history_capacity),
            passes: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn cpu_tracker(&self) -> &CpuRateTracker {
        &self.cpu
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn policy(&self) -> &ClassificationPolicy {
        &self.policy
    }

    pub fn refresh(&mut self, settings: &SamplingSettings) -> Snapshot {
        self.refresh_at(settings, Instant::now())
    }

    /// One full sampling pass with `now` as the sampling instant.
    pub fn refresh_at(&mut self, settings: &SamplingSettings, now: Instant) -> Snapshot {
        let _refresh_span =
            tracing::debug_span!("collector.refresh", pass = self.passes + 1).entered();

        let readings = self.source.processes();
        let (rows, process_count) = self.build_rows(readings, settings, now);

        let host = self.source.host();
        let network = self
            .network
            .sample(host.net_sent_bytes, host.net_received_bytes, now);

        let summary = HostSummary {
            cpu_percent: host.cpu_percent,
            memory_used: host.memory_used,
            memory_total: host.memory_total,
            swap_used: host.swap_used,
            swap_total: host.swap_total,
            logical_cpus: host.logical_cpus,
            network,
            process_count,
        };

        self.history.append(Metric::Cpu, summary.cpu_percent as f64);
        self.history
            .append(Metric::Memory, summary.memory_percent() as f64);
        self.history.append(Metric::Swap, summary.swap_percent() as f64);
        self.history.append(Metric::NetIn, network.received_kbps);
        self.history.append(Metric::NetOut, network.sent_kbps);

        self.passes += 1;
        tracing::debug!(
            pass = self.passes,
            enumerated = process_count,
            visible = rows.len(),
            tracked = self.cpu.len(),
            "sampling pass complete"
        );

        Snapshot {
            pass: self.passes,
            taken_at: SystemTime::now(),
            rows,
            host: summary,
            history: self.history.clone(),
            stale: false,
        }
    }

    fn build_rows(
        &mut self,
        readings: Vec<ProcessReading>,
        settings: &SamplingSettings,
        now: Instant,
    ) -> (Vec<ProcessRow>, usize) {
        let _snapshot_span = tracing::debug_span!("collector.build_snapshot").entered();

        let filter = RowFilter {
            policy: &self.policy,
            show_system: settings.show_system_processes,
            search: SearchFilter::new(&settings.search_text),
        };

        let mut live = HashSet::with_capacity(readings.len());
        let mut rows = Vec::with_capacity(readings.len());

        for reading in readings {
            if !live.insert(reading.pid) {
                tracing::trace!(
                    pid = reading.pid,
                    "duplicate pid in enumeration, keeping first"
                );
                continue;
            }
            // Rates are tracked for every live process, visible or not, so
            // that toggling a filter never resets a rate to its first sample.
            let cpu_percent =
                self.cpu.sample(reading.pid, reading.start_time, reading.cpu_time_ms, now);
            let row = ProcessRow::from_reading(reading, cpu_percent);
            if filter.admits(&row) {
                rows.push(row);
            }
        }

        self.cpu.retain_live(&live);
        rows.sort_unstable_by_key(|r| r.pid);
        (rows, live.len())
    }
}
