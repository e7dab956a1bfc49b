use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Smallest interval a counter delta is divided by.
pub const MIN_ELAPSED: Duration = Duration::from_micros(1);

/// Per-second rate of a counter that advanced by `delta` over `elapsed`.
///
/// `elapsed` is floored to [`MIN_ELAPSED`], so the result is always finite.
pub fn per_second(delta: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.max(MIN_ELAPSED).as_secs_f64();
    let rate = delta as f64 / secs;
    if rate.is_finite() { rate } else { f64::MAX }
}

#[derive(Clone, Copy, Debug)]
struct CpuBaseline {
    cpu_time_ms: u64,
    start_time: u64,
    at: Instant,
}

/// Converts cumulative per-process CPU time into a percentage of one core.
#[derive(Debug, Default)]
pub struct CpuRateTracker {
    baselines: HashMap<u32, CpuBaseline>,
}

impl CpuRateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample and returns the CPU% since the previous one.
    ///
    /// The first sample of a process reports 0.0. A pid whose start time
    /// changed is a different process and starts over.
    pub fn sample(&mut self, pid: u32, start_time: u64, cpu_time_ms: u64, now: Instant) -> f32 {
        let current = CpuBaseline {
            cpu_time_ms,
            start_time,
            at: now,
        };
        let previous = self.baselines.insert(pid, current);

        match previous {
            Some(prev) if prev.start_time == start_time => {
                let delta_ms = cpu_time_ms.saturating_sub(prev.cpu_time_ms);
                let elapsed = now.saturating_duration_since(prev.at);
                // ms of CPU per second of wall time, as a percentage: x / 1000 * 100
                (per_second(delta_ms, elapsed) / 10.0).min(f32::MAX as f64) as f32
            }
            _ => 0.0,
        }
    }

    /// Drops baselines for every pid not in `live`.
    pub fn retain_live(&mut self, live: &HashSet<u32>) {
        self.baselines.retain(|pid, _| live.contains(pid));
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.baselines.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct NetworkRates {
    pub sent_kbps: f64,
    pub received_kbps: f64,
}

#[derive(Clone, Copy, Debug)]
struct NetBaseline {
    sent: u64,
    received: u64,
    at: Instant,
}

/// Converts host-wide cumulative network byte counters into KB/s.
#[derive(Debug, Default)]
pub struct NetworkTracker {
    baseline: Option<NetBaseline>,
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn sample(&mut self, sent: u64, received: u64, now: Instant) -> NetworkRates {
        let previous = self.baseline.replace(NetBaseline {
            sent,
            received,
            at: now,
        });

        let Some(prev) = previous else {
            return NetworkRates::default();
        };
        let elapsed = now.saturating_duration_since(prev.at);
        NetworkRates {
            sent_kbps: per_second(sent.saturating_sub(prev.sent), elapsed) / 1024.0,
            received_kbps: per_second(received.saturating_sub(prev.received), elapsed) / 1024.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_zero() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        assert_eq!(tracker.sample(10, 100, 987_654, t0), 0.0);
        assert!(tracker.contains(10));
    }

    #[test]
    fn unchanged_counter_is_zero() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(10, 100, 5_000, t0);
        assert_eq!(
            tracker.sample(10, 100, 5_000, t0 + Duration::from_secs(2)),
            0.0
        );
    }

    #[test]
    fn full_core_is_one_hundred_percent() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(10, 100, 1_000, t0);
        let pct = tracker.sample(10, 100, 3_000, t0 + Duration::from_secs(2));
        assert!((pct - 100.0).abs() < 1e-3, "got {pct}");
    }

    #[test]
    fn multi_core_usage_exceeds_one_hundred() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(10, 100, 0, t0);
        let pct = tracker.sample(10, 100, 4_000, t0 + Duration::from_secs(1));
        assert!((pct - 400.0).abs() < 1e-3, "got {pct}");
    }

    #[test]
    fn recycled_pid_starts_over() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(10, 100, 1_000, t0);
        let pct = tracker.sample(10, 250, 90_000, t0 + Duration::from_secs(1));
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn retain_live_evicts_absent_pids() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        for pid in 1..=5 {
            tracker.sample(pid, 0, 0, t0);
        }
        let live: HashSet<u32> = [2, 4].into_iter().collect();
        tracker.retain_live(&live);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.contains(2));
        assert!(!tracker.contains(1));
    }

    #[test]
    fn zero_elapsed_is_finite() {
        let mut tracker = CpuRateTracker::new();
        let t0 = Instant::now();
        tracker.sample(1, 0, 0, t0);
        let pct = tracker.sample(1, 0, u64::MAX, t0);
        assert!(pct.is_finite());
        let rate = per_second(u64::MAX, Duration::ZERO);
        assert!(rate.is_finite());
    }

    #[test]
    fn network_first_call_is_zero_then_kb_per_second() {
        let mut net = NetworkTracker::new();
        let t0 = Instant::now();
        assert_eq!(net.sample(1_000, 2_000, t0), NetworkRates::default());

        let t1 = t0 + Duration::from_secs(4);
        let rates = net.sample(1_000 + 8_192, 2_000 + 4_096, t1);
        assert!((rates.sent_kbps - 2.0).abs() < 1e-9);
        assert!((rates.received_kbps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn network_reset_drops_baseline() {
        let mut net = NetworkTracker::new();
        let t0 = Instant::now();
        net.sample(0, 0, t0);
        net.reset();
        let rates = net.sample(1 << 30, 1 << 30, t0 + Duration::from_secs(1));
        assert_eq!(rates, NetworkRates::default());
    }

    #[test]
    fn network_degenerate_elapsed_is_finite() {
        let mut net = NetworkTracker::new();
        let t0 = Instant::now();
        net.sample(0, 0, t0);
        let rates = net.sample(1024, 1024, t0);
        assert!(rates.sent_kbps.is_finite());
        assert!(rates.received_kbps.is_finite());
        assert!(rates.sent_kbps > 0.0);
    }
}
