use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cpu,
    Memory,
    Swap,
    NetIn,
    NetOut,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::Swap,
        Metric::NetIn,
        Metric::NetOut,
    ];

    fn index(self) -> usize {
        match self {
            Metric::Cpu => 0,
            Metric::Memory => 1,
            Metric::Swap => 2,
            Metric::NetIn => 3,
            Metric::NetOut => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu%",
            Metric::Memory => "mem%",
            Metric::Swap => "swap%",
            Metric::NetIn => "net-in KB/s",
            Metric::NetOut => "net-out KB/s",
        }
    }
}

/// Fixed-capacity rolling buffers, one per [`Metric`]. Oldest values drop
/// silently once a buffer is full.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRing {
    series: [VecDeque<f64>; 5],
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&mut self, metric: Metric, value: f64) {
        if self.capacity == 0 {
            return;
        }
        let ring = &mut self.series[metric.index()];
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(value);
    }

    /// Retained samples for `metric`, oldest first.
    pub fn snapshot(&self, metric: Metric) -> Vec<f64> {
        self.series[metric.index()].iter().copied().collect()
    }

    pub fn latest(&self, metric: Metric) -> Option<f64> {
        self.series[metric.index()].back().copied()
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series[metric.index()].len()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
