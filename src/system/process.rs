use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Tracing,
    Zombie,
    Dead,
    WakeKill,
    Waking,
    Parked,
    Idle,
    Locked,
    Suspended,
    Unknown,
}

impl ProcessState {
    pub fn label(self) -> &'static str {
        match self {
            ProcessState::Running => "Running",
            ProcessState::Sleeping => "Sleeping",
            ProcessState::DiskSleep => "Disk Sleep",
            ProcessState::Stopped => "Stopped",
            ProcessState::Tracing => "Tracing",
            ProcessState::Zombie => "Zombie",
            ProcessState::Dead => "Dead",
            ProcessState::WakeKill => "Wake Kill",
            ProcessState::Waking => "Waking",
            ProcessState::Parked => "Parked",
            ProcessState::Idle => "Idle",
            ProcessState::Locked => "Locked",
            ProcessState::Suspended => "Suspended",
            ProcessState::Unknown => "Unknown",
        }
    }
}

impl From<sysinfo::ProcessStatus> for ProcessState {
    fn from(status: sysinfo::ProcessStatus) -> Self {
        use sysinfo::ProcessStatus;
        match status {
            ProcessStatus::Run => ProcessState::Running,
            ProcessStatus::Sleep => ProcessState::Sleeping,
            ProcessStatus::UninterruptibleDiskSleep => ProcessState::DiskSleep,
            ProcessStatus::Stop => ProcessState::Stopped,
            ProcessStatus::Tracing => ProcessState::Tracing,
            ProcessStatus::Zombie => ProcessState::Zombie,
            ProcessStatus::Dead => ProcessState::Dead,
            ProcessStatus::Wakekill => ProcessState::WakeKill,
            ProcessStatus::Waking => ProcessState::Waking,
            ProcessStatus::Parked => ProcessState::Parked,
            ProcessStatus::Idle => ProcessState::Idle,
            ProcessStatus::LockBlocked => ProcessState::Locked,
            ProcessStatus::Suspended => ProcessState::Suspended,
            _ => ProcessState::Unknown,
        }
    }
}

/// One process as read by the enumerator, before rate conversion.
///
/// `cpu_time_ms` is the cumulative CPU time the process has consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessReading {
    pub pid: u32,
    pub name: String,
    pub owner: String,
    pub cpu_time_ms: u64,
    pub memory_bytes: u64,
    pub status: ProcessState,
    pub priority: i32,
    pub thread_count: u32,
    pub open_handles: u32,
    pub start_time: u64,
    pub command: String,
}

/// One process at one sampling instant. Immutable once published.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    pub owner: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub status: ProcessState,
    pub priority: i32,
    pub thread_count: u32,
    pub open_handles: u32,
    /// Seconds since the Unix epoch.
    pub start_time: u64,
    pub command: String,
}

impl ProcessRow {
    pub fn from_reading(reading: ProcessReading, cpu_percent: f32) -> Self {
        ProcessRow {
            pid: reading.pid,
            name: reading.name,
            owner: reading.owner,
            cpu_percent,
            memory_bytes: reading.memory_bytes,
            status: reading.status,
            priority: reading.priority,
            thread_count: reading.thread_count,
            open_handles: reading.open_handles,
            start_time: reading.start_time,
            command: reading.command,
        }
    }
}
