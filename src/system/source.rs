use std::collections::VecDeque;

use sysinfo::{Networks, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

use super::platform::{self, SchedStats};
use super::process::{ProcessReading, ProcessState};
use crate::error::ReadError;

/// Host-wide counters taken once per sampling pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostReading {
    pub cpu_percent: f32,
    pub memory_total: u64,
    pub memory_used: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    /// Cumulative bytes over all interfaces since boot.
    pub net_sent_bytes: u64,
    pub net_received_bytes: u64,
    pub logical_cpus: usize,
}

/// The OS boundary of the snapshot engine.
pub trait ProcessSource {
    /// Lists the processes alive right now. Processes that vanish while being
    /// read are left out; every other read failure degrades a single field.
    fn processes(&mut self) -> Vec<ProcessReading>;

    fn host(&mut self) -> HostReading;
}

/// Tracks how the independent attribute reads of one row went.
pub(crate) struct FieldProbe {
    pid: u32,
    attempted: u32,
    vanished: u32,
}

impl FieldProbe {
    pub(crate) fn new(pid: u32) -> Self {
        Self {
            pid,
            attempted: 0,
            vanished: 0,
        }
    }

    pub(crate) fn field<T>(
        &mut self,
        field: &'static str,
        result: Result<T, ReadError>,
        default: T,
    ) -> T {
        self.attempted += 1;
        match result {
            Ok(value) => value,
            Err(err) => {
                if err == ReadError::Vanished {
                    self.vanished += 1;
                }
                tracing::trace!(pid = self.pid, field, %err, "field degraded to default");
                default
            }
        }
    }

    /// Every attribute read reported the process gone.
    pub(crate) fn vanished(&self) -> bool {
        self.attempted > 0 && self.vanished == self.attempted
    }
}

pub struct SysinfoSource {
    sys: System,
    users: Users,
    networks: Networks,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());
        SysinfoSource {
            sys,
            users: Users::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_memory()
            .with_cpu()
            .with_user(UpdateKind::OnlyIfNotSet)
            .with_cmd(UpdateKind::OnlyIfNotSet)
    }

    pub fn system(&self) -> &System {
        &self.sys
    }
}

impl ProcessSource for SysinfoSource {
    fn processes(&mut self) -> Vec<ProcessReading> {
        let _span = tracing::debug_span!("collector.enumerate").entered();

        self.sys
            .refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());

        let mut users_refreshed = false;
        let mut readings = Vec::with_capacity(self.sys.processes().len());

        for (pid, process) in self.sys.processes() {
            let pid = pid.as_u32();

            let owner = match process.user_id() {
                Some(uid) => {
                    if self.users.get_user_by_id(uid).is_none() && !users_refreshed {
                        self.users.refresh();
                        users_refreshed = true;
                    }
                    self.users
                        .get_user_by_id(uid)
                        .map(|user| user.name().to_string())
                        .unwrap_or_default()
                }
                None => String::new(),
            };

            let mut probe = FieldProbe::new(pid);
            let sched = probe.field(
                "sched",
                platform::sched_stats(pid),
                SchedStats {
                    nice: 0,
                    threads: None,
                },
            );
            let open_handles = probe.field("open_handles", platform::open_handles(pid), 0);
            if probe.vanished() {
                tracing::trace!(pid, "process vanished mid-scan");
                continue;
            }

            let command = process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(" ");

            readings.push(ProcessReading {
                pid,
                name: process.name().to_string_lossy().to_string(),
                owner,
                cpu_time_ms: process.accumulated_cpu_time(),
                memory_bytes: process.memory(),
                status: ProcessState::from(process.status()),
                priority: sched.nice,
                thread_count: sched.threads.unwrap_or(1),
                open_handles,
                start_time: process.start_time(),
                command,
            });
        }

        readings
    }

    fn host(&mut self) -> HostReading {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_all();
        self.networks.refresh(true);

        let (net_sent_bytes, net_received_bytes) = self
            .networks
            .values()
            .fold((0u64, 0u64), |(sent, recv), data| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    recv.saturating_add(data.total_received()),
                )
            });

        HostReading {
            cpu_percent: self.sys.global_cpu_usage(),
            memory_total: self.sys.total_memory(),
            memory_used: self.sys.used_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
            net_sent_bytes,
            net_received_bytes,
            logical_cpus: self.sys.cpus().len(),
        }
    }
}

/// Replays recorded frames instead of querying the OS. Once the queued
/// frames run out the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<(Vec<ProcessReading>, HostReading)>,
    current: (Vec<ProcessReading>, HostReading),
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, readings: Vec<ProcessReading>, host: HostReading) {
        self.frames.push_back((readings, host));
    }

    pub fn with_frame(mut self, readings: Vec<ProcessReading>, host: HostReading) -> Self {
        self.push_frame(readings, host);
        self
    }

    pub fn pending(&self) -> usize {
        self.frames.len()
    }
}

impl ProcessSource for ReplaySource {
    fn processes(&mut self) -> Vec<ProcessReading> {
        if let Some(frame) = self.frames.pop_front() {
            self.current = frame;
        }
        self.current.0.clone()
    }

    fn host(&mut self) -> HostReading {
        self.current.1.clone()
    }
}
