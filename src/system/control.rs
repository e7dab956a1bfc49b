use std::io;

use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use super::platform;
use crate::action::{ActionOutcome, ActionRequest, CpuSet, ProcessAction};
use crate::error::ActionError;

/// Nice values accepted by `renice`, matching the unix range.
pub const NICE_RANGE: std::ops::RangeInclusive<i32> = -20..=19;

/// Applies operator requests to live processes.
///
/// Every request re-resolves the pid against the OS first, so an action
/// never lands on a process that has exited, and a recycled pid is refused
/// when the request carries the start time the operator saw.
pub struct ActionExecutor {
    logical_cpus: usize,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionExecutor {
    pub fn new() -> Self {
        let refresh = RefreshKind::nothing().with_cpu(CpuRefreshKind::everything());
        let sys = System::new_with_specifics(refresh);
        Self::with_logical_cpus(sys.cpus().len().max(1))
    }

    pub fn with_logical_cpus(logical_cpus: usize) -> Self {
        ActionExecutor { logical_cpus }
    }

    pub fn logical_cpus(&self) -> usize {
        self.logical_cpus
    }

    pub fn apply(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        let pid = request.pid;
        let _span = tracing::debug_span!("executor.apply", pid, action = ?request.action).entered();

        let result = self.validate(&request.action).and_then(|()| {
            self.resolve(pid, request.expected_start)?;
            self.dispatch(pid, &request.action)
        });

        match &result {
            Ok(outcome) => tracing::info!(pid, message = %outcome.message, "action applied"),
            Err(err) => tracing::debug!(pid, kind = err.kind().label(), %err, "action refused"),
        }
        result
    }

    /// Reads the processors `pid` may currently run on.
    pub fn current_affinity(&self, pid: u32) -> Result<CpuSet, ActionError> {
        self.resolve(pid, None)?;
        let cpus = platform::affinity(pid).map_err(|err| map_os_error(pid, err))?;
        // The kernel may report processors beyond what sysinfo counted
        // (offline cores); clamp to the usable range.
        let usable = cpus.into_iter().filter(|&c| c < self.logical_cpus);
        CpuSet::from_indices(usable, self.logical_cpus)
    }

    fn validate(&self, action: &ProcessAction) -> Result<(), ActionError> {
        match action {
            ProcessAction::Signal(_) => Ok(()),
            ProcessAction::Renice(nice) if !NICE_RANGE.contains(nice) => {
                Err(ActionError::invalid(format!(
                    "nice value {nice} outside {}..={}",
                    NICE_RANGE.start(),
                    NICE_RANGE.end()
                )))
            }
            ProcessAction::Renice(_) => Ok(()),
            ProcessAction::Affinity(cpus) => {
                if cpus.is_empty() {
                    return Err(ActionError::invalid("affinity needs at least one processor"));
                }
                match cpus.max() {
                    Some(max) if max >= self.logical_cpus => Err(ActionError::invalid(format!(
                        "processor {max} out of range (host has {})",
                        self.logical_cpus
                    ))),
                    _ => Ok(()),
                }
            }
        }
    }

    fn resolve(&self, pid: u32, expected_start: Option<u64>) -> Result<(), ActionError> {
        if pid == 0 {
            return Err(ActionError::ProcessNotFound(pid));
        }
        let sys_pid = Pid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );

        let process = sys
            .process(sys_pid)
            .ok_or(ActionError::ProcessNotFound(pid))?;
        if let Some(expected) = expected_start
            && process.start_time() != expected
        {
            tracing::debug!(
                pid,
                expected,
                actual = process.start_time(),
                "pid was recycled since the snapshot"
            );
            return Err(ActionError::ProcessNotFound(pid));
        }
        Ok(())
    }

    fn dispatch(&self, pid: u32, action: &ProcessAction) -> Result<ActionOutcome, ActionError> {
        let message = match action {
            ProcessAction::Signal(signal) => {
                platform::send_signal(pid, *signal).map_err(|err| map_os_error(pid, err))?;
                format!("Sent {} to PID {pid}", signal.name())
            }
            ProcessAction::Renice(nice) => {
                platform::set_nice(pid, *nice).map_err(|err| map_os_error(pid, err))?;
                format!("Set priority of PID {pid} to {nice}")
            }
            ProcessAction::Affinity(cpus) => {
                platform::set_affinity(pid, cpus).map_err(|err| map_os_error(pid, err))?;
                format!("Pinned PID {pid} to CPUs {cpus}")
            }
        };
        Ok(ActionOutcome { pid, message })
    }
}

fn map_os_error(pid: u32, err: io::Error) -> ActionError {
    if platform::is_no_such_process(&err) {
        return ActionError::ProcessNotFound(pid);
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => ActionError::PermissionDenied(pid),
        io::ErrorKind::Unsupported => ActionError::Unsupported("operation"),
        io::ErrorKind::InvalidInput => ActionError::invalid(err.to_string()),
        _ => ActionError::Os { pid, source: err },
    }
}
