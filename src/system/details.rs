use std::path::PathBuf;

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, Users};

use super::platform;
use super::process::ProcessState;
use crate::error::{ActionError, ReadError};

/// Everything known about one process, read on demand rather than per pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetails {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub owner: String,
    pub status: ProcessState,
    pub executable: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub command: String,
    pub memory_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub priority: Option<i32>,
    pub thread_count: Option<u32>,
    pub open_handles: Option<u32>,
    pub start_time: u64,
    pub run_time_secs: u64,
}

pub fn inspect(pid: u32) -> Result<ProcessDetails, ActionError> {
    if pid == 0 {
        return Err(ActionError::ProcessNotFound(pid));
    }
    let sys_pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::everything(),
    );
    let process = sys
        .process(sys_pid)
        .ok_or(ActionError::ProcessNotFound(pid))?;

    let owner = process
        .user_id()
        .and_then(|uid| {
            let users = Users::new_with_refreshed_list();
            users.get_user_by_id(uid).map(|u| u.name().to_string())
        })
        .unwrap_or_default();

    let sched = platform::sched_stats(pid);
    let handles = platform::open_handles(pid);
    if let (Err(ReadError::Vanished), Err(ReadError::Vanished)) = (&sched, &handles) {
        return Err(ActionError::ProcessNotFound(pid));
    }

    Ok(ProcessDetails {
        pid,
        parent: process.parent().map(|p| p.as_u32()),
        name: process.name().to_string_lossy().to_string(),
        owner,
        status: ProcessState::from(process.status()),
        executable: process.exe().map(|p| p.to_path_buf()),
        working_dir: process.cwd().map(|p| p.to_path_buf()),
        command: process
            .cmd()
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" "),
        memory_bytes: process.memory(),
        virtual_memory_bytes: process.virtual_memory(),
        priority: sched.as_ref().ok().map(|s| s.nice),
        thread_count: sched.ok().and_then(|s| s.threads),
        open_handles: handles.ok(),
        start_time: process.start_time(),
        run_time_secs: process.run_time(),
    })
}
