use std::io;

use libproc::libproc::bsd_info::BSDInfo;
use libproc::libproc::proc_pid::pidinfo;
use libproc::libproc::task_info::TaskInfo;

use super::{PlatformExtensions, SchedStats};
use crate::action::{CpuSet, Signal};
use crate::error::ReadError;

pub struct Platform;

fn target(pid: u32) -> io::Result<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(io::Error::from_raw_os_error(libc::ESRCH)),
    }
}

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// libproc reports failures as strings; probe liveness to classify them.
fn classify_failure(pid: libc::pid_t) -> ReadError {
    // SAFETY: signal 0 performs permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == -1 && io::Error::last_os_error().raw_os_error() == Some(libc::ESRCH) {
        ReadError::Vanished
    } else {
        ReadError::AccessDenied
    }
}

impl PlatformExtensions for Platform {
    fn sched_stats(pid: u32) -> Result<SchedStats, ReadError> {
        let pid = target(pid).map_err(|_| ReadError::Vanished)?;
        // Clear errno before call
        unsafe { *libc::__error() = 0 };
        let nice = unsafe { libc::getpriority(libc::PRIO_PROCESS, pid as libc::id_t) };
        // getpriority returns -1 on error, but -1 can also be a valid priority
        let errno = unsafe { *libc::__error() };
        if nice == -1 && errno != 0 {
            return Err(if errno == libc::ESRCH {
                ReadError::Vanished
            } else {
                ReadError::AccessDenied
            });
        }
        let threads = pidinfo::<TaskInfo>(pid, 0)
            .ok()
            .and_then(|info| u32::try_from(info.pti_threadnum).ok());
        Ok(SchedStats { nice, threads })
    }

    fn open_handles(pid: u32) -> Result<u32, ReadError> {
        let pid = target(pid).map_err(|_| ReadError::Vanished)?;
        pidinfo::<BSDInfo>(pid, 0)
            .map(|info| info.pbi_nfiles)
            .map_err(|_| classify_failure(pid))
    }

    fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
        let sig = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
            Signal::Stop => libc::SIGSTOP,
            Signal::Continue => libc::SIGCONT,
        };
        let pid = target(pid)?;
        // SAFETY: positive single-process target.
        check(unsafe { libc::kill(pid, sig) })
    }

    fn set_nice(pid: u32, nice: i32) -> io::Result<()> {
        let pid = target(pid)?;
        check(unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, nice) })
    }

    fn affinity(_pid: u32) -> io::Result<Vec<usize>> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn set_affinity(_pid: u32, _cpus: &CpuSet) -> io::Result<()> {
        // macOS only exposes affinity tags, not processor masks
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn is_no_such_process(err: &io::Error) -> bool {
        err.raw_os_error() == Some(libc::ESRCH)
    }
}
