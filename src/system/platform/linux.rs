use std::io;

use super::{PlatformExtensions, SchedStats};
use crate::action::{CpuSet, Signal};
use crate::error::ReadError;

pub struct Platform;

/// Converts a pid into a target that cannot address a process group.
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

impl PlatformExtensions for Platform {
    fn sched_stats(pid: u32) -> Result<SchedStats, ReadError> {
        let path = format!("/proc/{pid}/stat");
        let contents = std::fs::read_to_string(path).map_err(|e| ReadError::from_io(&e))?;
        // comm field may contain spaces and parens, so find the closing )
        let after_comm = contents.rfind(')').ok_or(ReadError::Unavailable)? + 1;
        let fields: Vec<&str> = contents[after_comm..].split_whitespace().collect();
        // Fields after comm: state(0) ppid(1) pgrp(2) session(3) tty_nr(4)
        // tpgid(5) flags(6) minflt(7) cminflt(8) majflt(9) cmajflt(10)
        // utime(11) stime(12) cutime(13) cstime(14) priority(15) nice(16)
        // num_threads(17)
        let nice = fields
            .get(16)
            .and_then(|v| v.parse().ok())
            .ok_or(ReadError::Unavailable)?;
        let threads = fields.get(17).and_then(|v| v.parse().ok());
        Ok(SchedStats { nice, threads })
    }

    fn open_handles(pid: u32) -> Result<u32, ReadError> {
        let path = format!("/proc/{pid}/fd");
        let entries = std::fs::read_dir(path).map_err(|e| ReadError::from_io(&e))?;
        Ok(entries.filter(|e| e.is_ok()).count() as u32)
    }

    fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
        let sig = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
            Signal::Stop => libc::SIGSTOP,
            Signal::Continue => libc::SIGCONT,
        };
        let pid = target(pid)?;
        // SAFETY: kill has no memory effects; pid is a positive single-process target.
        check(unsafe { libc::kill(pid, sig) })
    }

    fn set_nice(pid: u32, nice: i32) -> io::Result<()> {
        let pid = target(pid)?;
        // SAFETY: plain syscall on a positive pid.
        check(unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, nice) })
    }

    fn affinity(pid: u32) -> io::Result<Vec<usize>> {
        let pid = target(pid)?;
        // SAFETY: cpu_set_t is plain data; sched_getaffinity writes at most its size.
        let set = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            check(libc::sched_getaffinity(
                pid,
                std::mem::size_of::<libc::cpu_set_t>(),
                &mut set,
            ))?;
            set
        };
        let cpus = (0..libc::CPU_SETSIZE as usize)
            // SAFETY: index is below CPU_SETSIZE.
            .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
            .collect();
        Ok(cpus)
    }

    fn set_affinity(pid: u32, cpus: &CpuSet) -> io::Result<()> {
        let pid = target(pid)?;
        if cpus.max().is_some_and(|max| max >= libc::CPU_SETSIZE as usize) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        // SAFETY: indices are bounded by CPU_SETSIZE above.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            for cpu in cpus.iter() {
                libc::CPU_SET(cpu, &mut set);
            }
            check(libc::sched_setaffinity(
                pid,
                std::mem::size_of::<libc::cpu_set_t>(),
                &set,
            ))
        }
    }

    fn is_no_such_process(err: &io::Error) -> bool {
        err.raw_os_error() == Some(libc::ESRCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_affinity_is_non_empty() {
        let cpus = Platform::affinity(std::process::id()).unwrap();
        assert!(!cpus.is_empty());
    }

    #[test]
    fn negative_pid_targets_are_rejected() {
        let err = Platform::send_signal(u32::MAX, Signal::Terminate).unwrap_err();
        assert!(Platform::is_no_such_process(&err));
    }

    #[test]
    fn missing_proc_entry_reads_as_vanished() {
        // pid_max never exceeds 2^22 on Linux.
        let pid = (1 << 22) + 17;
        assert_eq!(Platform::sched_stats(pid), Err(ReadError::Vanished));
        assert_eq!(Platform::open_handles(pid), Err(ReadError::Vanished));
    }
}
