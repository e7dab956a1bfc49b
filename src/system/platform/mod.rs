use std::io;

use crate::action::{CpuSet, Signal};
use crate::error::ReadError;

/// Scheduling attributes read straight from the OS for one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedStats {
    pub nice: i32,
    pub threads: Option<u32>,
}

pub trait PlatformExtensions {
    fn sched_stats(pid: u32) -> Result<SchedStats, ReadError>;
    fn open_handles(pid: u32) -> Result<u32, ReadError>;

    fn send_signal(pid: u32, signal: Signal) -> io::Result<()>;
    fn set_nice(pid: u32, nice: i32) -> io::Result<()>;
    fn affinity(pid: u32) -> io::Result<Vec<usize>>;
    fn set_affinity(pid: u32, cpus: &CpuSet) -> io::Result<()>;

    /// True when `err` means the target pid does not resolve to a process.
    fn is_no_such_process(err: &io::Error) -> bool;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

use platform_impl::Platform;

pub fn sched_stats(pid: u32) -> Result<SchedStats, ReadError> {
    Platform::sched_stats(pid)
}

pub fn open_handles(pid: u32) -> Result<u32, ReadError> {
    Platform::open_handles(pid)
}

pub fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    Platform::send_signal(pid, signal)
}

pub fn set_nice(pid: u32, nice: i32) -> io::Result<()> {
    Platform::set_nice(pid, nice)
}

pub fn affinity(pid: u32) -> io::Result<Vec<usize>> {
    Platform::affinity(pid)
}

pub fn set_affinity(pid: u32, cpus: &CpuSet) -> io::Result<()> {
    Platform::set_affinity(pid, cpus)
}

pub fn is_no_such_process(err: &io::Error) -> bool {
    Platform::is_no_such_process(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_succeed_for_current_pid() {
        let pid = std::process::id();
        let stats = sched_stats(pid).expect("own sched stats are readable");
        if let Some(threads) = stats.threads {
            assert!(threads >= 1);
        }
        let _ = open_handles(pid);
    }

    #[test]
    fn signalling_pid_zero_is_refused() {
        let err = send_signal(0, Signal::Terminate).unwrap_err();
        assert!(is_no_such_process(&err));
    }
}
