use std::io;

use windows_sys::Win32::{
    Foundation::{CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, HANDLE},
    System::Threading::{
        ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS, GetPriorityClass,
        GetProcessAffinityMask, GetProcessHandleCount, HIGH_PRIORITY_CLASS, IDLE_PRIORITY_CLASS,
        NORMAL_PRIORITY_CLASS, OpenProcess, PROCESS_ACCESS_RIGHTS,
        PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_INFORMATION, PROCESS_TERMINATE,
        REALTIME_PRIORITY_CLASS, SetPriorityClass, SetProcessAffinityMask, TerminateProcess,
    },
};

use super::{PlatformExtensions, SchedStats};
use crate::action::{CpuSet, Signal};
use crate::error::ReadError;

pub struct Platform;

struct OwnedHandle(HANDLE);

impl OwnedHandle {
    fn open(pid: u32, access: PROCESS_ACCESS_RIGHTS) -> io::Result<Self> {
        if pid == 0 {
            return Err(io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER as i32));
        }
        let handle = unsafe { OpenProcess(access, 0, pid) };
        if handle.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(OwnedHandle(handle))
        }
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

fn check(ok: i32) -> io::Result<()> {
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn read_error(err: &io::Error) -> ReadError {
    match err.raw_os_error() {
        Some(code) if code == ERROR_INVALID_PARAMETER as i32 => ReadError::Vanished,
        Some(code) if code == ERROR_ACCESS_DENIED as i32 => ReadError::AccessDenied,
        _ => ReadError::Unavailable,
    }
}

/// Priority classes expressed on the Unix niceness scale.
fn class_to_nice(class: u32) -> i32 {
    match class {
        IDLE_PRIORITY_CLASS => 19,
        BELOW_NORMAL_PRIORITY_CLASS => 10,
        ABOVE_NORMAL_PRIORITY_CLASS => -5,
        HIGH_PRIORITY_CLASS => -10,
        REALTIME_PRIORITY_CLASS => -20,
        _ => 0,
    }
}

fn nice_to_class(nice: i32) -> u32 {
    match nice {
        15.. => IDLE_PRIORITY_CLASS,
        5..=14 => BELOW_NORMAL_PRIORITY_CLASS,
        -4..=4 => NORMAL_PRIORITY_CLASS,
        -9..=-5 => ABOVE_NORMAL_PRIORITY_CLASS,
        -19..=-10 => HIGH_PRIORITY_CLASS,
        _ => REALTIME_PRIORITY_CLASS,
    }
}

impl PlatformExtensions for Platform {
    fn sched_stats(pid: u32) -> Result<SchedStats, ReadError> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION)
            .map_err(|e| read_error(&e))?;
        let class = unsafe { GetPriorityClass(handle.0) };
        if class == 0 {
            return Err(read_error(&io::Error::last_os_error()));
        }
        Ok(SchedStats {
            nice: class_to_nice(class),
            threads: None,
        })
    }

    fn open_handles(pid: u32) -> Result<u32, ReadError> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION)
            .map_err(|e| read_error(&e))?;
        let mut count = 0u32;
        check(unsafe { GetProcessHandleCount(handle.0, &mut count) })
            .map_err(|e| read_error(&e))?;
        Ok(count)
    }

    fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
        match signal {
            Signal::Terminate | Signal::Kill => {
                let handle = OwnedHandle::open(pid, PROCESS_TERMINATE)?;
                check(unsafe { TerminateProcess(handle.0, 1) })
            }
            Signal::Stop | Signal::Continue => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }

    fn set_nice(pid: u32, nice: i32) -> io::Result<()> {
        let handle = OwnedHandle::open(pid, PROCESS_SET_INFORMATION)?;
        check(unsafe { SetPriorityClass(handle.0, nice_to_class(nice)) })
    }

    fn affinity(pid: u32) -> io::Result<Vec<usize>> {
        let handle = OwnedHandle::open(pid, PROCESS_QUERY_LIMITED_INFORMATION)?;
        let mut process_mask = 0usize;
        let mut system_mask = 0usize;
        check(unsafe { GetProcessAffinityMask(handle.0, &mut process_mask, &mut system_mask) })?;
        Ok((0..usize::BITS as usize)
            .filter(|i| (process_mask >> i) & 1 == 1)
            .collect())
    }

    fn set_affinity(pid: u32, cpus: &CpuSet) -> io::Result<()> {
        if cpus.max().is_some_and(|max| max >= usize::BITS as usize) {
            return Err(io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER as i32));
        }
        let mask = cpus.iter().fold(0usize, |mask, cpu| mask | (1 << cpu));
        let handle = OwnedHandle::open(pid, PROCESS_SET_INFORMATION)?;
        check(unsafe { SetProcessAffinityMask(handle.0, mask) })
    }

    fn is_no_such_process(err: &io::Error) -> bool {
        err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as i32)
    }
}
