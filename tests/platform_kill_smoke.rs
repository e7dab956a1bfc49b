use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use proctide::action::{ActionRequest, CpuSet, ProcessAction, Signal};
use proctide::error::ErrorKind;
use proctide::system::control::ActionExecutor;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

fn spawn_long_lived_child() -> Child {
    #[cfg(windows)]
    let mut cmd = {
        let mut c = Command::new("powershell");
        c.args([
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "Start-Sleep -Seconds 30",
        ]);
        c
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut c = Command::new("sleep");
        c.arg("30");
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn child process")
}

fn wait_for_pid(pid: u32, timeout: Duration) -> bool {
    let sys_pid = Pid::from_u32(pid);
    let mut sys = System::new();
    let deadline = Instant::now() + timeout;
    loop {
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        if sys.process(sys_pid).is_some() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn wait_for_exit(child: &mut Child) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(50)),
            Ok(None) => {
                let _ = child.kill();
                panic!("child process did not exit before timeout");
            }
            Err(err) => {
                let _ = child.kill();
                panic!("failed waiting for child exit: {err}");
            }
        }
    }
}

#[test]
fn signal_to_nonexistent_pid_is_not_found() {
    let executor = ActionExecutor::new();
    let err = executor
        .apply(&ActionRequest::new(
            u32::MAX,
            ProcessAction::Signal(Signal::Terminate),
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessNotFound);
}

#[test]
fn terminate_spawned_child() {
    let mut child = spawn_long_lived_child();
    let pid = child.id();
    if !wait_for_pid(pid, Duration::from_secs(3)) {
        let _ = child.kill();
        panic!("child process PID {pid} was not observed before the signal");
    }

    let executor = ActionExecutor::new();
    match executor.apply(&ActionRequest::new(pid, ProcessAction::Signal(Signal::Terminate))) {
        Ok(outcome) => {
            assert_eq!(outcome.pid, pid);
            wait_for_exit(&mut child);
        }
        Err(err) => {
            let _ = child.kill();
            panic!("terminate reported failure: {err}");
        }
    }
}

#[test]
fn out_of_range_affinity_is_rejected_and_leaves_process_alone() {
    let mut child = spawn_long_lived_child();
    let pid = child.id();
    if !wait_for_pid(pid, Duration::from_secs(3)) {
        let _ = child.kill();
        panic!("child process PID {pid} was not observed");
    }

    let executor = ActionExecutor::new();
    let logical = executor.logical_cpus();
    let before = executor.current_affinity(pid).ok();

    let beyond = CpuSet::from_indices([logical], logical + 1).expect("valid on a larger host");
    let err = executor
        .apply(&ActionRequest::new(pid, ProcessAction::Affinity(beyond)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    if let Some(before) = before {
        assert_eq!(executor.current_affinity(pid).ok(), Some(before));
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
#[test]
fn renice_spawned_child_lowers_priority() {
    use proctide::system::details::inspect;

    let mut child = spawn_long_lived_child();
    let pid = child.id();
    if !wait_for_pid(pid, Duration::from_secs(3)) {
        let _ = child.kill();
        panic!("child process PID {pid} was not observed");
    }

    let executor = ActionExecutor::new();
    let result = executor.apply(&ActionRequest::new(pid, ProcessAction::Renice(15)));
    let details = inspect(pid);
    let _ = child.kill();
    let _ = child.wait();

    result.expect("raising nice on own child is permitted");
    assert_eq!(details.expect("child inspectable").priority, Some(15));
}

#[cfg(unix)]
#[test]
fn stop_then_continue_spawned_child() {
    use proctide::system::details::inspect;
    use proctide::system::process::ProcessState;

    let mut child = spawn_long_lived_child();
    let pid = child.id();
    if !wait_for_pid(pid, Duration::from_secs(3)) {
        let _ = child.kill();
        panic!("child process PID {pid} was not observed");
    }

    let executor = ActionExecutor::new();
    let stopped = executor.apply(&ActionRequest::new(
        pid,
        ProcessAction::Signal(Signal::Stop),
    ));
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut seen_stopped = false;
    while Instant::now() < deadline {
        if inspect(pid).is_ok_and(|d| d.status == ProcessState::Stopped) {
            seen_stopped = true;
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    let resumed = executor.apply(&ActionRequest::new(
        pid,
        ProcessAction::Signal(Signal::Continue),
    ));
    let _ = child.kill();
    let _ = child.wait();

    assert_eq!(
        stopped.expect("stop own child").message,
        format!("Sent SIGSTOP to PID {pid}")
    );
    assert!(seen_stopped, "child never reported the stopped state");
    resumed.expect("continue own child");
}
