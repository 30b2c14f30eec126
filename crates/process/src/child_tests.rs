// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use encab_core::ProgramCommand;

use super::*;

fn spec(command: ProgramCommand) -> SpawnSpec {
    SpawnSpec {
        command,
        environment: HashMap::new(),
        user: None,
        group: None,
        umask: -1,
        directory: None,
        start_new_session: true,
        reap_zombies: false,
    }
}

#[tokio::test]
async fn execute_runs_the_command_and_reports_its_exit_code() {
    let child = UnixChildProcess::new();
    let mut started_pid = None;
    let code = child
        .execute(
            &spec(ProgramCommand::Exec(vec!["true".to_string()])),
            Box::new(|pid, _stdout, _stderr| started_pid = Some(pid)),
        )
        .await
        .expect("execute should succeed");

    assert_eq!(code, 0);
    assert!(started_pid.is_some());
    assert_eq!(child.pid(), started_pid);
}

#[tokio::test]
async fn execute_reports_nonzero_exit_code() {
    let child = UnixChildProcess::new();
    let code = child
        .execute(&spec(ProgramCommand::Exec(vec!["false".to_string()])), Box::new(|_, _, _| {}))
        .await
        .expect("execute should succeed even for a failing command");

    assert_eq!(code, 1);
}

#[tokio::test]
async fn execute_runs_a_shell_script() {
    let child = UnixChildProcess::new();
    let code = child
        .execute(&spec(ProgramCommand::Shell("exit 7".to_string())), Box::new(|_, _, _| {}))
        .await
        .expect("execute should succeed");

    assert_eq!(code, 7);
}

#[tokio::test]
async fn execute_of_missing_binary_is_a_spawn_error() {
    let child = UnixChildProcess::new();
    let result = child
        .execute(
            &spec(ProgramCommand::Exec(vec!["this-binary-does-not-exist-anywhere".to_string()])),
            Box::new(|_, _, _| {}),
        )
        .await;

    assert!(matches!(result, Err(ProcessError::Spawn { .. })));
}

#[tokio::test]
async fn signal_delivered_to_a_running_child_terminates_it() {
    let child = std::sync::Arc::new(UnixChildProcess::new());
    let runner = child.clone();
    let handle = tokio::spawn(async move {
        runner
            .execute(
                &spec(ProgramCommand::Exec(vec!["sleep".to_string(), "30".to_string()])),
                Box::new(|_, _, _| {}),
            )
            .await
    });

    // Give the child a moment to actually be running before we signal it.
    for _ in 0..50 {
        if child.pid().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(child.pid().is_some(), "child should have reported its pid");

    child.terminate();
    let code = handle.await.expect("task join").expect("execute should succeed");
    assert_eq!(code, 128 + 15, "SIGTERM should surface as 128+signal");
}

#[tokio::test]
async fn signal_on_an_already_exited_child_is_a_silent_no_op() {
    let child = UnixChildProcess::new();
    let _ = child
        .execute(&spec(ProgramCommand::Exec(vec!["true".to_string()])), Box::new(|_, _, _| {}))
        .await
        .expect("execute should succeed");

    // The child has already exited; signalling it again must not panic or
    // block, matching the original's swallow-ENOENT race tolerance.
    child.terminate();
    child.kill();
}

#[tokio::test]
async fn execute_attaches_stdio_before_the_wait_completes() {
    let child = UnixChildProcess::new();
    let mut saw_stdout = false;
    let mut saw_stderr = false;
    let code = child
        .execute(
            &spec(ProgramCommand::Shell("echo out; echo err 1>&2".to_string())),
            Box::new(|_pid, stdout, stderr| {
                saw_stdout = stdout.is_some();
                saw_stderr = stderr.is_some();
            }),
        )
        .await
        .expect("execute should succeed");

    assert_eq!(code, 0);
    assert!(saw_stdout, "stdout handle must be delivered before the wait resolves");
    assert!(saw_stderr, "stderr handle must be delivered before the wait resolves");
}

#[tokio::test]
async fn reap_zombies_reports_the_launched_pids_own_exit_code() {
    let mut reap_spec = spec(ProgramCommand::Shell("exit 5".to_string()));
    reap_spec.reap_zombies = true;

    let child = UnixChildProcess::new();
    let code = child.execute(&reap_spec, Box::new(|_, _, _| {})).await.expect("execute should succeed");

    assert_eq!(code, 5);
}

#[tokio::test]
async fn noop_child_process_reports_configured_pid_and_exit_code() {
    let child = NoOpChildProcess { pid: 4242, exit_code: 9 };
    let mut started = None;
    let code = child
        .execute(
            &spec(ProgramCommand::Exec(vec!["ignored".to_string()])),
            Box::new(|pid, _stdout, _stderr| started = Some(pid)),
        )
        .await
        .expect("execute");

    assert_eq!(started, Some(4242));
    assert_eq!(child.pid(), Some(4242));
    assert_eq!(code, 9);
}

#[tokio::test]
async fn fake_child_process_records_delivered_signals() {
    let child = FakeChildProcess { pid: 7, exit_code: std::sync::Mutex::new(0), ..Default::default() };
    let signals = child.signals.clone();

    child.terminate();
    child.kill();

    #[allow(clippy::unwrap_used)]
    let recorded = signals.lock().unwrap().clone();
    assert_eq!(recorded, vec![UnixSignal::Term, UnixSignal::Kill]);
}
