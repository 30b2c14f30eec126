// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use encab_core::test_support::{FakeProgramObserver, ObserverCall};
use encab_core::{EffectiveProgramConfig, ExecutionContext, LogLevel, NoEnvironmentExtender, NoLineSanitizer, ProgramCommand, ProgramState};
use encab_process::{ChildProcess, FakeChildProcess, NoOpChildProcess, ProcessError, SpawnSpec, UnixSignal};
use tokio::process::{ChildStderr, ChildStdout};

use super::*;

fn config(startup_delay: Duration) -> EffectiveProgramConfig {
    EffectiveProgramConfig {
        command: ProgramCommand::Exec(vec!["irrelevant".to_string()]),
        environment: HashMap::new(),
        user: None,
        group: None,
        umask: -1,
        directory: None,
        startup_delay,
        join_time: Duration::from_secs(1),
        loglevel: LogLevel::Info,
        reap_zombies: false,
    }
}

fn context(name: &str) -> (ExecutionContext, FakeProgramObserver) {
    let observer = FakeProgramObserver::new(name);
    let ctx = ExecutionContext::new(HashMap::new(), Arc::new(observer.clone()), &NoEnvironmentExtender);
    (ctx, observer)
}

struct CrashingChildProcess;

#[async_trait]
impl ChildProcess for CrashingChildProcess {
    async fn execute(
        &self,
        _spec: &SpawnSpec,
        _on_started: Box<dyn FnOnce(u32, Option<ChildStdout>, Option<ChildStderr>) + Send>,
    ) -> Result<i32, ProcessError> {
        let missing = tokio::process::Command::new("this-binary-does-not-exist-anywhere-xyz").spawn();
        Err(ProcessError::Spawn {
            command: "missing".to_string(),
            source: missing.unwrap_err(),
        })
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    fn signal(&self, _sig: UnixSignal) {}
}

/// A child that "runs" until signalled, then reports `exit_code` — models a
/// real process reacting to SIGTERM/SIGINT without forking anything.
struct SignalledChildProcess {
    pid: u32,
    exit_code: i32,
    notify: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl ChildProcess for SignalledChildProcess {
    async fn execute(
        &self,
        _spec: &SpawnSpec,
        on_started: Box<dyn FnOnce(u32, Option<ChildStdout>, Option<ChildStderr>) + Send>,
    ) -> Result<i32, ProcessError> {
        on_started(self.pid, None, None);
        self.notify.notified().await;
        Ok(self.exit_code)
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn signal(&self, _sig: UnixSignal) {
        self.notify.notify_one();
    }
}

#[tokio::test]
async fn successful_run_reaches_succeeded_with_exit_code_zero() {
    let (ctx, observer) = context("main");
    let child = Arc::new(NoOpChildProcess { pid: 100, exit_code: 0 });
    let program = Program::new(ctx, config(Duration::ZERO), child, Arc::new(NoLineSanitizer));

    program.start(None).await;
    let state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(state, ProgramState::Succeeded);
    assert_eq!(program.exit_code(), Some(0));
    assert!(observer.calls().iter().any(|c| matches!(c, ObserverCall::Run { pid: 100 })));
}

#[tokio::test]
async fn nonzero_exit_while_running_is_classified_as_failed() {
    let (ctx, _observer) = context("main");
    let child = Arc::new(NoOpChildProcess { pid: 100, exit_code: 3 });
    let program = Program::new(ctx, config(Duration::ZERO), child, Arc::new(NoLineSanitizer));

    program.start(None).await;
    let state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(state, ProgramState::Failed);
    assert_eq!(program.exit_code(), Some(3));
}

#[tokio::test]
async fn spawn_failure_is_classified_as_crashed_with_no_exit_code() {
    let (ctx, observer) = context("main");
    let child = Arc::new(CrashingChildProcess);
    let program = Program::new(ctx, config(Duration::ZERO), child, Arc::new(NoLineSanitizer));

    program.start(None).await;
    let state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(state, ProgramState::Crashed);
    assert_eq!(program.exit_code(), None);
    assert!(observer.calls().iter().any(|c| matches!(c, ObserverCall::Crash { .. })));
}

#[tokio::test]
async fn interrupt_during_startup_delay_cancels_without_ever_running() {
    let (ctx, observer) = context("main");
    let child = Arc::new(FakeChildProcess { pid: 1, ..Default::default() });
    let program = Program::new(ctx, config(Duration::from_secs(60)), child, Arc::new(NoLineSanitizer));

    let state = program.start(Some(Duration::from_secs(2))).await;
    assert_eq!(state, ProgramState::Waiting);

    program.interrupt();
    let final_state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(final_state, ProgramState::Canceled);
    assert!(program.exit_code().is_none());
    assert!(
        !observer.calls().iter().any(|c| matches!(c, ObserverCall::Run { .. })),
        "a canceled program must never fork a child"
    );
}

#[tokio::test]
async fn terminate_while_running_stops_the_child_and_reports_stopped() {
    let (ctx, observer) = context("main");
    let notify = Arc::new(tokio::sync::Notify::new());
    let child = Arc::new(SignalledChildProcess { pid: 55, exit_code: 143, notify });
    let program = Program::new(ctx, config(Duration::ZERO), child, Arc::new(NoLineSanitizer));

    let state = program.start(Some(Duration::from_secs(2))).await;
    assert!(state >= ProgramState::Running);

    program.terminate();
    let final_state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(final_state, ProgramState::Stopped);
    assert_eq!(program.exit_code(), Some(143));
    assert!(observer.calls().iter().any(|c| matches!(c, ObserverCall::Terminate)));
}

#[tokio::test]
async fn interrupt_and_terminate_are_idempotent_after_the_first_call() {
    let (ctx, _observer) = context("main");
    let notify = Arc::new(tokio::sync::Notify::new());
    let child = Arc::new(SignalledChildProcess { pid: 55, exit_code: 143, notify });
    let program = Program::new(ctx, config(Duration::ZERO), child, Arc::new(NoLineSanitizer));

    program.start(Some(Duration::from_secs(2))).await;
    program.terminate();
    // A second stop request after the program is already STOPPING/terminal
    // must not panic or change the eventual outcome.
    program.terminate();
    program.interrupt();

    let final_state = program.join_wait(Some(Duration::from_secs(2))).await;
    assert_eq!(final_state, ProgramState::Stopped);
}
