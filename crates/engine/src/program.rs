// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composes one `ChildProcess`, one `StateMachine`, and two `LogPump`s into
//! the execution driver described in SPEC_FULL §4.4.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use encab_core::{
    EffectiveProgramConfig, ExecutionContext, LineSanitizer, LogLevel, ProgramCommand,
    ProgramState, Signal, StateMachine,
};
use encab_process::{ChildProcess, LogPump, SpawnSpec, UnixSignal};

fn display_argv(command: &ProgramCommand) -> Vec<String> {
    match command {
        ProgramCommand::Exec(argv) => argv.clone(),
        ProgramCommand::Shell(script) => vec!["sh".to_string(), "-c".to_string(), script.clone()],
    }
}

fn map_signal(sig: Signal) -> UnixSignal {
    match sig {
        Signal::Int => UnixSignal::Int,
        Signal::Term => UnixSignal::Term,
    }
}

/// One program's full lifecycle: startup delay, spawn, log pumps, exit
/// classification. Runs exactly once; `start` may only be called once per
/// instance (mirrors "a program runs exactly once per supervisor
/// lifetime", §1).
pub struct Program {
    context: ExecutionContext,
    config: EffectiveProgramConfig,
    state: Arc<StateMachine>,
    child: Arc<dyn ChildProcess>,
    sanitizer: Arc<dyn LineSanitizer>,
    pumps: Mutex<(Option<LogPump>, Option<LogPump>)>,
    exit_code: Mutex<Option<i32>>,
    task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Program {
    pub fn new(
        context: ExecutionContext,
        config: EffectiveProgramConfig,
        child: Arc<dyn ChildProcess>,
        sanitizer: Arc<dyn LineSanitizer>,
    ) -> Arc<Self> {
        let state = Arc::new(StateMachine::new(context.observer().clone()));
        Arc::new(Self {
            context,
            config,
            state,
            child,
            sanitizer,
            pumps: Mutex::new((None, None)),
            exit_code: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// The bounded wait the orchestrator grants this program when joining
    /// it during shutdown (§4.6 `join_time`).
    pub fn join_time(&self) -> Duration {
        self.config.join_time
    }

    pub fn state(&self) -> ProgramState {
        self.state.get()
    }

    #[allow(clippy::unwrap_used)]
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock().unwrap()
    }

    /// Spawns the execution task (once) and waits for it to reach a stable
    /// point: `WAITING` (still inside `startup_delay`) or `>= RUNNING`
    /// (started or already finished).
    pub async fn start(self: &Arc<Self>, timeout: Option<Duration>) -> ProgramState {
        {
            let mut task = self.task.lock().await;
            if task.is_none() {
                let this = self.clone();
                *task = Some(tokio::spawn(async move { this.run().await }));
            }
        }
        self.state.wait_for_startup(timeout).await
    }

    pub fn interrupt(&self) -> ProgramState {
        let child = self.child.clone();
        self.state.kill(move |sig| child.signal(map_signal(sig)), Signal::Int)
    }

    pub fn terminate(&self) -> ProgramState {
        let child = self.child.clone();
        self.state.kill(move |sig| child.signal(map_signal(sig)), Signal::Term)
    }

    /// Returns once past the waiting-to-run boundary, or still `WAITING`.
    pub async fn join(&self, timeout: Option<Duration>) -> ProgramState {
        self.state.join(timeout).await
    }

    /// Returns only on a strictly terminal state.
    pub async fn join_wait(&self, timeout: Option<Duration>) -> ProgramState {
        self.state.join_wait(timeout).await
    }

    async fn run(self: Arc<Self>) {
        self.context.observer().on_start();

        // `wait` can return `Ok` even when a concurrent `kill` published
        // CANCELING right as the delay elapsed — `tokio::select!` makes no
        // ordering promise between two branches becoming ready together.
        // Re-check the published state before advancing past it so that
        // race never trips `StateMachine::set`'s monotonicity assertion or
        // spawns a child that was just canceled.
        let canceled = self.state.wait(self.config.startup_delay).await.is_err()
            || self.state.get() >= ProgramState::Canceling;
        if canceled {
            self.context.observer().on_cancel();
            self.state.set(ProgramState::Canceled);
            return;
        }

        let command_display = display_argv(&self.config.command);
        self.context.observer().on_execution(&command_display, self.context.environment());
        self.state.set(ProgramState::Starting);

        let spec = SpawnSpec {
            command: self.config.command.clone(),
            environment: self.context.environment().clone(),
            user: self.config.user,
            group: self.config.group,
            umask: self.config.umask,
            directory: self.config.directory.clone(),
            start_new_session: true,
            reap_zombies: self.config.reap_zombies,
        };

        let this = self.clone();
        let on_started: Box<dyn FnOnce(u32, _, _) + Send> = Box::new(move |pid, stdout, stderr| {
            this.attach(pid, stdout, stderr);
        });

        match self.child.execute(&spec, on_started).await {
            Ok(exit_code) => {
                self.drain_pumps().await;
                #[allow(clippy::unwrap_used)]
                {
                    *self.exit_code.lock().unwrap() = Some(exit_code);
                }
                self.state.handle_exit(exit_code);
            }
            Err(error) => {
                self.context.observer().on_crash(&command_display, &error.to_string());
                self.state.set(ProgramState::Crashed);
            }
        }
    }

    /// Fired from `ChildProcess::execute`'s `on_started` callback: records
    /// the pid, advances to RUNNING (unless a concurrent stop request has
    /// already moved past it), and attaches both log pumps.
    fn attach(
        &self,
        pid: u32,
        stdout: Option<tokio::process::ChildStdout>,
        stderr: Option<tokio::process::ChildStderr>,
    ) {
        if self.state.get() < ProgramState::Stopping {
            self.state.set(ProgramState::Running);
        }
        self.context.observer().on_run(pid);

        let name = self.context.name().to_string();
        #[allow(clippy::unwrap_used)]
        let mut pumps = self.pumps.lock().unwrap();
        if let Some(stdout) = stdout {
            pumps.0 = Some(LogPump::start(
                stdout,
                LogLevel::Info,
                self.config.loglevel,
                name.clone(),
                self.sanitizer.clone(),
            ));
        }
        if let Some(stderr) = stderr {
            pumps.1 = Some(LogPump::start(
                stderr,
                LogLevel::Error,
                self.config.loglevel,
                name,
                self.sanitizer.clone(),
            ));
        }
    }

    async fn drain_pumps(&self) {
        #[allow(clippy::unwrap_used)]
        let (stdout, stderr) = {
            let mut pumps = self.pumps.lock().unwrap();
            (pumps.0.take(), pumps.1.take())
        };
        if let Some(pump) = stdout {
            pump.wait_close(LogPump::default_wait_close_timeout()).await;
        }
        if let Some(pump) = stderr {
            pump.wait_close(LogPump::default_wait_close_timeout()).await;
        }
    }
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
