// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles shared by every crate that needs a `ProgramObserver` without
//! wiring up real logging.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::ProgramObserver;
use crate::state::ProgramState;

/// One recorded observer callback, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverCall {
    Start,
    Execution { command: Vec<String> },
    Run { pid: u32 },
    Exit { code: i32 },
    Interrupt,
    Terminate,
    Cancel,
    Crash { command: Vec<String>, error: String },
    Stopped,
    StateChange { from: ProgramState, to: ProgramState },
    Wait { delay: Duration },
    WaitTimeout,
}

/// Records every callback it receives, for assertions like "main transitions
/// INIT -> WAITING -> CANCELING -> CANCELED and never fires on_run".
#[derive(Clone)]
pub struct FakeProgramObserver {
    name: String,
    calls: Arc<Mutex<Vec<ObserverCall>>>,
}

impl FakeProgramObserver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> Vec<ObserverCall> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(clippy::unwrap_used)]
    fn push(&self, call: ObserverCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProgramObserver for FakeProgramObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&self) {
        self.push(ObserverCall::Start);
    }

    fn on_execution(&self, command: &[String], _env: &HashMap<String, String>) {
        self.push(ObserverCall::Execution { command: command.to_vec() });
    }

    fn on_run(&self, pid: u32) {
        self.push(ObserverCall::Run { pid });
    }

    fn on_exit(&self, exit_code: i32) {
        self.push(ObserverCall::Exit { code: exit_code });
    }

    fn on_interrupt(&self) {
        self.push(ObserverCall::Interrupt);
    }

    fn on_terminate(&self) {
        self.push(ObserverCall::Terminate);
    }

    fn on_cancel(&self) {
        self.push(ObserverCall::Cancel);
    }

    fn on_crash(&self, command: &[String], error: &str) {
        self.push(ObserverCall::Crash { command: command.to_vec(), error: error.to_string() });
    }

    fn on_stopped(&self) {
        self.push(ObserverCall::Stopped);
    }

    fn on_state_change(&self, from: ProgramState, to: ProgramState) {
        self.push(ObserverCall::StateChange { from, to });
    }

    fn on_wait(&self, delay: Duration) {
        self.push(ObserverCall::Wait { delay });
    }

    fn on_wait_timeout(&self) {
        self.push(ObserverCall::WaitTimeout);
    }

    fn spawn(&self, name: &str) -> Arc<dyn ProgramObserver> {
        Arc::new(Self::new(name))
    }
}
