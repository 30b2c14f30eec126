// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The real `ProgramObserver`: turns every lifecycle callback into a
//! `tracing` event carrying the program's name, gated by that program's
//! own configured `loglevel` (§3 `ProgramConfig::loglevel`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use encab_core::{LogLevel, ProgramObserver, ProgramState};

fn level_to_byte(level: LogLevel) -> u8 {
    match level {
        LogLevel::Error => 0,
        LogLevel::Warn => 1,
        LogLevel::Info => 2,
        LogLevel::Debug => 3,
    }
}

fn byte_to_level(byte: u8) -> LogLevel {
    match byte {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

/// Emits lifecycle events through `tracing`, at the level the original
/// Python supervisor used for the same callback: structural transitions
/// at DEBUG/INFO, stop requests at INFO, crashes/failures at ERROR.
/// Every event is suppressed if it is more verbose than this program's
/// configured minimum severity, mirroring how `LogPump` gates stdout.
///
/// The threshold lives behind an `AtomicU8` rather than a plain field:
/// `Program::new` builds the context (and, through it, the observer)
/// before `EffectiveProgramConfig` is known, so `set_loglevel` patches the
/// threshold in after the fact, through a shared `&self`.
pub struct TracingProgramObserver {
    name: String,
    loglevel: AtomicU8,
}

impl TracingProgramObserver {
    pub fn new(name: impl Into<String>, loglevel: LogLevel) -> Self {
        Self { name: name.into(), loglevel: AtomicU8::new(level_to_byte(loglevel)) }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level <= byte_to_level(self.loglevel.load(Ordering::Relaxed))
    }
}

impl ProgramObserver for TracingProgramObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&self) {
        if self.enabled(LogLevel::Debug) {
            tracing::debug!(program = %self.name, "starting up");
        }
    }

    fn on_execution(&self, command: &[String], _env: &HashMap<String, String>) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(program = %self.name, command = ?command, "executing");
        }
    }

    fn on_run(&self, pid: u32) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(program = %self.name, pid, "running");
        }
    }

    fn on_exit(&self, exit_code: i32) {
        if self.enabled(LogLevel::Error) {
            tracing::error!(program = %self.name, exit_code, "exited with a nonzero code");
        }
    }

    fn on_interrupt(&self) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(program = %self.name, "interrupting");
        }
    }

    fn on_terminate(&self) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(program = %self.name, "terminating");
        }
    }

    fn on_cancel(&self) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(program = %self.name, "canceled during startup delay");
        }
    }

    fn on_crash(&self, command: &[String], error: &str) {
        if self.enabled(LogLevel::Error) {
            tracing::error!(program = %self.name, command = ?command, %error, "crashed");
        }
    }

    fn on_stopped(&self) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(program = %self.name, "stopped");
        }
    }

    fn on_state_change(&self, from: ProgramState, to: ProgramState) {
        if self.enabled(LogLevel::Debug) {
            tracing::debug!(program = %self.name, %from, %to, "state transition");
        }
    }

    fn on_wait(&self, delay: Duration) {
        if self.enabled(LogLevel::Debug) {
            tracing::debug!(program = %self.name, delay_secs = delay.as_secs_f64(), "waiting before startup");
        }
    }

    fn on_wait_timeout(&self) {
        if self.enabled(LogLevel::Debug) {
            tracing::debug!(program = %self.name, "wait timed out");
        }
    }

    fn spawn(&self, name: &str) -> Arc<dyn ProgramObserver> {
        Arc::new(Self {
            name: name.to_string(),
            loglevel: AtomicU8::new(self.loglevel.load(Ordering::Relaxed)),
        })
    }

    fn set_loglevel(&self, level: LogLevel) {
        self.loglevel.store(level_to_byte(level), Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
