// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution contexts and the observer interface programs report through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LogLevel;
use crate::state::ProgramState;

/// Narrow callback interface a [`StateMachine`](crate::state::StateMachine)
/// and [`Program`] report lifecycle events through. One instance is scoped
/// to exactly one program; `spawn` produces the instance for a child
/// program, mirroring the parent/child structure of [`ExecutionContext`].
pub trait ProgramObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_start(&self);
    fn on_execution(&self, command: &[String], env: &HashMap<String, String>);
    fn on_run(&self, pid: u32);
    fn on_exit(&self, exit_code: i32);
    fn on_interrupt(&self);
    fn on_terminate(&self);
    fn on_cancel(&self);
    fn on_crash(&self, command: &[String], error: &str);
    fn on_stopped(&self);
    fn on_state_change(&self, from: ProgramState, to: ProgramState);
    fn on_wait(&self, delay: Duration);
    fn on_wait_timeout(&self);

    /// Produces the observer for a newly spawned child program.
    fn spawn(&self, name: &str) -> Arc<dyn ProgramObserver>;

    /// Adjusts the minimum severity this observer emits at, to the owning
    /// program's own resolved `loglevel` (§3). Called once, right after
    /// `spawn`, by whichever code builds the `Program` — `ExecutionContext`
    /// itself has no opinion on logging thresholds, so this is how that
    /// per-program config field actually reaches the logger. Observers
    /// that do not filter by severity (e.g. test doubles) leave this a
    /// no-op.
    fn set_loglevel(&self, _level: LogLevel) {}
}

/// Implemented by the extension bus; kept as a trait here so
/// `encab-core` does not depend on `encab-engine`. Consulted every time a
/// new [`ExecutionContext`] is assembled.
pub trait EnvironmentExtender: Send + Sync {
    fn extend_environment(&self, program_name: &str, environment: &mut HashMap<String, String>);
}

/// A no-op extender, useful for tests and for call sites that have no bus
/// wired in yet.
pub struct NoEnvironmentExtender;

impl EnvironmentExtender for NoEnvironmentExtender {
    fn extend_environment(&self, _program_name: &str, _environment: &mut HashMap<String, String>) {}
}

/// Redacts substrings from a single already-decoded log line before it
/// reaches the formatter. Implemented by the `log_sanitizer` extension;
/// kept as a trait here for the same reason as [`EnvironmentExtender`].
pub trait LineSanitizer: Send + Sync {
    fn sanitize(&self, line: &str) -> String;
}

/// A no-op sanitizer, used when no `log_sanitizer` extension is configured.
pub struct NoLineSanitizer;

impl LineSanitizer for NoLineSanitizer {
    fn sanitize(&self, line: &str) -> String {
        line.to_string()
    }
}

/// The environment and observer a program executes with. `extend` overlays
/// environment onto the same logical program; `spawn` additionally creates
/// a new named child observer scope. Both return an independent context;
/// neither mutates `self`.
#[derive(Clone)]
pub struct ExecutionContext {
    name: String,
    environment: HashMap<String, String>,
    observer: Arc<dyn ProgramObserver>,
}

impl ExecutionContext {
    pub fn new(
        environment: HashMap<String, String>,
        observer: Arc<dyn ProgramObserver>,
        extender: &dyn EnvironmentExtender,
    ) -> Self {
        let name = observer.name().to_string();
        let mut environment = environment;
        extender.extend_environment(&name, &mut environment);
        Self { name, environment, observer }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    pub fn observer(&self) -> &Arc<dyn ProgramObserver> {
        &self.observer
    }

    /// Returns a new context whose environment is `self`'s, overlaid by
    /// `overlay` (overlay wins on key collision). `self` is left untouched.
    pub fn extend(&self, overlay: &HashMap<String, String>, extender: &dyn EnvironmentExtender) -> Self {
        let mut environment = self.environment.clone();
        if !overlay.is_empty() {
            environment.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        extender.extend_environment(&self.name, &mut environment);
        Self { name: self.name.clone(), environment, observer: self.observer.clone() }
    }

    /// Returns a context for a newly spawned child program: a fresh
    /// observer scope plus the parent environment overlaid by `overlay`.
    pub fn spawn(
        &self,
        name: impl Into<String>,
        overlay: &HashMap<String, String>,
        extender: &dyn EnvironmentExtender,
    ) -> Self {
        let name = name.into();
        let observer = self.observer.spawn(&name);
        let mut environment = self.environment.clone();
        if !overlay.is_empty() {
            environment.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        extender.extend_environment(&name, &mut environment);
        Self { name, environment, observer }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
