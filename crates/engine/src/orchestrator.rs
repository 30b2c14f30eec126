// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the main program and its helpers, serialises startup, and reverses
//! the start order on shutdown (§4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use encab_core::{Config, ConfigError, ExecutionContext, ProgramCommand, ProgramConfig};
use encab_process::ChildProcess;

use crate::extension::ExtensionBus;
use crate::program::Program;

/// Produces a fresh `ChildProcess` for each program the orchestrator
/// builds. A real daemon passes `|| Arc::new(UnixChildProcess::new())`;
/// tests substitute fakes.
pub type ChildFactory = dyn Fn() -> Arc<dyn ChildProcess> + Send + Sync;

pub struct Orchestrator {
    main: Arc<Program>,
    helpers: Vec<Arc<Program>>,
    extension_bus: Arc<ExtensionBus>,
}

impl Orchestrator {
    /// Builds the program set from a validated `Config`: resolves the
    /// main/helper split (declared `main:` entry, CLI override, or a
    /// synthesized main from argv alone), applies EncabConfig field
    /// inheritance, and wires each program's `ExecutionContext` through the
    /// extension bus.
    pub fn build(
        config: &Config,
        root_context: &ExecutionContext,
        cli_argv: Vec<String>,
        extension_bus: Arc<ExtensionBus>,
        child_factory: &ChildFactory,
    ) -> Result<Self, ConfigError> {
        let mut declared = config.programs.clone();
        let main_declared = declared.shift_remove("main");

        let main_config = match (main_declared, cli_argv.is_empty()) {
            (Some(mut main_config), false) => {
                main_config.command = ProgramCommand::Exec(cli_argv);
                main_config
            }
            (Some(main_config), true) => main_config,
            (None, false) => synthesize_main(cli_argv),
            (None, true) => return Err(ConfigError::NoMainProgram),
        };

        let helpers = declared
            .into_iter()
            .map(|(name, program_config)| {
                build_program(&name, program_config, &config.encab, root_context, &extension_bus, child_factory)
            })
            .collect();

        let main = build_program("main", main_config, &config.encab, root_context, &extension_bus, child_factory);

        Ok(Self { main, helpers, extension_bus })
    }

    /// Starts every helper (serialised, one fully up before the next
    /// starts), then main; blocks on main's terminal state; stops helpers
    /// in reverse declaration order; fans `programs_ended` out to
    /// extensions. Returns main's exit code.
    pub async fn run(&self) -> Option<i32> {
        self.start().await;
        self.main.join_wait(None).await;
        self.stop_helpers_reverse().await;
        self.extension_bus.programs_ended();
        self.exit_code()
    }

    /// Same setup as `run`, but does not block on main's completion.
    pub async fn start(&self) {
        for helper in &self.helpers {
            helper.start(Some(helper.join_time())).await;
        }
        self.main.start(None).await;
    }

    /// Signals main and every helper (reverse order) to stop. Non-blocking
    /// and idempotent — safe to call directly from a signal handler.
    pub fn terminate(&self) {
        self.main.terminate();
        for helper in self.helpers.iter().rev() {
            helper.terminate();
        }
    }

    /// As `terminate`, but delivers SIGINT instead of SIGTERM.
    pub fn interrupt(&self) {
        self.main.interrupt();
        for helper in self.helpers.iter().rev() {
            helper.interrupt();
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.main.exit_code()
    }

    pub fn main(&self) -> &Arc<Program> {
        &self.main
    }

    pub fn helpers(&self) -> &[Arc<Program>] {
        &self.helpers
    }

    /// Two full passes, not interleaved: every helper is signalled (reverse
    /// declaration order) before any helper is joined, so a slow-to-exit
    /// earlier helper never delays signal delivery to a later one.
    async fn stop_helpers_reverse(&self) {
        for helper in self.helpers.iter().rev() {
            helper.terminate();
        }
        for helper in self.helpers.iter().rev() {
            helper.join(Some(helper.join_time())).await;
        }
    }
}

fn synthesize_main(cli_argv: Vec<String>) -> ProgramConfig {
    ProgramConfig {
        command: ProgramCommand::Exec(cli_argv),
        environment: HashMap::new(),
        user: None,
        group: None,
        umask: None,
        directory: None,
        startup_delay: Duration::ZERO,
        join_time: None,
        loglevel: None,
        reap_zombies: false,
    }
}

fn build_program(
    name: &str,
    program_config: ProgramConfig,
    defaults: &encab_core::EncabConfig,
    root_context: &ExecutionContext,
    extension_bus: &Arc<ExtensionBus>,
    child_factory: &ChildFactory,
) -> Arc<Program> {
    let effective = program_config.with_defaults(defaults);
    let context = root_context.spawn(name, &effective.environment, extension_bus.as_ref());
    context.observer().set_loglevel(effective.loglevel);
    let sanitizer = extension_bus.update_logger(name);
    Program::new(context, effective, child_factory(), sanitizer)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
