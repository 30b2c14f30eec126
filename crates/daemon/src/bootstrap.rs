// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires every other module into a runnable daemon (§4.7): resolves and
//! loads configuration, sets up logging, registers the built-in
//! extensions, applies the supervisor's own identity, installs signal
//! handlers, and runs the orchestrator through to an exit code.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use encab_core::{Config, ExecutionContext, NoEnvironmentExtender};
use encab_engine::{ExtensionBus, Orchestrator};
use encab_process::UnixChildProcess;
use tracing_subscriber::prelude::*;

use crate::error::BootstrapError;
use crate::extensions;
use crate::formatter::TemplateFormatter;
use crate::identity;
use crate::observer::TracingProgramObserver;
use crate::{config_source, signals};

/// Bootstraps and runs the daemon to completion, returning the process
/// exit code (§6). `explicit_config_path` models the "stream argument"
/// form from §4.7; `cli_argv` is the candidate CLI override for `main`.
pub async fn run(explicit_config_path: Option<&Path>, cli_argv: Vec<String>) -> i32 {
    match try_run(explicit_config_path, cli_argv).await {
        Ok(code) => code,
        Err(error) => {
            // No logger may exist yet (config failures can happen before
            // `setup_logging` runs), so this is the one place the daemon
            // writes straight to stderr rather than through `tracing`.
            eprintln!("encab: {error}");
            error.exit_code()
        }
    }
}

async fn try_run(explicit_config_path: Option<&Path>, cli_argv: Vec<String>) -> Result<i32, BootstrapError> {
    let document = config_source::load_document(explicit_config_path)?;
    let current_uid = nix::unistd::Uid::current().as_raw();
    let config = Config::load(&document, current_uid)?
        .apply_dry_run_override(std::env::var("ENCAB_DRY_RUN").ok().as_deref())?;

    if config.encab.dry_run {
        ExtensionBus::build(extensions::registry(), &config.extensions, true)?;
        println!("encab: configuration is valid (dry run)");
        return Ok(0);
    }

    let _log_guard = setup_logging(&config.encab.logformat, config.encab.loglevel);
    let bus = Arc::new(ExtensionBus::build(extensions::registry(), &config.extensions, false)?);

    identity::apply_self(config.encab.user, config.encab.group, config.encab.umask)?;

    let root_observer: Arc<dyn encab_core::ProgramObserver> =
        Arc::new(TracingProgramObserver::new("root", config.encab.loglevel));
    let root_context =
        ExecutionContext::new(HashMap::new(), root_observer, &NoEnvironmentExtender).extend(&config.encab.environment, bus.as_ref());

    let child_factory = || -> Arc<dyn encab_process::ChildProcess> { Arc::new(UnixChildProcess::new()) };
    let orchestrator = Arc::new(
        Orchestrator::build(&config, &root_context, cli_argv, bus.clone(), &child_factory)
            .map_err(BootstrapError::Config)?,
    );

    signals::install(orchestrator.clone());

    let exit_code = orchestrator.run().await;

    if config.encab.halt_on_exit {
        tracing::info!("halt_on_exit is set; blocking forever");
        std::future::pending::<()>().await;
    }

    Ok(exit_code.unwrap_or(71))
}

fn setup_logging(
    logformat: &str,
    loglevel: encab_core::LogLevel,
) -> tracing_appender::non_blocking::WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(loglevel.as_tracing_level().to_string()));

    // `try_init` rather than `init`: a global subscriber can only be
    // installed once per process, and repeated `Bootstrap::run` calls in
    // tests must not panic on the second attempt.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(TemplateFormatter::parse(logformat))
                .with_writer(non_blocking),
        )
        .try_init();

    guard
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
