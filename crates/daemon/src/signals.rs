// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installs the process-level SIGINT/SIGTERM handlers (§4.7, §6): the
//! first of either signal routes to `Orchestrator::interrupt`/`terminate`;
//! any further signal is a no-op at the orchestrator and this loop exits so
//! the process can proceed to terminate on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use encab_engine::Orchestrator;
use tokio::signal::unix::{signal, SignalKind};

/// Spawns the signal-handling task. Returns immediately; the task runs for
/// the life of the process (or until the first signal is handled).
pub fn install(orchestrator: Arc<Orchestrator>) {
    tokio::spawn(async move {
        run(orchestrator).await;
    });
}

async fn run(orchestrator: Arc<Orchestrator>) {
    let Ok(mut sigint) = signal(SignalKind::interrupt()) else { return };
    let Ok(mut sigterm) = signal(SignalKind::terminate()) else { return };
    let handled = AtomicBool::new(false);

    loop {
        let exit_code = tokio::select! {
            _ = sigint.recv() => {
                if handled.swap(true, Ordering::SeqCst) {
                    130
                } else {
                    tracing::info!("received SIGINT, interrupting");
                    orchestrator.interrupt();
                    continue;
                }
            }
            _ = sigterm.recv() => {
                if handled.swap(true, Ordering::SeqCst) {
                    143
                } else {
                    tracing::info!("received SIGTERM, terminating");
                    orchestrator.terminate();
                    continue;
                }
            }
        };
        // A second signal after the first is a no-op at the orchestrator
        // (interrupt/terminate are already idempotent); this handler takes
        // it as a request to stop waiting on a graceful shutdown.
        std::process::exit(exit_code);
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
