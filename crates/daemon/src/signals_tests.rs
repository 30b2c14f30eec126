// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use encab_core::{Config, ExecutionContext, NoEnvironmentExtender, ProgramState};
use encab_engine::{ExtensionBus, Orchestrator};
use encab_process::NoOpChildProcess;
use serial_test::serial;

use super::install;

struct RecordingObserver {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl encab_core::ProgramObserver for RecordingObserver {
    fn name(&self) -> &str {
        &self.name
    }
    fn on_start(&self) {}
    fn on_execution(&self, _command: &[String], _env: &HashMap<String, String>) {}
    fn on_run(&self, _pid: u32) {}
    fn on_exit(&self, _exit_code: i32) {}
    fn on_interrupt(&self) {
        #[allow(clippy::unwrap_used)]
        self.log.lock().unwrap().push(format!("{}:interrupt", self.name));
    }
    fn on_terminate(&self) {
        #[allow(clippy::unwrap_used)]
        self.log.lock().unwrap().push(format!("{}:terminate", self.name));
    }
    fn on_cancel(&self) {}
    fn on_crash(&self, _command: &[String], _error: &str) {}
    fn on_stopped(&self) {}
    fn on_state_change(&self, _from: ProgramState, _to: ProgramState) {}
    fn on_wait(&self, _delay: Duration) {}
    fn on_wait_timeout(&self) {}

    fn spawn(&self, name: &str) -> Arc<dyn encab_core::ProgramObserver> {
        Arc::new(Self { name: name.to_string(), log: self.log.clone() })
    }
}

/// A real SIGINT delivered to this test process must be observed by the
/// installed handler exactly once, and must route to `Orchestrator::interrupt`.
/// Serialised against other tests in this crate that also raise process
/// signals, since `tokio::signal::unix` streams are process-wide.
#[tokio::test]
#[serial(encab_process_signals)]
async fn sigint_routes_to_orchestrator_interrupt() {
    let yaml = r#"
programs:
  main:
    command: ["/bin/true"]
"#;
    let config = Config::load(yaml, 1000).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let root = ExecutionContext::new(
        HashMap::new(),
        Arc::new(RecordingObserver { name: "root".to_string(), log: log.clone() }),
        &NoEnvironmentExtender,
    );
    let bus = Arc::new(ExtensionBus::empty());
    let factory = || -> Arc<dyn encab_process::ChildProcess> { Arc::new(NoOpChildProcess { pid: 1, exit_code: 0 }) };

    let orchestrator = Arc::new(Orchestrator::build(&config, &root, Vec::new(), bus, &factory).unwrap());
    install(orchestrator.clone());

    // Give the signal task a moment to register its streams before we
    // raise, then raise SIGINT against our own process.
    tokio::time::sleep(Duration::from_millis(50)).await;
    #[allow(clippy::unwrap_used)]
    nix::sys::signal::raise(nix::sys::signal::Signal::SIGINT).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    #[allow(clippy::unwrap_used)]
    let captured = log.lock().unwrap().clone();
    assert!(captured.iter().any(|entry| entry == "main:interrupt"));
}
