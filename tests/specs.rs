//! Coverage of the six end-to-end scenarios and the cross-cutting
//! invariants: real-process tests for scenarios that are specifically
//! about process exit codes and signal delivery, in-process tests for
//! everything that can be observed without forking a real child.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_cmd::Command;
use encab_core::{
    EffectiveProgramConfig, ExecutionContext, LineSanitizer, LogLevel, NoEnvironmentExtender,
    NoLineSanitizer, ProgramCommand, ProgramObserver, ProgramState,
};
use encab_core::test_support::{FakeProgramObserver, ObserverCall};
use encab_engine::Program;
use encab_process::{FakeChildProcess, LogPump};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

// --- Scenarios 1-3: real `encab` binary, real /bin/echo and /bin/sleep ---

#[test]
fn scenario_1_echo_main_sleep_helper_sigterm() {
    // Main exits almost immediately; the orchestrator's own shutdown path
    // sends SIGTERM to the still-running helper and waits `join_time`
    // before the process itself exits. No manual signal delivery needed:
    // the SIGTERM in the scenario's name is the one the supervisor sends.
    Command::cargo_bin("encab")
        .unwrap()
        .env("ENCAB_CONFIG", fixture("echo_main_sleep_helper.yaml"))
        .timeout(Duration::from_secs(5))
        .assert()
        .success();
}

#[test]
fn scenario_2_main_crash_exits_71() {
    // The configured main binary does not exist; main goes straight to
    // CRASHED, `Orchestrator::exit_code()` is `None`, and bootstrap falls
    // back to the "unknown child termination" code (§6/§7).
    Command::cargo_bin("encab")
        .unwrap()
        .env("ENCAB_CONFIG", fixture("main_crash.yaml"))
        .timeout(Duration::from_secs(5))
        .assert()
        .failure()
        .code(71);
}

#[test]
fn scenario_3_cli_argv_overrides_the_configured_main_command() {
    // Config declares `echo Main`; CLI argv replaces it wholesale with
    // `echo Custom Main`. Main's stdout is piped through the log pump into
    // the supervisor's own tracing output (stderr), so the overridden
    // argument is what should show up there, not the configured one.
    let output = Command::cargo_bin("encab")
        .unwrap()
        .env("ENCAB_CONFIG", fixture("cli_override.yaml"))
        .args(["/bin/echo", "Custom Main"])
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .get_output()
        .clone();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Custom Main"), "expected overridden argv in output, got: {stderr}");
}

// --- Scenario 4: cancel during startup wait, driven in-process ---

fn effective_config(command: ProgramCommand, startup_delay: Duration) -> EffectiveProgramConfig {
    EffectiveProgramConfig {
        command,
        environment: HashMap::new(),
        user: None,
        group: None,
        umask: -1,
        directory: None,
        startup_delay,
        join_time: Duration::from_millis(200),
        loglevel: LogLevel::Info,
        reap_zombies: false,
    }
}

fn root_context(observer: Arc<dyn ProgramObserver>) -> ExecutionContext {
    ExecutionContext::new(HashMap::new(), observer, &NoEnvironmentExtender)
}

#[tokio::test]
async fn scenario_4_interrupting_a_waiting_program_cancels_it_before_it_ever_forks() {
    let observer = Arc::new(FakeProgramObserver::new("waiter"));
    let context = root_context(observer.clone());
    let config = effective_config(
        ProgramCommand::Exec(vec!["/bin/true".to_string()]),
        Duration::from_secs(1),
    );
    let child = Arc::new(FakeChildProcess { pid: 42, ..Default::default() });
    let program = Program::new(context, config, child, Arc::new(NoLineSanitizer));

    program.start(Some(Duration::from_millis(300))).await;
    assert_eq!(program.state(), ProgramState::Waiting);

    program.interrupt();
    let final_state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(final_state, ProgramState::Canceled);
    let calls = observer.calls();
    assert!(
        !calls.iter().any(|c| matches!(c, ObserverCall::Run { .. })),
        "no child should ever have been forked, got {calls:?}"
    );
    assert!(calls.contains(&ObserverCall::Cancel));
}

// --- Scenario 5: log ordering, driven against a raw LogPump ---

/// Captures every sanitized line in order, standing in for the `tracing`
/// records a real `ProgramObserver`/subscriber pair would emit.
#[derive(Default, Clone)]
struct RecordingSanitizer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LineSanitizer for RecordingSanitizer {
    fn sanitize(&self, line: &str) -> String {
        #[allow(clippy::unwrap_used)]
        self.lines.lock().unwrap().push(line.to_string());
        line.to_string()
    }
}

#[tokio::test]
async fn scenario_5_stdout_lines_are_emitted_in_order_and_stripped() {
    use tokio::io::AsyncWriteExt;

    let (mut writer, reader) = tokio::io::duplex(4096);
    let sanitizer = RecordingSanitizer::default();
    let pump = LogPump::start(
        reader,
        LogLevel::Info,
        LogLevel::Info,
        "main".to_string(),
        Arc::new(sanitizer.clone()),
    );

    writer.write_all(b"line 0\nline 1\nline 2\n").await.unwrap();
    drop(writer);
    pump.wait_close(Duration::from_secs(5)).await;

    #[allow(clippy::unwrap_used)]
    let lines = sanitizer.lines.lock().unwrap().clone();
    assert_eq!(lines, vec!["line 0", "line 1", "line 2"]);
}

// --- Scenario 6: environment overlay, driven against ExecutionContext ---

#[test]
fn scenario_6_helper_and_main_each_see_only_their_own_overlay() {
    let mut root_env = HashMap::new();
    root_env.insert("X".to_string(), "1".to_string());
    let observer = Arc::new(FakeProgramObserver::new("root"));
    let root = ExecutionContext::new(root_env, observer, &NoEnvironmentExtender);

    let mut helper_overlay = HashMap::new();
    helper_overlay.insert("Y".to_string(), "2".to_string());
    let helper = root.spawn("helper", &helper_overlay, &NoEnvironmentExtender);

    let mut main_overlay = HashMap::new();
    main_overlay.insert("Z".to_string(), "3".to_string());
    let main = root.spawn("main", &main_overlay, &NoEnvironmentExtender);

    let mut expected_helper = HashMap::new();
    expected_helper.insert("X".to_string(), "1".to_string());
    expected_helper.insert("Y".to_string(), "2".to_string());
    assert_eq!(helper.environment(), &expected_helper);

    let mut expected_main = HashMap::new();
    expected_main.insert("X".to_string(), "1".to_string());
    expected_main.insert("Z".to_string(), "3".to_string());
    assert_eq!(main.environment(), &expected_main);

    assert!(!helper.environment().contains_key("Z"));
    assert!(!main.environment().contains_key("Y"));
}

// --- Cross-cutting invariants from §8 ---

#[tokio::test]
async fn a_failed_program_always_passed_through_running_first() {
    let observer = Arc::new(FakeProgramObserver::new("flaky"));
    let context = root_context(observer.clone());
    let config = effective_config(ProgramCommand::Exec(vec!["/bin/false".to_string()]), Duration::ZERO);
    let child = Arc::new(FakeChildProcess { pid: 7, exit_code: Mutex::new(1), ..Default::default() });
    let program = Program::new(context, config, child, Arc::new(NoLineSanitizer));

    program.start(None).await;
    let final_state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(final_state, ProgramState::Failed);
    assert_ne!(program.exit_code(), Some(0));
    let calls = observer.calls();
    let run_idx = calls.iter().position(|c| matches!(c, ObserverCall::Run { .. })).unwrap();
    let exit_idx = calls.iter().position(|c| matches!(c, ObserverCall::Exit { .. })).unwrap();
    assert!(run_idx < exit_idx, "RUNNING must precede the terminal classification");
}

#[tokio::test]
async fn a_zero_exit_code_always_succeeds_regardless_of_prior_state() {
    let observer = Arc::new(FakeProgramObserver::new("clean"));
    let context = root_context(observer.clone());
    let config = effective_config(ProgramCommand::Exec(vec!["/bin/true".to_string()]), Duration::ZERO);
    let child = Arc::new(FakeChildProcess { pid: 9, exit_code: Mutex::new(0), ..Default::default() });
    let program = Program::new(context, config, child, Arc::new(NoLineSanitizer));

    program.start(None).await;
    let final_state = program.join_wait(Some(Duration::from_secs(2))).await;

    assert_eq!(final_state, ProgramState::Succeeded);
    assert_eq!(program.exit_code(), Some(0));
}

#[tokio::test]
async fn startup_delay_zero_never_enters_waiting() {
    let observer = Arc::new(FakeProgramObserver::new("instant"));
    let context = root_context(observer.clone());
    let config = effective_config(ProgramCommand::Exec(vec!["/bin/true".to_string()]), Duration::ZERO);
    let child = Arc::new(FakeChildProcess { pid: 3, exit_code: Mutex::new(0), ..Default::default() });
    let program = Program::new(context, config, child, Arc::new(NoLineSanitizer));

    program.start(None).await;
    program.join_wait(Some(Duration::from_secs(2))).await;

    assert!(
        !observer.calls().iter().any(|c| matches!(c, ObserverCall::Wait { .. })),
        "startup_delay=0 must skip WAITING entirely"
    );
}
