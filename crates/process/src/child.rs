// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forking, execing, signalling, and reaping a single child process.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use encab_core::ProgramCommand;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::error::ProcessError;

/// System-error exit code used when a reap loop runs out of children before
/// observing the target pid's own termination.
pub const EX_NOCHILD: i32 = 71;

/// Parameters resolved once by config validation; `ChildProcess::execute`
/// assumes `user`/`group` are already-valid ids, never performing lookups.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub command: ProgramCommand,
    pub environment: HashMap<String, String>,
    pub user: Option<u32>,
    pub group: Option<u32>,
    pub umask: i32,
    pub directory: Option<String>,
    pub start_new_session: bool,
    pub reap_zombies: bool,
}

/// Delivered to a running child via [`ChildProcess::signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnixSignal {
    Int,
    Term,
    Kill,
}

impl UnixSignal {
    fn as_nix(self) -> nix::sys::signal::Signal {
        match self {
            UnixSignal::Int => nix::sys::signal::Signal::SIGINT,
            UnixSignal::Term => nix::sys::signal::Signal::SIGTERM,
            UnixSignal::Kill => nix::sys::signal::Signal::SIGKILL,
        }
    }
}

/// What a program needs from a forked child, decoupled from the concrete
/// `tokio::process::Child` so tests can run without forking anything.
#[async_trait]
pub trait ChildProcess: Send + Sync {
    /// Forks and execs, then blocks until the child terminates (or, with
    /// `reap_zombies`, until the whole session has been reaped). Invokes
    /// `on_started(pid, stdout, stderr)` once the pid is known and its
    /// piped stdio is available, but before the wait begins — this is the
    /// caller's one chance to attach `LogPump`s, since they must drain
    /// concurrently with the wait rather than after it completes.
    async fn execute(
        &self,
        spec: &SpawnSpec,
        on_started: Box<dyn FnOnce(u32, Option<ChildStdout>, Option<ChildStderr>) + Send>,
    ) -> Result<i32, ProcessError>;

    fn pid(&self) -> Option<u32>;
    fn signal(&self, sig: UnixSignal);
    fn kill(&self) {
        self.signal(UnixSignal::Kill);
    }
    fn terminate(&self) {
        self.signal(UnixSignal::Term);
    }
}

/// The real Unix implementation: forks via `tokio::process::Command`,
/// applying uid/gid/umask/session setup in a `pre_exec` hook exactly like
/// the original `Process.execute`'s `preexec_fn`.
pub struct UnixChildProcess {
    child: Mutex<Option<Child>>,
    pid: std::sync::atomic::AtomicU32,
}

impl Default for UnixChildProcess {
    fn default() -> Self {
        Self { child: Mutex::new(None), pid: std::sync::atomic::AtomicU32::new(0) }
    }
}

impl UnixChildProcess {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_command(spec: &SpawnSpec) -> Command {
        let mut command = match &spec.command {
            ProgramCommand::Exec(argv) => {
                let mut cmd = Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                cmd
            }
            ProgramCommand::Shell(script) => {
                let mut cmd = Command::new("/bin/sh");
                cmd.arg("-c").arg(script);
                cmd
            }
        };

        command.env_clear();
        command.envs(&spec.environment);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        if let Some(dir) = &spec.directory {
            command.current_dir(dir);
        }

        let gid = spec.group;
        let uid = spec.user;
        let umask = spec.umask;
        let start_new_session = spec.start_new_session;

        // SAFETY: the pre-exec closure runs in the forked child between
        // fork() and exec(); it only calls async-signal-safe libc/nix
        // functions (setsid, setgid, initgroups, setuid, umask) and never
        // allocates or touches Rust runtime state shared with the parent.
        unsafe {
            command.pre_exec(move || {
                if start_new_session && libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }

                if let Some(gid) = gid {
                    nix::unistd::setgid(nix::unistd::Gid::from_raw(gid))
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                }

                if let Some(uid) = uid {
                    let user = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?
                        .ok_or_else(|| {
                            std::io::Error::new(
                                std::io::ErrorKind::NotFound,
                                format!("no passwd entry for uid {uid}"),
                            )
                        })?;
                    nix::unistd::initgroups(
                        &std::ffi::CString::new(user.name).unwrap_or_default(),
                        nix::unistd::Gid::from_raw(user.gid.as_raw()),
                    )
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                    nix::unistd::setuid(nix::unistd::Uid::from_raw(uid))
                        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                }

                if umask != -1 {
                    libc::umask(umask as libc::mode_t);
                }

                Ok(())
            });
        }

        command
    }

    async fn wait_plain(child: &mut Child) -> Result<i32, ProcessError> {
        let status = child.wait().await.map_err(ProcessError::Wait)?;
        Ok(exit_code_of(status))
    }

    /// Mirrors `Process._wait_and_reap_zombies`: wait for any pid in the
    /// child's session, reaping every descendant, returning the status of
    /// the one pid the caller actually launched. If `waitpid` reports no
    /// children left in the session before the target pid was ever seen
    /// exiting, this is a system error, not a Rust-level failure: it
    /// surfaces as the ordinary exit code `EX_NOCHILD` (71), the same way
    /// any other exit status would.
    fn wait_and_reap(target_pid: i32) -> Result<i32, ProcessError> {
        loop {
            match waitpid(Pid::from_raw(-target_pid), Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(pid, code)) if pid.as_raw() == target_pid => return Ok(code),
                Ok(WaitStatus::Signaled(pid, signal, _)) if pid.as_raw() == target_pid => {
                    return Ok(128 + signal as i32);
                }
                Ok(WaitStatus::Exited(_, _)) | Ok(WaitStatus::Signaled(_, _, _)) => continue,
                Ok(WaitStatus::StillAlive) => continue,
                Ok(_) => continue,
                Err(nix::errno::Errno::ECHILD) => return Ok(EX_NOCHILD),
                Err(e) => return Err(ProcessError::Wait(std::io::Error::from_raw_os_error(e as i32))),
            }
        }
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        EX_NOCHILD
    }
}

#[async_trait]
impl ChildProcess for UnixChildProcess {
    async fn execute(
        &self,
        spec: &SpawnSpec,
        on_started: Box<dyn FnOnce(u32, Option<ChildStdout>, Option<ChildStderr>) + Send>,
    ) -> Result<i32, ProcessError> {
        let command_display = match &spec.command {
            ProgramCommand::Exec(argv) => argv.join(" "),
            ProgramCommand::Shell(script) => script.clone(),
        };

        let mut command = Self::build_command(spec);
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            command: command_display,
            source,
        })?;

        let pid = child.id().unwrap_or(0);
        self.pid.store(pid, std::sync::atomic::Ordering::SeqCst);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        on_started(pid, stdout, stderr);

        let exit_code = if spec.reap_zombies {
            let target_pid = pid as i32;
            tokio::task::spawn_blocking(move || Self::wait_and_reap(target_pid))
                .await
                .map_err(|e| ProcessError::Wait(std::io::Error::other(e)))??
        } else {
            Self::wait_plain(&mut child).await?
        };

        *self.child.lock().await = Some(child);
        Ok(exit_code)
    }

    fn pid(&self) -> Option<u32> {
        let pid = self.pid.load(std::sync::atomic::Ordering::SeqCst);
        if pid == 0 {
            None
        } else {
            Some(pid)
        }
    }

    fn signal(&self, sig: UnixSignal) {
        if let Some(pid) = self.pid() {
            // Matches the original's `os.kill` + swallow-ENOENT race against
            // the child exiting between the liveness check and the signal.
            let _ = nix::sys::signal::kill(Pid::from_raw(pid as i32), sig.as_nix());
        }
    }
}

/// A no-op double for tests that never need a real process: reports a fixed
/// pid and exit code without forking anything.
#[cfg(any(test, feature = "test-support"))]
pub struct NoOpChildProcess {
    pub pid: u32,
    pub exit_code: i32,
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ChildProcess for NoOpChildProcess {
    async fn execute(
        &self,
        _spec: &SpawnSpec,
        on_started: Box<dyn FnOnce(u32, Option<ChildStdout>, Option<ChildStderr>) + Send>,
    ) -> Result<i32, ProcessError> {
        on_started(self.pid, None, None);
        Ok(self.exit_code)
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn signal(&self, _sig: UnixSignal) {}
}

/// Records signals it receives, for assertions about a `Program`'s
/// kill/terminate behavior without touching a real process.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeChildProcess {
    pub pid: u32,
    pub exit_code: std::sync::Mutex<i32>,
    pub signals: Arc<std::sync::Mutex<Vec<UnixSignal>>>,
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ChildProcess for FakeChildProcess {
    async fn execute(
        &self,
        _spec: &SpawnSpec,
        on_started: Box<dyn FnOnce(u32, Option<ChildStdout>, Option<ChildStderr>) + Send>,
    ) -> Result<i32, ProcessError> {
        on_started(self.pid, None, None);
        #[allow(clippy::unwrap_used)]
        Ok(*self.exit_code.lock().unwrap())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn signal(&self, sig: UnixSignal) {
        #[allow(clippy::unwrap_used)]
        self.signals.lock().unwrap().push(sig);
    }
}

#[cfg(test)]
#[path = "child_tests.rs"]
mod tests;
