// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-program state machine: a totally ordered set of states, broadcast
//! to every waiter on each transition.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout as tokio_timeout;

use crate::context::ProgramObserver;

/// A program's lifecycle state. Ordered: a later variant always compares
/// greater than an earlier one. There is no transition back to an earlier
/// state once a later one has been published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ProgramState {
    Init = 0,
    Waiting = 1,
    Starting = 2,
    Running = 3,
    Canceling = 4,
    Stopping = 5,
    Canceled = 6,
    Crashed = 7,
    Stopped = 8,
    Failed = 9,
    Succeeded = 10,
}

impl ProgramState {
    /// True for any state the program can never leave.
    pub fn is_terminal(self) -> bool {
        self >= ProgramState::Canceled
    }
}

impl std::fmt::Display for ProgramState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProgramState::Init => "INIT",
            ProgramState::Waiting => "WAITING",
            ProgramState::Starting => "STARTING",
            ProgramState::Running => "RUNNING",
            ProgramState::Canceling => "CANCELING",
            ProgramState::Stopping => "STOPPING",
            ProgramState::Canceled => "CANCELED",
            ProgramState::Crashed => "CRASHED",
            ProgramState::Stopped => "STOPPED",
            ProgramState::Failed => "FAILED",
            ProgramState::Succeeded => "SUCCEEDED",
        };
        f.write_str(name)
    }
}

/// The signal family a `kill` request delivers. Distinct from the raw OS
/// signal number so that `encab-core` has no dependency on a signal crate;
/// encab-process maps this onto the real `nix::sys::signal::Signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Int,
    Term,
}

/// Raised by [`StateMachine::wait`] when cancellation arrives inside the
/// startup-delay window.
#[derive(Debug, Error, Clone, Copy)]
#[error("program canceled during startup wait")]
pub struct ProgramCanceled;

/// Holds one program's state and broadcasts every transition to current and
/// future waiters via a `tokio::sync::watch` channel. `set`/`kill`/
/// `handle_exit` are serialised against each other by an internal mutex so
/// that the check-then-publish sequence that enforces monotonicity is
/// atomic; reads never block on that mutex.
pub struct StateMachine {
    tx: watch::Sender<ProgramState>,
    guard: Mutex<()>,
    observer: std::sync::Arc<dyn ProgramObserver>,
}

impl StateMachine {
    pub fn new(observer: std::sync::Arc<dyn ProgramObserver>) -> Self {
        let (tx, _rx) = watch::channel(ProgramState::Init);
        Self { tx, guard: Mutex::new(()), observer }
    }

    pub fn get(&self) -> ProgramState {
        *self.tx.borrow()
    }

    /// Unconditional assignment, published to all waiters. Moving to a
    /// lesser-ordered state is a programming error: in debug builds it
    /// trips a `debug_assert`, in release builds it is silently clamped so
    /// the published state never regresses.
    pub fn set(&self, state: ProgramState) -> ProgramState {
        let _guard = self.guard.lock();
        self.publish(state)
    }

    fn publish(&self, state: ProgramState) -> ProgramState {
        let current = *self.tx.borrow();
        debug_assert!(
            state >= current,
            "StateMachine downgrade attempted: {current} -> {state}"
        );
        let next = state.max(current);
        if next != current {
            self.observer.on_state_change(current, next);
            // A send error means every receiver was dropped, which is fine:
            // nobody is left to observe the transition.
            let _ = self.tx.send(next);
        }
        next
    }

    /// Blocks until `predicate(current_state)` holds or `timeout` elapses.
    /// A `None` timeout waits indefinitely. On timeout, returns the current
    /// state rather than erroring.
    pub async fn wait_for(
        &self,
        predicate: impl Fn(&ProgramState) -> bool,
        timeout: Option<Duration>,
    ) -> ProgramState {
        let mut rx = self.tx.subscribe();
        if predicate(&rx.borrow()) {
            return *rx.borrow();
        }
        let wait = rx.wait_for(|s| predicate(s));
        match timeout {
            None => match wait.await {
                Ok(guard) => *guard,
                Err(_) => self.get(),
            },
            Some(d) => match tokio_timeout(d, wait).await {
                Ok(Ok(guard)) => *guard,
                Ok(Err(_)) | Err(_) => {
                    self.observer.on_wait_timeout();
                    self.get()
                }
            },
        }
    }

    /// `state == WAITING || state >= RUNNING`.
    pub async fn wait_for_startup(&self, timeout: Option<Duration>) -> ProgramState {
        self.wait_for(|s| *s == ProgramState::Waiting || *s >= ProgramState::Running, timeout)
            .await
    }

    /// `state == WAITING || state >= CANCELED`.
    pub async fn join(&self, timeout: Option<Duration>) -> ProgramState {
        self.wait_for(|s| *s == ProgramState::Waiting || *s >= ProgramState::Canceled, timeout)
            .await
    }

    /// `state >= CANCELED`, i.e. strictly terminal.
    pub async fn join_wait(&self, timeout: Option<Duration>) -> ProgramState {
        self.wait_for(|s| s.is_terminal(), timeout).await
    }

    /// Enters WAITING and blocks up to `delay`. Returns `Err(ProgramCanceled)`
    /// if the state reaches CANCELING before `delay` elapses. `delay == 0`
    /// returns immediately without ever entering WAITING.
    pub async fn wait(&self, delay: Duration) -> Result<(), ProgramCanceled> {
        if delay.is_zero() {
            return Ok(());
        }
        self.set(ProgramState::Waiting);
        self.observer.on_wait(delay);

        let mut rx = self.tx.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            res = rx.wait_for(|s| *s >= ProgramState::Canceling) => {
                match res {
                    Ok(_) => Err(ProgramCanceled),
                    Err(_) => Ok(()),
                }
            }
        }
    }

    /// Classifies a completed child exit against the state that was current
    /// just before the call (RUNNING, STOPPING, or neither).
    pub fn handle_exit(&self, exit_code: i32) -> ProgramState {
        let _guard = self.guard.lock();
        let prior = *self.tx.borrow();
        let next = if exit_code == 0 {
            ProgramState::Succeeded
        } else if prior == ProgramState::Running {
            ProgramState::Failed
        } else if prior == ProgramState::Stopping {
            ProgramState::Stopped
        } else {
            ProgramState::Crashed
        };

        match next {
            ProgramState::Failed => self.observer.on_exit(exit_code),
            ProgramState::Stopped => self.observer.on_stopped(),
            _ => {}
        }

        self.publish(next)
    }

    /// External stop request. WAITING programs are released into CANCELING;
    /// STARTING/RUNNING programs move to STOPPING and `deliver` is invoked
    /// with `sig`. Anything else (INIT, already CANCELING/STOPPING, or any
    /// terminal state) is a no-op, making repeated calls idempotent.
    pub fn kill(&self, deliver: impl FnOnce(Signal), sig: Signal) -> ProgramState {
        let _guard = self.guard.lock();
        let current = *self.tx.borrow();
        match current {
            ProgramState::Waiting => self.publish(ProgramState::Canceling),
            ProgramState::Starting | ProgramState::Running => {
                let next = self.publish(ProgramState::Stopping);
                deliver(sig);
                match sig {
                    Signal::Int => self.observer.on_interrupt(),
                    Signal::Term => self.observer.on_terminate(),
                }
                next
            }
            _ => current,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
