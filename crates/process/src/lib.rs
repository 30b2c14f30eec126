// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Pre-exec uid/gid/umask/session setup requires raw libc calls; see the
// crate-level lint override in Cargo.toml.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! encab-process: forking, execing, signalling, reaping, and log-draining a
//! single child process.

pub mod child;
pub mod error;
pub mod logpump;

pub use child::{ChildProcess, SpawnSpec, UnixChildProcess, UnixSignal, EX_NOCHILD};
#[cfg(any(test, feature = "test-support"))]
pub use child::{FakeChildProcess, NoOpChildProcess};
pub use error::ProcessError;
pub use logpump::LogPump;
