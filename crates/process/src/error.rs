// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised while forking, execing, or reaping a child process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn { command: String, #[source] source: std::io::Error },

    #[error("no passwd entry for uid {0}")]
    NoPasswdEntry(u32),

    #[error("wait() failed: {0}")]
    Wait(#[source] std::io::Error),
}
