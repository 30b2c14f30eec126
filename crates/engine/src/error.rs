// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised by extension hooks.

use thiserror::Error;

/// Raised by [`crate::extension::Extension::validate`] or
/// [`crate::extension::Extension::configure`] when an extension's own
/// `settings:` payload is malformed. Unlike the other three hooks (which
/// are fan-out/best-effort, §4.5), these two gate startup: the bus
/// propagates the first one it sees out of [`crate::extension::ExtensionBus::build`],
/// and Bootstrap turns it into a `ConfigError` (exit code 2).
#[derive(Debug, Error, Clone)]
#[error("extension {name}: {message}")]
pub struct ExtensionError {
    pub name: String,
    pub message: String,
}

impl ExtensionError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }
}
