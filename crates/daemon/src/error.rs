// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `BootstrapError` is the one error type `main` matches to pick an exit
//! code (§6/§7): everything raised before the orchestrator starts running
//! collapses into one of these three variants.

use encab_core::ConfigError;
use encab_engine::ExtensionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Invalid YAML, unknown option, bad user/group/umask, or an extension
    /// settings failure. Exit code 2.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Config file missing or unreadable. Exit code 1.
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Resolving/applying the supervisor's own uid/gid failed. Exit code 77.
    #[error("insufficient permission to apply configured identity: {0}")]
    Permission(String),
}

impl From<ExtensionError> for BootstrapError {
    fn from(error: ExtensionError) -> Self {
        BootstrapError::Config(ConfigError::InvalidFormat {
            location: format!("extensions.{}", error.name),
            message: error.message,
        })
    }
}

impl BootstrapError {
    /// The exit code this error surfaces as (§6).
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::Config(_) => 2,
            BootstrapError::Io(_) => 1,
            BootstrapError::Permission(_) => 77,
        }
    }
}
