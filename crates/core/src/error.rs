// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration validation errors.

use thiserror::Error;

/// Errors raised while deserializing or validating an encab configuration
/// document. All of these surface as exit code 2 from the daemon.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("invalid configuration at {location}: {message}")]
    InvalidFormat { location: String, message: String },

    #[error("program {program}: exactly one of `command` or `sh` must be set")]
    CommandShMutuallyExclusive { program: String },

    #[error("program {program}: neither `command` nor `sh` is set")]
    CommandShMissing { program: String },

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("invalid umask: {0}")]
    InvalidUmask(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid environment variable name: {0}")]
    InvalidEnvName(String),

    #[error(
        "program {program} requests user {requested} but the supervisor is running as uid {current} (not 0)"
    )]
    InsufficientPrivilegeForUser { program: String, requested: String, current: u32 },

    #[error(
        "program {program} requests reap_zombies but the supervisor is running as uid {current} (not 0)"
    )]
    InsufficientPrivilegeForReapZombies { program: String, current: u32 },

    #[error("no program named `main` is declared and no CLI override argv was given")]
    NoMainProgram,

    #[error("ENCAB_DRY_RUN must be \"1\" or \"0\", got: {0}")]
    InvalidDryRunOverride(String),
}
