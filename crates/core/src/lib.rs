// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! encab-core: configuration, execution contexts, and the per-program
//! state machine shared by every other Encab crate.

pub mod config;
pub mod context;
pub mod error;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{
    Config, EffectiveProgramConfig, EncabConfig, ExtensionConfig, LogLevel, ProgramCommand,
    ProgramConfig,
};
pub use context::{
    EnvironmentExtender, ExecutionContext, LineSanitizer, NoEnvironmentExtender, NoLineSanitizer,
    ProgramObserver,
};
pub use error::ConfigError;
pub use state::{ProgramCanceled, ProgramState, Signal, StateMachine};
