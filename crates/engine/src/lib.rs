// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! encab-engine: the multi-program orchestrator, the per-program execution
//! driver, and the extension bus that binds them to the built-in
//! extensions defined in `encab-daemon`.

pub mod error;
pub mod extension;
pub mod orchestrator;
pub mod program;

pub use error::ExtensionError;
pub use extension::{Extension, ExtensionBus, LoggerBuilder};
pub use orchestrator::{ChildFactory, Orchestrator};
pub use program::Program;
