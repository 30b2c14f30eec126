// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The four built-in extensions (§4.5, §9): statically known, registered
//! in a fixed order, and individually minimal. A config's `extensions:`
//! section can only enable/configure these by name — there is no dynamic
//! loading of third-party extension code.

mod log_collector;
mod log_sanitizer;
mod startup_script;
mod validation;

use std::sync::Arc;

use encab_engine::Extension;

pub use log_collector::LogCollectorExtension;
pub use log_sanitizer::LogSanitizerExtension;
pub use startup_script::StartupScriptExtension;
pub use validation::ValidationExtension;

/// The fixed registration order the bus dispatches hooks in.
pub fn registry() -> Vec<Arc<dyn Extension>> {
    vec![
        Arc::new(StartupScriptExtension::new()),
        Arc::new(LogSanitizerExtension::new()),
        Arc::new(ValidationExtension::new()),
        Arc::new(LogCollectorExtension::new()),
    ]
}
