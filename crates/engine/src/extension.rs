// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The extension bus (§4.5): a fixed, registration-ordered set of lifecycle
//! hooks that the built-in extensions (startup-script runner, log
//! sanitizer, config validator, log collector — defined in `encab-daemon`,
//! §6 of SPEC_FULL) plug into.

use std::collections::HashMap;
use std::sync::Arc;

use encab_core::{EnvironmentExtender, LineSanitizer, NoLineSanitizer};
use indexmap::IndexMap;

use crate::error::ExtensionError;

/// Accumulates the sanitizers extensions attach to a single program's
/// logger via [`Extension::update_logger`]. Stands in for "a logger object
/// extensions add filters/handlers to" (§4.5) — `encab-core` only has a
/// narrow `LineSanitizer` seam, so that is what gets built up here.
#[derive(Default)]
pub struct LoggerBuilder {
    sanitizers: Vec<Arc<dyn LineSanitizer>>,
}

impl LoggerBuilder {
    pub fn add_sanitizer(&mut self, sanitizer: Arc<dyn LineSanitizer>) {
        self.sanitizers.push(sanitizer);
    }

    /// Folds every added sanitizer into one, applied in registration order.
    pub fn build(self) -> Arc<dyn LineSanitizer> {
        if self.sanitizers.is_empty() {
            Arc::new(NoLineSanitizer)
        } else {
            Arc::new(ChainedSanitizer(self.sanitizers))
        }
    }
}

struct ChainedSanitizer(Vec<Arc<dyn LineSanitizer>>);

impl LineSanitizer for ChainedSanitizer {
    fn sanitize(&self, line: &str) -> String {
        let mut current = line.to_string();
        for sanitizer in &self.0 {
            current = sanitizer.sanitize(&current);
        }
        current
    }
}

/// One of the fixed set of lifecycle hooks a built-in extension may
/// implement. All methods default to a no-op so an extension only
/// overrides what it actually does.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Dry-run only: read-only check of `settings`, no mutation permitted.
    fn validate(&self, _enabled: bool, _settings: &serde_json::Value) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Startup, once per declared extension. May mutate the extension's own
    /// internal state (e.g. parse and cache `settings`).
    fn configure(&self, _enabled: bool, _settings: &serde_json::Value) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Fired every time a new `ExecutionContext` is built.
    fn extend_environment(&self, _program_name: &str, _env: &mut HashMap<String, String>) {}

    /// Fired once per new program logger.
    fn update_logger(&self, _program_name: &str, _logger: &mut LoggerBuilder) {}

    /// Fired once, after the orchestrator returns.
    fn programs_ended(&self) {}
}

/// Holds the fixed set of registered extensions plus which of them the
/// configuration document actually enabled, and dispatches each hook in
/// registration order.
pub struct ExtensionBus {
    enabled: Vec<Arc<dyn Extension>>,
}

impl ExtensionBus {
    /// Builds the bus from the fixed `registry` (registration order is
    /// preserved) and the `extensions:` section of the configuration. An
    /// extension not named in `declared` is never configured and never
    /// fires its per-program hooks — declaring it is how a user opts in.
    ///
    /// Calls `validate` (dry-run) or `configure` (normal startup) on every
    /// declared extension found in `registry`; the first failure aborts
    /// construction, matching "extension settings failure" being a
    /// `ConfigError` at the Bootstrap boundary.
    pub fn build(
        registry: Vec<Arc<dyn Extension>>,
        declared: &IndexMap<String, encab_core::ExtensionConfig>,
        dry_run: bool,
    ) -> Result<Self, ExtensionError> {
        let mut enabled = Vec::new();
        for extension in registry {
            let Some(config) = declared.get(extension.name()) else {
                continue;
            };
            if dry_run {
                extension.validate(config.enabled, &config.settings)?;
            } else {
                extension.configure(config.enabled, &config.settings)?;
            }
            if config.enabled {
                enabled.push(extension);
            }
        }
        Ok(Self { enabled })
    }

    /// An empty bus: no extensions declared, used by tests and by any call
    /// site that has not wired up configuration yet.
    pub fn empty() -> Self {
        Self { enabled: Vec::new() }
    }

    pub fn update_logger(&self, program_name: &str) -> Arc<dyn LineSanitizer> {
        let mut builder = LoggerBuilder::default();
        for extension in &self.enabled {
            extension.update_logger(program_name, &mut builder);
        }
        builder.build()
    }

    pub fn programs_ended(&self) {
        for extension in &self.enabled {
            extension.programs_ended();
        }
    }
}

impl EnvironmentExtender for ExtensionBus {
    fn extend_environment(&self, program_name: &str, environment: &mut HashMap<String, String>) {
        for extension in &self.enabled {
            extension.extend_environment(program_name, environment);
        }
    }
}

#[cfg(test)]
#[path = "extension_tests.rs"]
mod tests;
