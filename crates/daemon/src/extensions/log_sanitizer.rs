// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redacts configured substrings from every emitted log line (§4.5).
//! Literal substring matching only — no regex engine, no entropy-based
//! secret detection (explicit non-goal).

use std::sync::RwLock;

use encab_core::LineSanitizer;
use encab_engine::{Extension, ExtensionError, LoggerBuilder};

const NAME: &str = "log_sanitizer";
const REDACTED: &str = "***";

pub struct LogSanitizerExtension {
    patterns: RwLock<Vec<String>>,
}

impl LogSanitizerExtension {
    pub fn new() -> Self {
        Self { patterns: RwLock::new(Vec::new()) }
    }
}

impl Default for LogSanitizerExtension {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_patterns(settings: &serde_json::Value) -> Result<Vec<String>, ExtensionError> {
    match settings.get("patterns") {
        None => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ExtensionError::new(NAME, "`patterns` entries must be strings"))
            })
            .collect(),
        Some(_) => Err(ExtensionError::new(NAME, "`patterns` must be a list of strings")),
    }
}

struct SubstringRedactor {
    patterns: Vec<String>,
}

impl LineSanitizer for SubstringRedactor {
    fn sanitize(&self, line: &str) -> String {
        let mut redacted = line.to_string();
        for pattern in &self.patterns {
            if pattern.is_empty() {
                continue;
            }
            redacted = redacted.replace(pattern.as_str(), REDACTED);
        }
        redacted
    }
}

impl Extension for LogSanitizerExtension {
    fn name(&self) -> &str {
        NAME
    }

    fn validate(&self, _enabled: bool, settings: &serde_json::Value) -> Result<(), ExtensionError> {
        parse_patterns(settings)?;
        Ok(())
    }

    fn configure(&self, _enabled: bool, settings: &serde_json::Value) -> Result<(), ExtensionError> {
        let patterns = parse_patterns(settings)?;
        #[allow(clippy::unwrap_used)]
        {
            *self.patterns.write().unwrap() = patterns;
        }
        Ok(())
    }

    fn update_logger(&self, _program_name: &str, logger: &mut LoggerBuilder) {
        #[allow(clippy::unwrap_used)]
        let patterns = self.patterns.read().unwrap().clone();
        if patterns.is_empty() {
            return;
        }
        logger.add_sanitizer(std::sync::Arc::new(SubstringRedactor { patterns }));
    }
}

#[cfg(test)]
#[path = "log_sanitizer_tests.rs"]
mod tests;
