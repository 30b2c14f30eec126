// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs a one-shot `sh -c` script before any program starts (§4.5).

use std::process::Command;

use encab_engine::{Extension, ExtensionError};

const NAME: &str = "startup_script";

pub struct StartupScriptExtension;

impl StartupScriptExtension {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StartupScriptExtension {
    fn default() -> Self {
        Self::new()
    }
}

fn script_setting(settings: &serde_json::Value) -> Result<Option<&str>, ExtensionError> {
    match settings.get("script") {
        None => Ok(None),
        Some(serde_json::Value::String(script)) if !script.is_empty() => Ok(Some(script.as_str())),
        Some(serde_json::Value::String(_)) => {
            Err(ExtensionError::new(NAME, "`script` must be a non-empty string"))
        }
        Some(_) => Err(ExtensionError::new(NAME, "`script` must be a string")),
    }
}

impl Extension for StartupScriptExtension {
    fn name(&self) -> &str {
        NAME
    }

    fn validate(&self, _enabled: bool, settings: &serde_json::Value) -> Result<(), ExtensionError> {
        script_setting(settings)?;
        Ok(())
    }

    fn configure(&self, enabled: bool, settings: &serde_json::Value) -> Result<(), ExtensionError> {
        let Some(script) = script_setting(settings)? else {
            return Ok(());
        };
        if !enabled {
            return Ok(());
        }

        tracing::info!(program = NAME, %script, "running startup script");
        match Command::new("sh").arg("-c").arg(script).output() {
            Ok(output) => {
                for line in String::from_utf8_lossy(&output.stdout).lines() {
                    tracing::info!(program = NAME, "{line}");
                }
                for line in String::from_utf8_lossy(&output.stderr).lines() {
                    tracing::error!(program = NAME, "{line}");
                }
                if !output.status.success() {
                    tracing::warn!(
                        program = NAME,
                        status = ?output.status.code(),
                        "startup script exited nonzero"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(program = NAME, %error, "failed to launch startup script");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "startup_script_tests.rs"]
mod tests;
