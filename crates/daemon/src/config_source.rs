// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves *where* the configuration document comes from (§4.7): an
//! explicit path, the `ENCAB_CONFIG` environment variable, or the first of
//! a fixed list of conventional locations.

use std::path::{Path, PathBuf};

/// Conventional config locations tried in order, matching the original's
/// `encab.yml`/`encab.yaml` search under the current directory and `/etc`.
const DEFAULT_LOCATIONS: &[&str] = &["./encab.yml", "./encab.yaml", "/etc/encab.yml", "/etc/encab.yaml"];

/// Reads the configuration document's raw text. `explicit_path` models the
/// "stream argument" form from §4.7 — a caller-supplied path (e.g. from a
/// CLI flag in a future revision) takes precedence over everything else.
pub fn load_document(explicit_path: Option<&Path>) -> std::io::Result<String> {
    if let Some(path) = explicit_path {
        return std::fs::read_to_string(path);
    }

    if let Ok(env_path) = std::env::var("ENCAB_CONFIG") {
        return std::fs::read_to_string(env_path);
    }

    for candidate in DEFAULT_LOCATIONS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return std::fs::read_to_string(path);
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!(
            "no configuration found: set ENCAB_CONFIG or place one of {} in the current directory or /etc",
            DEFAULT_LOCATIONS.join(", ")
        ),
    ))
}

#[cfg(test)]
#[path = "config_source_tests.rs"]
mod tests;
