// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tails an external file's appended content into the root logger (§4.5).
//! `tail -F` semantics reimplemented via polling the file's length, since
//! this built-in has no process of its own to attach to.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use encab_engine::{Extension, ExtensionError};

const NAME: &str = "log_collector";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct LogCollectorExtension {
    follower: Mutex<Option<Follower>>,
}

struct Follower {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl LogCollectorExtension {
    pub fn new() -> Self {
        Self { follower: Mutex::new(None) }
    }
}

impl Default for LogCollectorExtension {
    fn default() -> Self {
        Self::new()
    }
}

fn path_setting(settings: &serde_json::Value) -> Result<Option<PathBuf>, ExtensionError> {
    match settings.get("path") {
        None => Ok(None),
        Some(serde_json::Value::String(path)) if !path.is_empty() => Ok(Some(PathBuf::from(path))),
        Some(serde_json::Value::String(_)) => {
            Err(ExtensionError::new(NAME, "`path` must be a non-empty string"))
        }
        Some(_) => Err(ExtensionError::new(NAME, "`path` must be a string")),
    }
}

fn follow(path: PathBuf, stop: Arc<AtomicBool>) {
    let mut offset = File::open(&path).and_then(|f| f.metadata()).map(|m| m.len()).unwrap_or(0);

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(POLL_INTERVAL);

        let Ok(mut file) = File::open(&path) else { continue };
        let Ok(metadata) = file.metadata() else { continue };
        let len = metadata.len();
        if len < offset {
            // The file was truncated or rotated out from under us; restart
            // from the beginning.
            offset = 0;
        }
        if len <= offset {
            continue;
        }
        if file.seek(SeekFrom::Start(offset)).is_err() {
            continue;
        }
        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_ok() {
            for line in buf.lines() {
                tracing::info!(program = NAME, "{line}");
            }
        }
        offset = len;
    }
}

impl Extension for LogCollectorExtension {
    fn name(&self) -> &str {
        NAME
    }

    fn validate(&self, _enabled: bool, settings: &serde_json::Value) -> Result<(), ExtensionError> {
        path_setting(settings)?;
        Ok(())
    }

    fn configure(&self, enabled: bool, settings: &serde_json::Value) -> Result<(), ExtensionError> {
        let Some(path) = path_setting(settings)? else {
            return Ok(());
        };
        if !enabled {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || follow(path, stop))
        };
        #[allow(clippy::unwrap_used)]
        {
            *self.follower.lock().unwrap() = Some(Follower { stop, handle });
        }
        Ok(())
    }

    fn programs_ended(&self) {
        #[allow(clippy::unwrap_used)]
        let follower = self.follower.lock().unwrap().take();
        if let Some(follower) = follower {
            follower.stop.store(true, Ordering::Relaxed);
            let _ = follower.handle.join();
        }
    }
}

#[cfg(test)]
#[path = "log_collector_tests.rs"]
mod tests;
