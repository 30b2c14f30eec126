// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drains a child's stdio stream line-by-line into `tracing`, mirroring the
//! background log-reader thread the supervisor originally ran per stream.

use std::sync::Arc;
use std::time::Duration;

use encab_core::{LineSanitizer, LogLevel, NoLineSanitizer};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const DEFAULT_WAIT_CLOSE: Duration = Duration::from_secs(1);

fn emit(level: LogLevel, program: &str, line: &str) {
    match level {
        LogLevel::Error => tracing::error!(program, "{line}"),
        LogLevel::Warn => tracing::warn!(program, "{line}"),
        LogLevel::Info => tracing::info!(program, "{line}"),
        LogLevel::Debug => tracing::debug!(program, "{line}"),
    }
}

/// A record at `level` is emitted iff it is at least as severe as
/// `threshold` (§3 `ProgramConfig::loglevel` — "minimum severity for this
/// program's logger" applies to its stdio pumps, not just its lifecycle
/// events).
fn enabled(level: LogLevel, threshold: LogLevel) -> bool {
    level <= threshold
}

/// Renders a byte slice the way the original pump logged bytes it could
/// not decode: a Python-`bytes`-literal-flavoured repr, readable without
/// losing any information about what was actually on the wire.
fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('b');
    out.push('\'');
    for &b in bytes {
        match b {
            b'\\' | b'\'' => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('\'');
    out
}

/// Reads one stdio stream to completion, emitting one log record per line.
pub struct LogPump {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogPump {
    /// Spawns the draining task and returns immediately. `threshold` is
    /// the owning program's configured `loglevel`; a line at `level` more
    /// verbose than `threshold` is still read (the pipe must stay drained
    /// or the child could block writing to it) but never reaches `tracing`.
    pub fn start<R>(
        reader: R,
        level: LogLevel,
        threshold: LogLevel,
        program: String,
        sanitizer: Arc<dyn LineSanitizer>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let emit_lines = enabled(level, threshold);
        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw).await {
                    Ok(0) => break,
                    Ok(_) => {
                        // A clean close with a trailing partial line (no
                        // terminator) still reports that line; only a
                        // genuinely empty read ends the pump.
                        let had_terminator = raw.last() == Some(&b'\n');
                        let content = if had_terminator { &raw[..raw.len() - 1] } else { &raw[..] };
                        let line = match std::str::from_utf8(content) {
                            Ok(s) => s.trim_end_matches(['\r', '\n', '\t', ' ']).to_string(),
                            Err(_) => {
                                if enabled(LogLevel::Error, threshold) {
                                    emit(
                                        LogLevel::Error,
                                        &program,
                                        &format!("could not decode line, raw bytes: {}", bytes_repr(content)),
                                    );
                                }
                                continue;
                            }
                        };
                        let sanitized = sanitizer.sanitize(&line);
                        if emit_lines {
                            emit(level, &program, &sanitized);
                        }
                        if !had_terminator {
                            break;
                        }
                    }
                    Err(error) => {
                        tracing::error!(program = program.as_str(), %error, "I/O error while logging child output");
                        break;
                    }
                }
            }
        });
        Self { handle: Mutex::new(Some(handle)) }
    }

    /// Spawns a pump with no sanitizer.
    pub fn start_unsanitized<R>(reader: R, level: LogLevel, threshold: LogLevel, program: String) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self::start(reader, level, threshold, program, Arc::new(NoLineSanitizer))
    }

    /// Blocks until the stream has been fully drained or `timeout` elapses.
    /// Always returns; never propagates the drain task's own errors.
    pub async fn wait_close(&self, timeout: Duration) {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.take() {
            // Timing out abandons the task in the background rather than
            // aborting it, matching the original's bounded `Event.wait`.
            let _ = tokio::time::timeout(timeout, handle).await;
        }
    }

    pub fn default_wait_close_timeout() -> Duration {
        DEFAULT_WAIT_CLOSE
    }
}

#[cfg(test)]
#[path = "logpump_tests.rs"]
mod tests;
