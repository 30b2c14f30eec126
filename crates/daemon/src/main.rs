// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI entry point (§4.7 expansion): positional-only argv override, no flag
//! parsing — a non-empty `argv` wholesale-replaces the configured main
//! program's command, matching the original tool's behavior.

#[tokio::main]
async fn main() {
    let cli_argv: Vec<String> = std::env::args().skip(1).collect();
    let exit_code = encab_daemon::run(None, cli_argv).await;
    std::process::exit(exit_code);
}
