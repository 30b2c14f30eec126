// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Applies the supervisor's *own* uid/gid/umask from `encab:` config
//! (§4.7) — distinct from `encab-process`'s per-child pre-exec setup,
//! since this runs in the supervisor's own process, not a fork.

use crate::error::BootstrapError;

/// Sets gid, initializes supplementary groups, sets uid (in that order,
/// mirroring `encab-process::child`'s pre-exec sequence), then applies
/// umask. Any absent field is left untouched. Failures surface as
/// `BootstrapError::Permission`, mapped to exit code 77.
pub fn apply_self(user: Option<u32>, group: Option<u32>, umask: i32) -> Result<(), BootstrapError> {
    if let Some(gid) = group {
        nix::unistd::setgid(nix::unistd::Gid::from_raw(gid))
            .map_err(|e| BootstrapError::Permission(format!("setgid({gid}) failed: {e}")))?;
    }

    if let Some(uid) = user {
        let entry = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
            .map_err(|e| BootstrapError::Permission(format!("looking up uid {uid} failed: {e}")))?
            .ok_or_else(|| BootstrapError::Permission(format!("no passwd entry for uid {uid}")))?;

        let name = std::ffi::CString::new(entry.name)
            .map_err(|e| BootstrapError::Permission(format!("invalid user name: {e}")))?;
        nix::unistd::initgroups(&name, nix::unistd::Gid::from_raw(entry.gid.as_raw()))
            .map_err(|e| BootstrapError::Permission(format!("initgroups failed: {e}")))?;

        nix::unistd::setuid(nix::unistd::Uid::from_raw(uid))
            .map_err(|e| BootstrapError::Permission(format!("setuid({uid}) failed: {e}")))?;
    }

    if umask != -1 {
        let mode = nix::sys::stat::Mode::from_bits_truncate(umask as u32);
        nix::sys::stat::umask(mode);
    }

    Ok(())
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
