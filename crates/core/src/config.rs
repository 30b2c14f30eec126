// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration document model: YAML deserialization plus the field-level
//! validation the original dataclasses performed in `__post_init__`.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_FORMAT: &str = "%(levelname)-5.5s %(program)s: %(message)s";
const DEBUG_FORMAT: &str = "%(asctime)s %(levelname)-5.5s %(module)s %(program)s %(threadName)s: %(message)s";

/// Minimum severity for a program's logger. `CRITICAL`/`FATAL` are accepted
/// on input (matching the original's Python logging aliases) but collapse
/// to `Error`, since `tracing` has no separate fatal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_uppercase().as_str() {
            "CRITICAL" | "FATAL" | "ERROR" => Ok(Self::Error),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            _ => Err(ConfigError::InvalidLogLevel(raw.to_string())),
        }
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// A program's argv, resolved to exactly one of the two mutually exclusive
/// forms declared in YAML.
#[derive(Debug, Clone)]
pub enum ProgramCommand {
    /// Executed directly, no shell involved.
    Exec(Vec<String>),
    /// Executed as `sh -c <script>`.
    Shell(String),
}

/// A fully validated, but not yet EncabConfig-inherited, program
/// declaration. Fields that EncabConfig also carries stay `Option` so
/// [`ProgramConfig::with_defaults`] can tell "unset" from "explicitly set".
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub command: ProgramCommand,
    pub environment: HashMap<String, String>,
    pub user: Option<u32>,
    pub group: Option<u32>,
    pub umask: Option<i32>,
    pub directory: Option<String>,
    pub startup_delay: Duration,
    pub join_time: Option<Duration>,
    pub loglevel: Option<LogLevel>,
    pub reap_zombies: bool,
}

/// `ProgramConfig` with every EncabConfig-inheritable field resolved to a
/// concrete value. What `Program` actually executes against.
#[derive(Debug, Clone)]
pub struct EffectiveProgramConfig {
    pub command: ProgramCommand,
    pub environment: HashMap<String, String>,
    pub user: Option<u32>,
    pub group: Option<u32>,
    pub umask: i32,
    pub directory: Option<String>,
    pub startup_delay: Duration,
    pub join_time: Duration,
    pub loglevel: LogLevel,
    pub reap_zombies: bool,
}

impl ProgramConfig {
    /// Overlays every field this program left unset with `defaults`' value
    /// (EncabConfig's role as a defaults provider, §4.6 step 1). Unlike the
    /// inheritable scalar fields, `environment` is never replaced here —
    /// it is merged additively at the `ExecutionContext` layer instead, so
    /// a helper's own small `environment:` map never loses the root
    /// environment wholesale.
    pub fn with_defaults(&self, defaults: &EncabConfig) -> EffectiveProgramConfig {
        EffectiveProgramConfig {
            command: self.command.clone(),
            environment: self.environment.clone(),
            user: self.user.or(defaults.user),
            group: self.group.or(defaults.group),
            umask: self.umask.unwrap_or(defaults.umask),
            directory: self.directory.clone(),
            startup_delay: self.startup_delay,
            join_time: self.join_time.unwrap_or(defaults.join_time),
            loglevel: self.loglevel.unwrap_or(defaults.loglevel),
            reap_zombies: self.reap_zombies,
        }
    }
}

/// The `encab:` section: per-supervisor defaults plus supervisor-only
/// options (`halt_on_exit`, `logformat`, `dry_run`).
#[derive(Debug, Clone)]
pub struct EncabConfig {
    pub environment: HashMap<String, String>,
    pub user: Option<u32>,
    pub group: Option<u32>,
    pub umask: i32,
    pub loglevel: LogLevel,
    pub join_time: Duration,
    pub halt_on_exit: bool,
    pub logformat: String,
    pub dry_run: bool,
}

impl Default for EncabConfig {
    fn default() -> Self {
        Self {
            environment: HashMap::new(),
            user: None,
            group: None,
            umask: -1,
            loglevel: LogLevel::Info,
            join_time: Duration::from_secs_f64(1.0),
            halt_on_exit: false,
            logformat: DEFAULT_FORMAT.to_string(),
            dry_run: false,
        }
    }
}

/// An `extensions:` entry. The original's `module` key (dynamic third-party
/// extension loading) is accepted for document compatibility but never
/// resolved: Encab's extension set is the fixed built-in set (§4.5, §9).
#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    pub enabled: bool,
    pub settings: serde_json::Value,
}

/// The fully validated configuration document.
#[derive(Debug, Clone)]
pub struct Config {
    pub encab: EncabConfig,
    pub extensions: IndexMap<String, ExtensionConfig>,
    pub programs: IndexMap<String, ProgramConfig>,
}

impl Config {
    /// Parses and validates a YAML document. `current_uid` is the
    /// supervisor's own uid at the time of loading, needed to enforce the
    /// `user`/`reap_zombies` privilege invariants (§3).
    pub fn load(yaml: &str, current_uid: u32) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;

        let encab = normalize_encab(raw.encab)?;

        let mut extensions = IndexMap::new();
        for (name, raw_ext) in raw.extensions {
            extensions.insert(name, normalize_extension(raw_ext));
        }

        let mut programs = IndexMap::new();
        for (name, raw_prog) in raw.programs {
            let program = normalize_program(&name, raw_prog, current_uid)?;
            programs.insert(name, program);
        }

        Ok(Self { encab, extensions, programs })
    }

    /// Applies the `ENCAB_DRY_RUN` environment override to an already
    /// loaded config's `dry_run` flag. `"1"` forces true, `"0"` forces
    /// false, absent/empty leaves the config's own value, anything else is
    /// a configuration error.
    pub fn apply_dry_run_override(mut self, raw_value: Option<&str>) -> Result<Self, ConfigError> {
        match raw_value {
            None | Some("") => {}
            Some("1") => self.encab.dry_run = true,
            Some("0") => self.encab.dry_run = false,
            Some(other) => return Err(ConfigError::InvalidDryRunOverride(other.to_string())),
        }
        Ok(self)
    }
}

fn validate_env_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if starts_ok && rest_ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvName(name.to_string()))
    }
}

fn validate_environment(env: &HashMap<String, String>) -> Result<(), ConfigError> {
    for key in env.keys() {
        validate_env_name(key)?;
    }
    Ok(())
}

fn parse_umask(raw: &UmaskValue) -> Result<i32, ConfigError> {
    match raw {
        UmaskValue::Int(n) => Ok(*n),
        UmaskValue::Str(s) => i32::from_str_radix(s.trim(), 8)
            .map_err(|_| ConfigError::InvalidUmask(s.clone())),
    }
}

fn resolve_user(raw: &UserOrGroup) -> Result<u32, ConfigError> {
    match raw {
        UserOrGroup::Id(id) => Ok(*id),
        UserOrGroup::Name(name) => users::get_user_by_name(name)
            .map(|u| u.uid())
            .ok_or_else(|| ConfigError::UnknownUser(name.clone())),
    }
}

fn resolve_group(raw: &UserOrGroup) -> Result<u32, ConfigError> {
    match raw {
        UserOrGroup::Id(id) => Ok(*id),
        UserOrGroup::Name(name) => users::get_group_by_name(name)
            .map(|g| g.gid())
            .ok_or_else(|| ConfigError::UnknownGroup(name.clone())),
    }
}

fn nonnegative_duration(location: &str, seconds: f64) -> Result<Duration, ConfigError> {
    if seconds.is_sign_negative() || seconds.is_nan() {
        return Err(ConfigError::InvalidFormat {
            location: location.to_string(),
            message: format!("must be a nonnegative number of seconds, got {seconds}"),
        });
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn normalize_encab(raw: RawEncabConfig) -> Result<EncabConfig, ConfigError> {
    let debug = raw.debug.unwrap_or(false);

    let loglevel = if debug {
        LogLevel::Debug
    } else {
        raw.loglevel.as_deref().map(LogLevel::parse).transpose()?.unwrap_or(LogLevel::Info)
    };

    let logformat = raw.logformat.clone().unwrap_or_else(|| {
        if debug { DEBUG_FORMAT.to_string() } else { DEFAULT_FORMAT.to_string() }
    });

    let environment = raw.environment.clone().unwrap_or_default();
    validate_environment(&environment)?;

    let user = raw.user.as_ref().map(resolve_user).transpose()?;
    let group = raw.group.as_ref().map(resolve_group).transpose()?;
    let umask = raw.umask.as_ref().map(parse_umask).transpose()?.unwrap_or(-1);
    let join_time = nonnegative_duration("encab.join_time", raw.join_time.unwrap_or(1.0))?;

    Ok(EncabConfig {
        environment,
        user,
        group,
        umask,
        loglevel,
        join_time,
        halt_on_exit: raw.halt_on_exit.unwrap_or(false),
        logformat,
        dry_run: raw.dry_run.unwrap_or(false),
    })
}

fn normalize_extension(raw: RawExtensionConfig) -> ExtensionConfig {
    ExtensionConfig {
        enabled: raw.enabled.unwrap_or(true),
        settings: raw.settings.unwrap_or_else(|| serde_json::json!({})),
    }
}

fn normalize_program(
    name: &str,
    raw: RawProgramConfig,
    current_uid: u32,
) -> Result<ProgramConfig, ConfigError> {
    let command = match (raw.command, raw.sh) {
        (Some(_), Some(_)) => return Err(ConfigError::CommandShMutuallyExclusive { program: name.to_string() }),
        (Some(argv), None) => ProgramCommand::Exec(argv),
        (None, Some(script)) => ProgramCommand::Shell(script),
        (None, None) => return Err(ConfigError::CommandShMissing { program: name.to_string() }),
    };

    let environment = raw.environment.unwrap_or_default();
    validate_environment(&environment)?;

    let user = raw.user.as_ref().map(resolve_user).transpose()?;
    if let Some(requested) = user {
        if requested != current_uid && current_uid != 0 {
            return Err(ConfigError::InsufficientPrivilegeForUser {
                program: name.to_string(),
                requested: requested.to_string(),
                current: current_uid,
            });
        }
    }

    let group = raw.group.as_ref().map(resolve_group).transpose()?;
    let umask = raw.umask.as_ref().map(parse_umask).transpose()?;
    let loglevel = raw.loglevel.as_deref().map(LogLevel::parse).transpose()?;

    let startup_delay =
        nonnegative_duration(&format!("programs.{name}.startup_delay"), raw.startup_delay.unwrap_or(0.0))?;
    let join_time = raw
        .join_time
        .map(|secs| nonnegative_duration(&format!("programs.{name}.join_time"), secs))
        .transpose()?;

    let reap_zombies = raw.reap_zombies.unwrap_or(false);
    if reap_zombies && current_uid != 0 {
        return Err(ConfigError::InsufficientPrivilegeForReapZombies {
            program: name.to_string(),
            current: current_uid,
        });
    }

    Ok(ProgramConfig {
        command,
        environment,
        user,
        group,
        umask,
        directory: raw.directory,
        startup_delay,
        join_time,
        loglevel,
        reap_zombies,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum UserOrGroup {
    Id(u32),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum UmaskValue {
    Int(i32),
    Str(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawEncabConfig {
    #[serde(default)]
    debug: Option<bool>,
    #[serde(default)]
    loglevel: Option<String>,
    #[serde(default)]
    logformat: Option<String>,
    #[serde(default)]
    umask: Option<UmaskValue>,
    #[serde(default)]
    user: Option<UserOrGroup>,
    #[serde(default)]
    group: Option<UserOrGroup>,
    #[serde(default)]
    environment: Option<HashMap<String, String>>,
    #[serde(default)]
    join_time: Option<f64>,
    #[serde(default)]
    halt_on_exit: Option<bool>,
    #[serde(default)]
    dry_run: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawProgramConfig {
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default)]
    sh: Option<String>,
    #[serde(default)]
    environment: Option<HashMap<String, String>>,
    #[serde(default)]
    user: Option<UserOrGroup>,
    #[serde(default)]
    group: Option<UserOrGroup>,
    #[serde(default)]
    umask: Option<UmaskValue>,
    #[serde(default)]
    directory: Option<String>,
    #[serde(default)]
    startup_delay: Option<f64>,
    #[serde(default)]
    join_time: Option<f64>,
    #[serde(default)]
    loglevel: Option<String>,
    #[serde(default)]
    reap_zombies: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawExtensionConfig {
    #[serde(default)]
    enabled: Option<bool>,
    /// Accepted, never resolved — see [`ExtensionConfig`].
    #[serde(default)]
    #[allow(dead_code)]
    module: Option<String>,
    #[serde(default)]
    settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    encab: RawEncabConfig,
    #[serde(default)]
    extensions: IndexMap<String, RawExtensionConfig>,
    #[serde(default)]
    programs: IndexMap<String, RawProgramConfig>,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
