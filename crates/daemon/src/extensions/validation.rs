// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-variable environment defaulting and validation (§4.5, §9): hooks
//! `extend_environment` to inject `default`s into and validate the format,
//! length, range, and pattern of each program's effective environment,
//! scoped to `program`/`programs` when given. `Config::load` cannot do
//! this itself — it runs before the per-program environment overlays are
//! assembled — so it is carried here instead.

use std::collections::HashMap;
use std::sync::RwLock;

use encab_engine::{Extension, ExtensionError};
use regex::Regex;
use serde_json::Value;

const NAME: &str = "validation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueFormat {
    String,
    Int,
    Float,
}

struct VariableRule {
    name: String,
    required: bool,
    default: Option<String>,
    format: ValueFormat,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    regex: Option<Regex>,
    programs: Vec<String>,
}

impl VariableRule {
    fn applies_to(&self, program_name: &str) -> bool {
        self.programs.is_empty() || self.programs.iter().any(|p| p == program_name)
    }

    /// Checks format, length, range, and pattern against an already-present
    /// value. Returns the failure message rather than an `ExtensionError`
    /// directly, since a failure here is logged (best-effort hook), never
    /// propagated.
    fn check(&self, value: &str) -> Result<(), String> {
        match self.format {
            ValueFormat::String => {}
            ValueFormat::Int => {
                value.parse::<i64>().map_err(|_| format!("`{value}` is not a valid int"))?;
            }
            ValueFormat::Float => {
                value.parse::<f64>().map_err(|_| format!("`{value}` is not a valid float"))?;
            }
        }

        let length = value.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return Err(format!("length {length} is shorter than min_length {min}"));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(format!("length {length} is longer than max_length {max}"));
            }
        }

        if self.min_value.is_some() || self.max_value.is_some() {
            let numeric: f64 =
                value.parse().map_err(|_| format!("`{value}` is not numeric, required for min_value/max_value"))?;
            if let Some(min) = self.min_value {
                if numeric < min {
                    return Err(format!("{numeric} is less than min_value {min}"));
                }
            }
            if let Some(max) = self.max_value {
                if numeric > max {
                    return Err(format!("{numeric} is greater than max_value {max}"));
                }
            }
        }

        if let Some(regex) = &self.regex {
            if !regex.is_match(value) {
                return Err(format!("`{value}` does not match the configured pattern"));
            }
        }

        Ok(())
    }
}

fn value_as_string(name: &str, value: &Value) -> Result<String, ExtensionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ExtensionError::new(NAME, format!("`default` for variable `{name}` must be a scalar"))),
    }
}

fn parse_variable(name: &str, value: &Value) -> Result<VariableRule, ExtensionError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ExtensionError::new(NAME, format!("variable `{name}` settings must be a mapping")))?;

    let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);
    let default = obj.get("default").map(|v| value_as_string(name, v)).transpose()?;

    let format = match obj.get("format").and_then(Value::as_str) {
        None | Some("string") => ValueFormat::String,
        Some("int") => ValueFormat::Int,
        Some("float") => ValueFormat::Float,
        Some(other) => {
            return Err(ExtensionError::new(NAME, format!("unknown format `{other}` for variable `{name}`")))
        }
    };

    let min_length = obj.get("min_length").and_then(Value::as_u64).map(|n| n as usize);
    let max_length = obj.get("max_length").and_then(Value::as_u64).map(|n| n as usize);
    let min_value = obj.get("min_value").and_then(Value::as_f64);
    let max_value = obj.get("max_value").and_then(Value::as_f64);

    let regex = match obj.get("regex").and_then(Value::as_str) {
        None => None,
        Some(pattern) => Some(
            Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| ExtensionError::new(NAME, format!("invalid regex for variable `{name}`: {e}")))?,
        ),
    };

    let mut programs = Vec::new();
    if let Some(p) = obj.get("program").and_then(Value::as_str) {
        programs.push(p.to_string());
    }
    if let Some(Value::Array(items)) = obj.get("programs") {
        for item in items {
            if let Some(p) = item.as_str() {
                programs.push(p.to_string());
            }
        }
    }

    Ok(VariableRule {
        name: name.to_string(),
        required,
        default,
        format,
        min_length,
        max_length,
        min_value,
        max_value,
        regex,
        programs,
    })
}

/// `variables:` is a mapping, so declaration order (preserved by
/// `serde_json`'s `preserve_order` feature) is the order rules are
/// checked in — matters only for which failure is logged first.
fn parse_variables(settings: &Value) -> Result<Vec<VariableRule>, ExtensionError> {
    match settings.get("variables") {
        None => Ok(Vec::new()),
        Some(Value::Object(map)) => map.iter().map(|(name, value)| parse_variable(name, value)).collect(),
        Some(_) => Err(ExtensionError::new(NAME, "`variables` must be a mapping")),
    }
}

pub struct ValidationExtension {
    rules: RwLock<Vec<VariableRule>>,
}

impl ValidationExtension {
    pub fn new() -> Self {
        Self { rules: RwLock::new(Vec::new()) }
    }
}

impl Default for ValidationExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for ValidationExtension {
    fn name(&self) -> &str {
        NAME
    }

    fn validate(&self, _enabled: bool, settings: &Value) -> Result<(), ExtensionError> {
        parse_variables(settings)?;
        Ok(())
    }

    fn configure(&self, _enabled: bool, settings: &Value) -> Result<(), ExtensionError> {
        let rules = parse_variables(settings)?;
        #[allow(clippy::unwrap_used)]
        {
            *self.rules.write().unwrap() = rules;
        }
        Ok(())
    }

    fn extend_environment(&self, program_name: &str, env: &mut HashMap<String, String>) {
        #[allow(clippy::unwrap_used)]
        let rules = self.rules.read().unwrap();
        for rule in rules.iter().filter(|rule| rule.applies_to(program_name)) {
            if !env.contains_key(&rule.name) {
                match &rule.default {
                    Some(default) => {
                        env.insert(rule.name.clone(), default.clone());
                    }
                    None if rule.required => {
                        tracing::error!(
                            program = program_name,
                            variable = %rule.name,
                            "required environment variable is missing"
                        );
                        continue;
                    }
                    None => continue,
                }
            }

            if let Some(value) = env.get(&rule.name) {
                if let Err(reason) = rule.check(value) {
                    tracing::error!(
                        program = program_name,
                        variable = %rule.name,
                        %reason,
                        "environment variable failed validation"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
