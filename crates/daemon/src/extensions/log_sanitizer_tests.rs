// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;
use encab_engine::LoggerBuilder;

#[test]
fn no_patterns_means_no_sanitizer_is_added() {
    let extension = LogSanitizerExtension::new();
    extension.configure(true, &json!({})).unwrap();

    let mut builder = LoggerBuilder::default();
    extension.update_logger("main", &mut builder);
    assert_eq!(builder.build().sanitize("secret=abc"), "secret=abc");
}

#[test]
fn configured_patterns_are_redacted_in_every_occurrence() {
    let extension = LogSanitizerExtension::new();
    extension.configure(true, &json!({"patterns": ["abc", "topsecret"]})).unwrap();

    let mut builder = LoggerBuilder::default();
    extension.update_logger("main", &mut builder);
    let sanitizer = builder.build();
    assert_eq!(sanitizer.sanitize("token=abc and topsecret=abc"), "token=*** and ***=***");
}

#[test]
fn validate_rejects_non_string_entries() {
    let extension = LogSanitizerExtension::new();
    assert!(extension.validate(true, &json!({"patterns": [1, 2]})).is_err());
}

#[test]
fn validate_rejects_non_array_patterns() {
    let extension = LogSanitizerExtension::new();
    assert!(extension.validate(true, &json!({"patterns": "abc"})).is_err());
}
