// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Renders a `tracing` event through a user-supplied `%(name)s`-style
//! template (§6 `logformat`), the same placeholder syntax the original
//! supervisor's Python `logging` module used.

use std::fmt;
use std::fmt::Write as _;

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Formats events according to a parsed `logformat` template. Built once
/// at startup from `encab.logformat` and installed as the `fmt` layer's
/// event formatter.
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Placeholder { name: String, width: Option<usize>, precision: Option<usize>, left_align: bool },
}

impl TemplateFormatter {
    /// Parses a template such as `"%(levelname)-5.5s %(program)s: %(message)s"`.
    /// A malformed `%(` that never closes, or a placeholder not terminated
    /// by `s`, is emitted back out as a literal rather than rejected — this
    /// is rendering, not validation, and `logformat` is not itself a
    /// `ConfigError`-checked field (§6).
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let bytes = template.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' && template[i..].starts_with("%(") {
                if let Some(parsed) = parse_placeholder(&template[i..]) {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parsed.0);
                    i += parsed.1;
                    continue;
                }
            }
            let ch = template[i..].chars().next().unwrap_or('%');
            literal.push(ch);
            i += ch.len_utf8();
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }
}

/// Parses one `%(name)[-][width][.precision]s` placeholder starting at the
/// beginning of `input`. Returns the segment and how many bytes it consumed.
fn parse_placeholder(input: &str) -> Option<(Segment, usize)> {
    let close = input.find(')')?;
    let name = &input[2..close];
    if name.is_empty() {
        return None;
    }

    let rest = &input[close + 1..];
    let mut chars = rest.char_indices().peekable();
    let left_align = matches!(chars.peek(), Some((_, '-')));
    if left_align {
        chars.next();
    }

    let width_start = chars.peek().map(|(idx, _)| *idx).unwrap_or(0);
    let mut width_end = width_start;
    while let Some((idx, c)) = chars.peek() {
        if c.is_ascii_digit() {
            width_end = idx + 1;
            chars.next();
        } else {
            break;
        }
    }
    let width = if width_end > width_start { rest[width_start..width_end].parse().ok() } else { None };

    let mut precision = None;
    if matches!(chars.peek(), Some((_, '.'))) {
        chars.next();
        let prec_start = chars.peek().map(|(idx, _)| *idx).unwrap_or(width_end + 1);
        let mut prec_end = prec_start;
        while let Some((idx, c)) = chars.peek() {
            if c.is_ascii_digit() {
                prec_end = idx + 1;
                chars.next();
            } else {
                break;
            }
        }
        precision = if prec_end > prec_start { rest[prec_start..prec_end].parse().ok() } else { None };
    }

    let (terminator_idx, _) = chars.next()?;
    if rest.as_bytes().get(terminator_idx) != Some(&b's') {
        return None;
    }

    let consumed = 2 + name.len() + 1 + terminator_idx + 1;
    Some((
        Segment::Placeholder { name: name.to_string(), width, precision, left_align },
        consumed,
    ))
}

fn apply_spec(mut value: String, width: Option<usize>, precision: Option<usize>, left_align: bool) -> String {
    if let Some(precision) = precision {
        if value.chars().count() > precision {
            value = value.chars().take(precision).collect();
        }
    }
    if let Some(width) = width {
        let len = value.chars().count();
        if len < width {
            let padding = " ".repeat(width - len);
            value = if left_align { format!("{value}{padding}") } else { format!("{padding}{value}") };
        }
    }
    value
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.push((field.name().to_string(), rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S, N> FormatEvent<S, N> for TemplateFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let thread_name = std::thread::current().name().unwrap_or("main").to_string();
        let asctime = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => writer.write_str(text)?,
                Segment::Placeholder { name, width, precision, left_align } => {
                    let rendered = match name.as_str() {
                        "levelname" => Some(metadata.level().to_string()),
                        "message" => Some(collector.message.clone().unwrap_or_default()),
                        "module" => Some(metadata.module_path().unwrap_or(metadata.target()).to_string()),
                        "threadName" => Some(thread_name.clone()),
                        "asctime" => Some(asctime.clone()),
                        "program" => collector
                            .fields
                            .iter()
                            .find(|(key, _)| key == "program")
                            .map(|(_, value)| value.clone()),
                        _ => None,
                    };
                    match rendered {
                        Some(value) => {
                            writer.write_str(&apply_spec(value, *width, *precision, *left_align))?
                        }
                        None => {
                            // Unknown placeholder: pass the original token through
                            // unrendered, matching the original's `%`-formatting
                            // behaviour for keys it does not recognise.
                            write!(writer, "%({name})")?;
                            if *left_align {
                                writer.write_str("-")?;
                            }
                            if let Some(width) = width {
                                write!(writer, "{width}")?;
                            }
                            if let Some(precision) = precision {
                                write!(writer, ".{precision}")?;
                            }
                            writer.write_str("s")?;
                        }
                    }
                }
            }
        }
        writeln!(writer)
    }
}

#[cfg(test)]
#[path = "formatter_tests.rs"]
mod tests;
