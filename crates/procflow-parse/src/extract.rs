//! Field extractor: splits a classified line into labeled fields.
//!
//! The grammar is deliberately small: `|` separates segments and the first
//! `:` of a segment separates its label from its value. Names are the second
//! `:`-token of their segment; free-text values (event names, conditions)
//! keep everything after the first colon.

use serde::Serialize;

use crate::classify::LineKind;
use crate::error::{ExtractionError, Result};

/// The labeled fields of one declaration line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fields {
    /// `Start:` or `End:` line.
    Event { name: String },
    /// `Task:` line.
    Task {
        name: String,
        performer: Option<String>,
    },
    /// `Condition:` line.
    Gateway { condition: String },
    /// `From:` line; endpoints are still symbolic names.
    Flow {
        from: String,
        to: String,
        condition: Option<String>,
    },
}

/// Extract the fields of `line`, which has already been classified as `kind`.
pub fn extract(kind: LineKind, line: &str) -> Result<Fields> {
    let line = line.trim();
    match kind {
        LineKind::StartEvent | LineKind::EndEvent => {
            let name = after_prefix(kind, line).ok_or(ExtractionError::MissingName)?;
            Ok(Fields::Event { name })
        }
        LineKind::Task => extract_task(line),
        LineKind::GatewayCondition => {
            let condition =
                after_prefix(kind, line).ok_or(ExtractionError::MissingCondition)?;
            Ok(Fields::Gateway { condition })
        }
        LineKind::SequenceFlow => extract_flow(line),
        LineKind::Ignored => Err(ExtractionError::NotADeclaration),
    }
}

fn extract_task(line: &str) -> Result<Fields> {
    let mut segments = line.split('|');
    let head = segments.next().unwrap_or_default();

    let name = second_token(head).ok_or(ExtractionError::MalformedTask)?;
    let performer = segments.next().and_then(second_token);

    Ok(Fields::Task { name, performer })
}

fn extract_flow(line: &str) -> Result<Fields> {
    let segments: Vec<&str> = line.split('|').collect();
    if segments.len() < 2 {
        return Err(ExtractionError::MalformedFlow);
    }

    let from = second_token(segments[0]).ok_or(ExtractionError::MalformedFlow)?;
    let to = second_token(segments[1]).ok_or(ExtractionError::MalformedFlow)?;
    let condition = segments.get(2).and_then(|segment| value_after_colon(segment));

    if segments.len() > 3 {
        tracing::debug!(
            segments = segments.len(),
            "ignoring trailing sequence flow segments"
        );
    }

    Ok(Fields::Flow {
        from,
        to,
        condition,
    })
}

/// Text after the kind's prefix, trimmed. `None` when the prefix is absent or
/// nothing follows it.
fn after_prefix(kind: LineKind, line: &str) -> Option<String> {
    let prefix = kind.prefix()?;
    non_empty(line.strip_prefix(prefix)?)
}

/// The second `:`-separated token of a segment, trimmed.
fn second_token(segment: &str) -> Option<String> {
    non_empty(segment.split(':').nth(1)?)
}

/// Everything after the first colon of a segment, trimmed.
fn value_after_colon(segment: &str) -> Option<String> {
    let (_, value) = segment.split_once(':')?;
    non_empty(value)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
