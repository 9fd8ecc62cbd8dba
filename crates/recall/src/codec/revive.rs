// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;

/// Rewrites values while a stored entry is decoded.
///
/// [`JsonCodec`](super::JsonCodec) walks the decoded value tree depth first and calls
/// [`revive`](Reviver::revive) on every node, children before their parent.
pub trait Reviver: Send + Sync {
    /// Returns the replacement for `value`.
    fn revive(&self, value: Value) -> Value;
}

impl<F> Reviver for F
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn revive(&self, value: Value) -> Value {
        self(value)
    }
}

static ISO_8601: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?(Z|[+-][0-9]{2}:[0-9]{2})$").ok()
});

/// Recognizes ISO-8601 timestamps in dynamic payloads.
///
/// Matching strings are normalized to RFC 3339 in UTC, so a `DateTime<Utc>` field
/// later deserializes from them regardless of the offset the producer used. Typed
/// results do not need this, since `chrono` types round-trip on their own.
///
/// Any string shaped like a timestamp is rewritten, including ones that were never
/// meant as dates. Only enable this for payloads where that is acceptable.
///
/// # Examples
///
/// ```
/// use recall::{DateReviver, Reviver};
/// use serde_json::json;
///
/// let revived = DateReviver.revive(json!("2024-03-01T12:00:00+02:00"));
/// assert_eq!(revived, json!("2024-03-01T10:00:00Z"));
///
/// assert_eq!(DateReviver.revive(json!("not a date")), json!("not a date"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DateReviver;

impl DateReviver {
    /// Returns `true` if `text` looks like an ISO-8601 timestamp.
    #[must_use]
    pub fn matches(text: &str) -> bool {
        ISO_8601.as_ref().is_some_and(|pattern| pattern.is_match(text))
    }
}

impl Reviver for DateReviver {
    fn revive(&self, value: Value) -> Value {
        let Value::String(text) = value else {
            return value;
        };
        if !Self::matches(&text) {
            return Value::String(text);
        }

        match DateTime::parse_from_rfc3339(&text) {
            Ok(parsed) => Value::String(parsed.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Err(_) => Value::String(text),
        }
    }
}

pub(crate) fn revive_tree(reviver: &dyn Reviver, value: Value) -> Value {
    let value = match value {
        Value::Array(items) => Value::Array(items.into_iter().map(|item| revive_tree(reviver, item)).collect()),
        Value::Object(fields) => Value::Object(fields.into_iter().map(|(k, v)| (k, revive_tree(reviver, v))).collect()),
        other => other,
    };
    reviver.revive(value)
}
