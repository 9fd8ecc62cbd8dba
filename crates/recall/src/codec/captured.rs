// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A computation error in transportable form.
///
/// Holds the error message plus any attributes the error chose to expose. The engine
/// stores this when error memoization is enabled and rebuilds the caller's error type
/// from it on a hit.
///
/// # Examples
///
/// ```
/// use recall::CapturedError;
///
/// let error = CapturedError::new("user not found").with_field("status", 404);
/// assert_eq!(error.message(), "user not found");
/// assert_eq!(error.field("status"), Some(&serde_json::json!(404)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

impl CapturedError {
    /// Creates a captured error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns all captured attributes.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns one captured attribute.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Keeps only the attributes named in `allowed`.
    #[must_use]
    pub fn retain_fields<S: AsRef<str>>(mut self, allowed: &[S]) -> Self {
        self.fields.retain(|name, _| allowed.iter().any(|a| a.as_ref() == name));
        self
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CapturedError {}

/// An error type that can be stored and replayed by the memoizer.
///
/// The message comes from [`Display`](fmt::Display). Override
/// [`attributes`](CapturableError::attributes) to carry structured details, and
/// [`from_captured`](CapturableError::from_captured) to rebuild your error from them.
///
/// # Examples
///
/// ```
/// use recall::{CapturableError, CapturedError};
/// use serde_json::{Map, Value};
///
/// #[derive(Debug, Clone)]
/// struct HttpError {
///     status: u16,
///     reason: String,
/// }
///
/// impl std::fmt::Display for HttpError {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "{} {}", self.status, self.reason)
///     }
/// }
///
/// impl CapturableError for HttpError {
///     fn attributes(&self) -> Map<String, Value> {
///         let mut fields = Map::new();
///         fields.insert("status".into(), self.status.into());
///         fields.insert("reason".into(), self.reason.clone().into());
///         fields
///     }
///
///     fn from_captured(captured: CapturedError) -> Self {
///         Self {
///             status: captured.field("status").and_then(Value::as_u64).and_then(|s| u16::try_from(s).ok()).unwrap_or(500),
///             reason: captured.field("reason").and_then(Value::as_str).unwrap_or_default().to_owned(),
///         }
///     }
/// }
///
/// let original = HttpError { status: 404, reason: "Not Found".into() };
/// let replayed = HttpError::from_captured(original.capture());
/// assert_eq!(replayed.status, 404);
/// ```
pub trait CapturableError: fmt::Display + Sized {
    /// Structured attributes stored next to the message.
    fn attributes(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Rebuilds the error from its stored form.
    fn from_captured(captured: CapturedError) -> Self;

    /// Converts the error into its stored form.
    fn capture(&self) -> CapturedError {
        CapturedError {
            message: self.to_string(),
            fields: self.attributes(),
        }
    }
}

impl CapturableError for CapturedError {
    fn attributes(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    fn from_captured(captured: CapturedError) -> Self {
        captured
    }

    fn capture(&self) -> CapturedError {
        self.clone()
    }
}

impl CapturableError for String {
    fn from_captured(captured: CapturedError) -> Self {
        captured.message
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transport_form_omits_empty_fields() {
        let plain = serde_json::to_value(CapturedError::new("boom")).unwrap();
        assert_eq!(plain, json!({ "message": "boom" }));

        let detailed = serde_json::to_value(CapturedError::new("boom").with_field("code", "E42")).unwrap();
        assert_eq!(detailed, json!({ "message": "boom", "fields": { "code": "E42" } }));
    }

    #[test]
    fn retain_fields_filters_by_name() {
        let error = CapturedError::new("boom")
            .with_field("code", 1)
            .with_field("stack", "at main")
            .with_field("secret", "hunter2")
            .retain_fields(&["code", "stack"]);

        assert_eq!(error.fields().len(), 2);
        assert!(error.field("secret").is_none());
    }

    #[test]
    fn strings_capture_message_only() {
        let captured = "disk full".to_owned().capture();
        assert_eq!(captured.message(), "disk full");
        assert!(captured.fields().is_empty());
        assert_eq!(String::from_captured(captured), "disk full");
    }

    #[test]
    fn captured_error_round_trips_itself() {
        let original = CapturedError::new("boom").with_field("attempt", 3);
        assert_eq!(CapturedError::from_captured(original.capture()), original);
    }
}
