// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::CapturedError;
use crate::Error;

/// A memoized outcome at the codec boundary.
///
/// The variant is decided once, when the outcome is captured, and written as an
/// explicit tag. A stored `null` is therefore a real value and never confused with
/// [`Entry::Undefined`] or with a missing key.
///
/// ```
/// use recall::Entry;
///
/// let entry = Entry::from_value(&false)?;
/// assert_eq!(serde_json::to_string(&entry).unwrap(), r#"{"kind":"value","data":false}"#);
/// # Ok::<(), recall::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Entry {
    /// A successful result.
    Value(Value),
    /// A successful result that carries no data, such as `()`.
    Undefined,
    /// A memoized computation error.
    Error(CapturedError),
}

impl Entry {
    /// Captures a successful result.
    ///
    /// Zero-sized types become [`Entry::Undefined`].
    ///
    /// # Errors
    ///
    /// Returns a codec error if `value` cannot be represented as JSON.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self, Error> {
        if size_of::<T>() == 0 {
            return Ok(Self::Undefined);
        }
        serde_json::to_value(value).map(Self::Value).map_err(Error::codec)
    }

    /// Rebuilds a successful result.
    ///
    /// Returns `Ok(Err(captured))` for a stored error so the caller can revive it into
    /// its own error type.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored value does not fit `T`.
    pub fn into_outcome<T: DeserializeOwned>(self) -> Result<Result<T, CapturedError>, Error> {
        match self {
            Self::Value(value) => serde_json::from_value(value).map(Ok).map_err(Error::codec),
            Self::Undefined => serde_json::from_value(Value::Null).map(Ok).map_err(Error::codec),
            Self::Error(captured) => Ok(Err(captured)),
        }
    }
}
