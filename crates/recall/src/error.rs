// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// Broad category of a memoization [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Invalid builder or wrap settings, such as an empty computation name.
    #[default]
    Configuration,
    /// A value could not be encoded into, or decoded from, the cache.
    Codec,
    /// The remote store failed or did not answer in time.
    Store,
}

impl ErrorKind {
    /// Returns a stable, lowercase label for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Codec => "codec",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by the memoization layer itself.
///
/// Only [`ErrorKind::Configuration`] errors ever reach callers, from
/// [`MemoizerBuilder::build`](crate::MemoizerBuilder::build) and
/// [`Memoizer::wrap`](crate::Memoizer::wrap). Codec and store errors are handed to the
/// configured [`ErrorSink`](crate::ErrorSink) while the call falls back to running the
/// computation.
///
/// # Examples
///
/// ```
/// use recall::{Error, ErrorKind};
///
/// let error = Error::configuration("computation name must not be empty");
/// assert_eq!(error.kind(), ErrorKind::Configuration);
/// ```
#[ohno::error]
#[display("memoization {kind} error")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates a configuration error with the given description.
    pub fn configuration(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Configuration, cause)
    }

    /// Creates a codec error wrapping `cause`.
    pub fn codec(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Codec, cause)
    }

    /// Creates a store error wrapping `cause`.
    pub fn store(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Store, cause)
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<recall_store::Error> for Error {
    fn from(error: recall_store::Error) -> Self {
        Self::store(error)
    }
}

/// A specialized [`Result`] type for memoization setup.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_preserved() {
        assert_eq!(Error::codec("bad json").kind(), ErrorKind::Codec);
        assert_eq!(Error::store("timeout").kind(), ErrorKind::Store);
        assert_eq!(Error::configuration("empty").kind(), ErrorKind::Configuration);
    }

    #[test]
    fn display_names_kind_and_cause() {
        let error = Error::codec("unexpected end of input");
        let display = error.to_string();
        assert!(display.contains("memoization codec error"), "{display}");
        assert!(display.contains("unexpected end of input"), "{display}");
    }

    #[test]
    fn store_errors_convert() {
        let error: Error = recall_store::Error::from_message("connection refused").into();
        assert_eq!(error.kind(), ErrorKind::Store);
        assert!(error.to_string().contains("connection refused"));
    }
}
