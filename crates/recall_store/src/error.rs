// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error type for store operations.

/// An error from a remote store operation.
///
/// Opaque wrapper around whatever the underlying client reported. The memoization
/// engine never surfaces these to callers; it reports them and falls back to direct
/// computation.
///
/// # Example
///
/// ```
/// use recall_store::Error;
///
/// let error = Error::from_message("connection reset");
/// assert!(error.to_string().contains("connection reset"));
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Creates a new error from anything convertible into a boxed error.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// A specialized [`Result`] type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_cause() {
        let error = Error::from_message("socket closed");
        let display = format!("{error}");
        assert!(display.contains("socket closed"), "unexpected display output: {display}");
    }

    #[test]
    fn wraps_std_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let error = Error::from_message(io);
        assert!(format!("{error:?}").contains("read timed out"));
    }
}
