// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reporting of infrastructure errors that memoization swallows.

use std::fmt;

/// Where in a memoized call an infrastructure error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Phase {
    /// The arguments could not be turned into a cache key.
    Key,
    /// Reading or decoding the stored outcome failed.
    Lookup,
    /// Encoding or storing a computed value failed.
    Write,
    /// Encoding or storing a computed error failed.
    ErrorWrite,
    /// Releasing the distributed lock failed.
    Release,
}

impl Phase {
    /// Returns a short lowercase name of the phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Lookup => "lookup",
            Self::Write => "write",
            Self::ErrorWrite => "error_write",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context passed along with every reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext<'a> {
    /// The computation name given at wrap time.
    pub name: &'a str,
    /// The cache key, absent when the key itself could not be built.
    pub key: Option<&'a str>,
    /// Where the error happened.
    pub phase: Phase,
}

/// Receives store, codec, and lock errors.
///
/// These errors never reach the caller of a memoized function: the call falls back to
/// running the computation. The sink is the only place they surface, so
/// [`MemoizerBuilder::build`](crate::MemoizerBuilder::build) refuses to build without one.
///
/// Closures taking `(&Error, &ErrorContext)` implement this trait.
pub trait ErrorSink: Send + Sync {
    /// Handles one error. Must not block.
    fn report(&self, error: &crate::Error, context: &ErrorContext<'_>);
}

impl<F> ErrorSink for F
where
    F: Fn(&crate::Error, &ErrorContext<'_>) + Send + Sync,
{
    fn report(&self, error: &crate::Error, context: &ErrorContext<'_>) {
        self(error, context);
    }
}

/// An [`ErrorSink`] that logs every error with `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &crate::Error, context: &ErrorContext<'_>) {
        tracing::error!(
            memo.name = context.name,
            memo.key = context.key,
            memo.phase = context.phase.as_str(),
            error = %error,
            "memoization error"
        );
    }
}
