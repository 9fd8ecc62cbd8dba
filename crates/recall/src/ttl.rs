// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc, time::Duration};

type TtlFn<T> = Arc<dyn Fn(Option<&T>) -> Duration + Send + Sync>;

/// How long a memoized outcome stays in the store.
///
/// The resolver runs twice per miss: once with `None` before the lookup, only to bound
/// the lookup timeout, and once with the computed value to pick the write expiry. A
/// zero duration means the outcome is not written at all.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall::Ttl;
///
/// // Empty results expire quickly, everything else lives for an hour.
/// let ttl = Ttl::computed(|value: Option<&Vec<u32>>| match value {
///     Some(items) if items.is_empty() => Duration::from_secs(5),
///     _ => Duration::from_secs(3600),
/// });
///
/// assert_eq!(ttl.resolve(Some(&Vec::new())), Duration::from_secs(5));
/// assert_eq!(ttl.estimate(), Duration::from_secs(3600));
/// ```
pub enum Ttl<T> {
    /// The same duration for every outcome.
    Fixed(Duration),
    /// A duration derived from the outcome.
    Computed(TtlFn<T>),
}

impl<T> Ttl<T> {
    /// Creates a fixed time-to-live.
    #[must_use]
    pub fn fixed(duration: Duration) -> Self {
        Self::Fixed(duration)
    }

    /// Creates a time-to-live computed from the outcome.
    pub fn computed<F>(resolver: F) -> Self
    where
        F: Fn(Option<&T>) -> Duration + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(resolver))
    }

    /// Resolves the duration for `value`.
    ///
    /// `None` is passed for the pre-lookup estimate and for captured errors.
    #[must_use]
    pub fn resolve(&self, value: Option<&T>) -> Duration {
        match self {
            Self::Fixed(duration) => *duration,
            Self::Computed(resolver) => resolver(value),
        }
    }

    /// Resolves the duration before any value is known.
    #[must_use]
    pub fn estimate(&self) -> Duration {
        self.resolve(None)
    }
}

impl<T> Clone for Ttl<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(duration) => Self::Fixed(*duration),
            Self::Computed(resolver) => Self::Computed(Arc::clone(resolver)),
        }
    }
}

impl<T> fmt::Debug for Ttl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T> From<Duration> for Ttl<T> {
    fn from(duration: Duration) -> Self {
        Self::Fixed(duration)
    }
}
