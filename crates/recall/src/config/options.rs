// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc, time::Duration};

use crate::Ttl;

type ErrorPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Per-computation options for [`Memoizer::wrap`](crate::Memoizer::wrap).
///
/// Only the name is required. It must identify the computation across every process
/// sharing the store: two computations with the same name share cache entries.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall::{Ttl, WrapOptions};
///
/// let options = WrapOptions::<Vec<u32>, String>::new("recent-orders")
///     .ttl(Ttl::computed(|orders: Option<&Vec<u32>>| match orders {
///         Some(orders) if orders.is_empty() => Duration::ZERO,
///         _ => Duration::from_secs(60),
///     }))
///     .lock_timeout(Duration::from_millis(200))
///     .memoize_errors_when(|error: &String| error.starts_with("404"));
///
/// assert_eq!(options.name(), "recent-orders");
/// ```
pub struct WrapOptions<T, E> {
    pub(crate) name: String,
    pub(crate) ttl: Option<Ttl<T>>,
    pub(crate) lock_timeout: Option<Duration>,
    pub(crate) memoize_errors_when: Option<ErrorPredicate<E>>,
}

impl<T, E> WrapOptions<T, E> {
    /// Creates options for the computation called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl: None,
            lock_timeout: None,
            memoize_errors_when: None,
        }
    }

    /// Sets the expiry of stored outcomes. A zero duration disables the write.
    #[must_use]
    pub fn ttl(mut self, ttl: impl Into<Ttl<T>>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Overrides the memoizer's lock timeout for this computation.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Decides per error whether it is memoized, replacing the memoizer-wide setting.
    #[must_use]
    pub fn memoize_errors_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.memoize_errors_when = Some(Arc::new(predicate));
        self
    }

    /// Returns the computation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T, E> Clone for WrapOptions<T, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            ttl: self.ttl.clone(),
            lock_timeout: self.lock_timeout,
            memoize_errors_when: self.memoize_errors_when.clone(),
        }
    }
}

impl<T, E> fmt::Debug for WrapOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapOptions")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("lock_timeout", &self.lock_timeout)
            .field("memoize_errors_when", &self.memoize_errors_when.is_some())
            .finish()
    }
}
