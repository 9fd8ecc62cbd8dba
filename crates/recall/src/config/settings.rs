// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_LOCK_TIMEOUT, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_TTL};
use crate::{key::DEFAULT_NAMESPACE, lock::DEFAULT_RETRY_DELAY};

/// Memoizer settings in a form that loads from configuration files.
///
/// Durations are whole milliseconds. Missing fields take their defaults, so a partial
/// document is enough. Apply with [`MemoizerBuilder::settings`](crate::MemoizerBuilder::settings).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall::Settings;
///
/// let settings: Settings = serde_json::from_str(r#"{ "namespace": "rev-42", "lock_timeout_ms": 250 }"#)?;
///
/// assert_eq!(settings.namespace, "rev-42");
/// assert_eq!(settings.lock_timeout(), Duration::from_millis(250));
/// assert_eq!(settings.lookup_timeout(), Duration::from_millis(300));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct Settings {
    /// Prefix of every cache key. Change it to invalidate everything at once.
    pub namespace: String,
    /// Expiry of outcomes whose computation sets no TTL.
    pub default_ttl_ms: u64,
    /// Upper bound on a single store read.
    pub lookup_timeout_ms: u64,
    /// How long a caller waits for the distributed lock.
    pub lock_timeout_ms: u64,
    /// Pause between lock attempts.
    pub lock_retry_delay_ms: u64,
    /// Whether computation errors are memoized.
    pub memoize_errors: bool,
    /// Error attributes kept when an error is memoized; `None` keeps all of them.
    pub error_fields: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            default_ttl_ms: millis(DEFAULT_TTL),
            lookup_timeout_ms: millis(DEFAULT_LOOKUP_TIMEOUT),
            lock_timeout_ms: millis(DEFAULT_LOCK_TIMEOUT),
            lock_retry_delay_ms: millis(DEFAULT_RETRY_DELAY),
            memoize_errors: false,
            error_fields: None,
        }
    }
}

impl Settings {
    /// Returns the default TTL as a [`Duration`].
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Returns the lookup timeout as a [`Duration`].
    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Returns the lock timeout as a [`Duration`].
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Returns the lock retry delay as a [`Duration`].
    #[must_use]
    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
