// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for remote store clients.

use std::{sync::Arc, time::Duration};

use crate::Error;

/// How a write treats an existing value under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetMode {
    /// Overwrite any existing value.
    Always,
    /// Only write when the key is absent (or expired). Must be atomic on the server.
    IfAbsent,
}

/// Result of a successful write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOutcome {
    /// The value was written.
    Stored,
    /// The write was conditional and the key already held a live value.
    AlreadyExists,
}

impl SetOutcome {
    /// Returns `true` if the value was written.
    #[must_use]
    pub fn is_stored(self) -> bool {
        matches!(self, Self::Stored)
    }
}

/// What kind of payloads a store client can carry.
///
/// Some clients only move text. The engine checks this before applying byte-level
/// transforms such as compression, whose output is not valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreCapability {
    /// Arbitrary bytes round-trip unchanged.
    #[default]
    Binary,
    /// Only valid UTF-8 payloads are accepted.
    StringOnly,
}

/// A remote key-value store with per-key expiry.
///
/// Expiry has millisecond granularity; see [`ttl_millis`] for how durations are rounded.
/// `SetMode::IfAbsent` writes must be atomic, since the distributed lock is built on them.
pub trait RemoteStore: Send + Sync {
    /// Reads the payload stored under `key`, or `None` if the key is absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send;

    /// Writes `value` under `key` with the given time-to-live.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, mode: SetMode) -> impl Future<Output = Result<SetOutcome, Error>> + Send;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Describes which payloads this store accepts.
    fn capability(&self) -> StoreCapability {
        StoreCapability::Binary
    }
}

impl<S> RemoteStore for Arc<S>
where
    S: RemoteStore,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, mode: SetMode) -> impl Future<Output = Result<SetOutcome, Error>> + Send {
        (**self).set(key, value, ttl, mode)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).delete(key)
    }

    fn capability(&self) -> StoreCapability {
        (**self).capability()
    }
}

/// Converts a time-to-live into whole milliseconds for the store.
///
/// Sub-millisecond remainders round up and the result is never below one, so a
/// non-zero duration never turns into "no expiry" or "expire immediately".
#[must_use]
pub fn ttl_millis(ttl: Duration) -> u64 {
    let nanos = ttl.as_nanos();
    let millis = nanos.div_ceil(1_000_000).max(1);
    u64::try_from(millis).unwrap_or(u64::MAX)
}
