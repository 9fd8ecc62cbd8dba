// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-local store with clock-driven expiry.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;
use tick::Clock;

use crate::{Error, RemoteStore, SetMode, SetOutcome, StoreCapability, ttl_millis};

#[derive(Debug, Clone)]
struct Stored {
    payload: Vec<u8>,
    expires_at: SystemTime,
}

/// A process-local [`RemoteStore`].
///
/// Entries expire according to the supplied [`Clock`], so tests can drive expiry with
/// `tick::ClockControl` instead of sleeping. Clones share the same underlying map.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall_store::{MemoryStore, RemoteStore, SetMode};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let store = MemoryStore::new(Clock::new_frozen());
/// store.set("key", b"value".to_vec(), Duration::from_secs(60), SetMode::Always).await?;
/// assert_eq!(store.get("key").await?, Some(b"value".to_vec()));
/// # Ok::<(), recall_store::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    clock: Clock,
    capability: StoreCapability,
    entries: Arc<Mutex<HashMap<String, Stored>>>,
}

impl MemoryStore {
    /// Creates an empty store that accepts arbitrary bytes.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            capability: StoreCapability::Binary,
            entries: Arc::default(),
        }
    }

    /// Restricts the store to the given capability.
    ///
    /// With [`StoreCapability::StringOnly`], writes of non UTF-8 payloads fail the way a
    /// text-only client would.
    #[must_use]
    pub fn with_capability(mut self, capability: StoreCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Returns the number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.system_time();
        self.entries.lock().values().filter(|stored| stored.expires_at > now).count()
    }

    /// Returns `true` if there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` holds a live entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.system_time();
        self.entries.lock().get(key).is_some_and(|stored| stored.expires_at > now)
    }

    /// Returns how long the entry under `key` has left to live.
    #[must_use]
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.system_time();
        self.entries
            .lock()
            .get(key)
            .and_then(|stored| stored.expires_at.duration_since(now).ok())
            .filter(|remaining| !remaining.is_zero())
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.system_time();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(stored) if stored.expires_at > now => Some(stored.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn write(&self, key: &str, payload: Vec<u8>, ttl: Duration, mode: SetMode) -> Result<SetOutcome, Error> {
        if self.capability == StoreCapability::StringOnly && std::str::from_utf8(&payload).is_err() {
            return Err(Error::from_message(format!("store only accepts UTF-8 payloads, rejected write to '{key}'")));
        }

        let now = self.clock.system_time();
        let expires_at = now + Duration::from_millis(ttl_millis(ttl));
        let mut entries = self.entries.lock();

        if mode == SetMode::IfAbsent && entries.get(key).is_some_and(|stored| stored.expires_at > now) {
            return Ok(SetOutcome::AlreadyExists);
        }

        entries.insert(key.to_owned(), Stored { payload, expires_at });
        Ok(SetOutcome::Stored)
    }
}

impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, mode: SetMode) -> Result<SetOutcome, Error> {
        self.write(key, value, ttl, mode)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn capability(&self) -> StoreCapability {
        self.capability
    }
}
