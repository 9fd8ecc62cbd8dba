// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! [`MockStore`] wraps a [`MemoryStore`], records every operation, and supports failure
//! and latency injection for exercising fail-open paths.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tick::Clock;

use crate::{Error, MemoryStore, RemoteStore, SetMode, SetOutcome, StoreCapability};

/// Recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A read of the given key.
    Get(String),
    /// A write.
    Set {
        /// The key written.
        key: String,
        /// The payload written.
        value: Vec<u8>,
        /// The requested time-to-live.
        ttl: Duration,
        /// The write mode.
        mode: SetMode,
    },
    /// A delete of the given key.
    Delete(String),
}

impl StoreOp {
    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Get(key) | Self::Delete(key) | Self::Set { key, .. } => key,
        }
    }
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;
type DelayPredicate = Box<dyn Fn(&StoreOp) -> Option<Duration> + Send + Sync>;

/// A configurable mock store for testing.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall_store::testing::{MockStore, StoreOp};
/// use recall_store::{RemoteStore, SetMode};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let store = MockStore::new(Clock::new_frozen());
/// store.fail_when(|op| matches!(op, StoreOp::Get(key) if key == "broken"));
///
/// assert!(store.get("broken").await.is_err());
/// assert!(store.get("fine").await.is_ok());
/// assert_eq!(store.operations().len(), 2);
/// # });
/// ```
#[derive(Clone)]
pub struct MockStore {
    clock: Clock,
    inner: MemoryStore,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
    delay_when: Arc<Mutex<Option<DelayPredicate>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("inner", &self.inner)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .field("delay_when", &self.delay_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl MockStore {
    /// Creates an empty mock store whose expiry and injected latency follow `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: MemoryStore::new(clock.clone()),
            clock,
            operations: Arc::default(),
            fail_when: Arc::default(),
            delay_when: Arc::default(),
        }
    }

    /// Restricts the underlying store to the given capability.
    #[must_use]
    pub fn with_capability(mut self, capability: StoreCapability) -> Self {
        self.inner = self.inner.with_capability(capability);
        self
    }

    /// Sets a predicate that decides which operations fail.
    ///
    /// Failed operations are still recorded and leave the stored data untouched.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Sets a function that decides how long each operation stalls before running.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use recall_store::testing::{MockStore, StoreOp};
    /// use tick::Clock;
    ///
    /// let store = MockStore::new(Clock::new_frozen());
    /// store.delay_when(|op| matches!(op, StoreOp::Get(_)).then_some(Duration::from_secs(1)));
    /// ```
    pub fn delay_when<F>(&self, delay: F)
    where
        F: Fn(&StoreOp) -> Option<Duration> + Send + Sync + 'static,
    {
        *self.delay_when.lock() = Some(Box::new(delay));
    }

    /// Clears any injected latency.
    pub fn clear_delays(&self) {
        *self.delay_when.lock() = None;
    }

    /// Returns a copy of all recorded operations, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Returns recorded operations that target `key`.
    #[must_use]
    pub fn operations_for(&self, key: &str) -> Vec<StoreOp> {
        self.operations.lock().iter().filter(|op| op.key() == key).cloned().collect()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the backing memory store, bypassing recording and injection.
    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    async fn prepare(&self, op: StoreOp) -> Result<(), Error> {
        let delay = self.delay_when.lock().as_ref().and_then(|delay| delay(&op));
        if let Some(delay) = delay {
            self.clock.delay(delay).await;
        }

        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let message = match &op {
            StoreOp::Get(_) => "mock: get failed",
            StoreOp::Set { .. } => "mock: set failed",
            StoreOp::Delete(_) => "mock: delete failed",
        };
        self.operations.lock().push(op);

        if fail { Err(Error::from_message(message)) } else { Ok(()) }
    }
}

impl RemoteStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.prepare(StoreOp::Get(key.to_owned())).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, mode: SetMode) -> Result<SetOutcome, Error> {
        self.prepare(StoreOp::Set {
            key: key.to_owned(),
            value: value.clone(),
            ttl,
            mode,
        })
        .await?;
        self.inner.set(key, value, ttl, mode).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.prepare(StoreOp::Delete(key.to_owned())).await?;
        self.inner.delete(key).await
    }

    fn capability(&self) -> StoreCapability {
        self.inner.capability()
    }
}
