// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Advisory lock over a remote store.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use recall_store::{RemoteStore, SetMode, SetOutcome};
use tick::{Clock, FutureExt};
use uuid::Uuid;

use crate::key::lock_key;

/// Default pause between acquisition attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Longest wait [`DistributedLock::acquire`] accepts; larger timeouts are capped to it.
pub const MAX_LOCK_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Short-lived exclusive markers in a [`RemoteStore`].
///
/// The lock is advisory. [`acquire`](Self::acquire) never fails and never waits longer
/// than its timeout: when the deadline passes it returns a [`Lease`] that does not own
/// the marker and the caller proceeds without exclusivity.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use recall::DistributedLock;
/// use recall_store::MemoryStore;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let store = Arc::new(MemoryStore::new(Clock::new_frozen()));
/// let lock = DistributedLock::new(Arc::clone(&store), Clock::new_frozen());
///
/// let lease = lock.acquire("recall:report:42", Duration::from_secs(1)).await;
/// assert!(lease.is_owned());
/// assert!(store.contains_key("lock.recall:report:42"));
///
/// lease.release().await?;
/// assert!(!store.contains_key("lock.recall:report:42"));
/// # Ok::<(), recall_store::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct DistributedLock<S> {
    store: Arc<S>,
    clock: Clock,
    retry_delay: Duration,
}

impl<S> Clone for DistributedLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            retry_delay: self.retry_delay,
        }
    }
}

impl<S> DistributedLock<S>
where
    S: RemoteStore + 'static,
{
    /// Creates a lock over `store` that waits [`DEFAULT_RETRY_DELAY`] between attempts.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Sets the pause between acquisition attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Tries to take the lock guarding `key` until `timeout` elapses.
    ///
    /// The marker is written under `lock.<key>` with an expiry equal to the time left
    /// until the deadline, so it disappears on its own even if never released. Store
    /// errors count as failed attempts. Timeouts above [`MAX_LOCK_TIMEOUT`] are capped.
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Lease<S> {
        let lock_key = lock_key(key);
        let token = Uuid::new_v4().to_string();
        let started = self.clock.instant();
        let deadline = started.checked_add(timeout.min(MAX_LOCK_TIMEOUT)).unwrap_or(started);
        let mut attempts: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(self.clock.instant());
            if remaining.is_zero() {
                tracing::debug!(lock.key = %lock_key, lock.attempts = attempts, "lock.timed_out");
                return Lease::unowned(self, lock_key, token, deadline);
            }

            attempts = attempts.saturating_add(1);
            let attempt = self
                .store
                .set(&lock_key, token.clone().into_bytes(), remaining, SetMode::IfAbsent)
                .timeout(&self.clock, remaining)
                .await;

            match attempt {
                Ok(Ok(SetOutcome::Stored)) => return Lease::owned(self, lock_key, token, deadline),
                Ok(Ok(SetOutcome::AlreadyExists)) => {}
                Ok(Err(error)) => tracing::debug!(lock.key = %lock_key, error = %error, "lock.attempt_failed"),
                Err(_) => continue,
            }

            let remaining = deadline.saturating_duration_since(self.clock.instant());
            self.clock.delay(self.retry_delay.min(remaining)).await;
        }
    }
}

/// The result of [`DistributedLock::acquire`].
///
/// Call [`release`](Self::release) when done. A lease dropped without release deletes its
/// marker in the background on the current Tokio runtime, if there is one; otherwise the
/// marker simply expires at the deadline.
#[derive(Debug)]
#[must_use = "an owned lease keeps other callers waiting until it is released or expires"]
pub struct Lease<S>
where
    S: RemoteStore + 'static,
{
    store: Arc<S>,
    clock: Clock,
    key: String,
    token: String,
    owned: bool,
    released: bool,
    acquired_at: Instant,
    deadline: Instant,
}

impl<S> Lease<S>
where
    S: RemoteStore + 'static,
{
    fn owned(lock: &DistributedLock<S>, key: String, token: String, deadline: Instant) -> Self {
        Self::new(lock, key, token, deadline, true)
    }

    fn unowned(lock: &DistributedLock<S>, key: String, token: String, deadline: Instant) -> Self {
        Self::new(lock, key, token, deadline, false)
    }

    fn new(lock: &DistributedLock<S>, key: String, token: String, deadline: Instant, owned: bool) -> Self {
        Self {
            store: Arc::clone(&lock.store),
            clock: lock.clock.clone(),
            key,
            token,
            owned,
            released: false,
            acquired_at: lock.clock.instant(),
            deadline,
        }
    }

    /// Returns `true` if this caller holds the lock marker.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Returns the lock record key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns how long the lease has been held.
    #[must_use]
    pub fn held(&self) -> Duration {
        self.clock.instant().saturating_duration_since(self.acquired_at)
    }

    /// Returns `true` once the lease deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.clock.instant() >= self.deadline
    }

    /// Deletes the lock marker if this lease owns it and the deadline has not passed.
    ///
    /// Returns whether a marker was deleted. After the deadline the marker is void and
    /// may belong to another caller, so it is left alone. The marker is also left alone
    /// when it no longer carries this lease's token.
    ///
    /// # Errors
    ///
    /// Returns the store error if reading or deleting the marker fails.
    pub async fn release(mut self) -> Result<bool, recall_store::Error> {
        self.released = true;
        if !self.owned || self.is_expired() {
            return Ok(false);
        }
        delete_if_marked(&*self.store, &self.key, &self.token).await
    }
}

impl<S> Drop for Lease<S>
where
    S: RemoteStore + 'static,
{
    fn drop(&mut self) {
        if self.released || !self.owned || self.is_expired() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        drop(runtime.spawn(async move {
            if let Err(error) = delete_if_marked(&*store, &key, &token).await {
                tracing::debug!(lock.key = %key, error = %error, "lock.release_failed");
            }
        }));
    }
}

// Check then delete; the store offers no atomic compare-and-delete.
async fn delete_if_marked<S: RemoteStore>(store: &S, key: &str, token: &str) -> Result<bool, recall_store::Error> {
    if store.get(key).await?.as_deref() != Some(token.as_bytes()) {
        return Ok(false);
    }
    store.delete(key).await?;
    Ok(true)
}
