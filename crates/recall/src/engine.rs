// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-call lookup, lock, execute, and settle state machine.

use std::{fmt, marker::PhantomData, sync::Arc, time::Duration};

use recall_store::{RemoteStore, SetMode, StoreCapability};
use serde::{Serialize, de::DeserializeOwned};
use tick::{Clock, FutureExt};
use uniflight::UniFlight;

use crate::{
    CacheKey, CapturableError, CapturedError, Codec, Compression, DistributedLock, Entry, Error, ErrorContext, ErrorSink,
    EventSink, Lease, MemoActivity, MemoEvent, MemoTelemetry, MemoizerBuilder, Phase, Ttl, WrapOptions,
    background::{PendingWrites, spawn_or_run},
    config::CapturedPredicate,
};

/// State shared by a [`Memoizer`] and everything it wraps.
pub(crate) struct Core<S> {
    pub(crate) store: Arc<S>,
    pub(crate) clock: Clock,
    pub(crate) lock: DistributedLock<S>,
    pub(crate) namespace: String,
    pub(crate) default_ttl: Duration,
    pub(crate) lookup_timeout: Duration,
    pub(crate) lock_timeout: Duration,
    pub(crate) memoize_errors: CapturedPredicate,
    pub(crate) error_fields: Option<Vec<String>>,
    pub(crate) error_sink: Arc<dyn ErrorSink>,
    pub(crate) event_sink: Option<Arc<dyn EventSink>>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) compression: Option<Compression>,
    pub(crate) telemetry: MemoTelemetry,
    pub(crate) pending: PendingWrites,
}

impl<S> Core<S>
where
    S: RemoteStore + 'static,
{
    fn emit(&self, name: &str, key: &str, activity: MemoActivity, duration: Option<Duration>) {
        let event = MemoEvent {
            name,
            key,
            activity,
            duration,
        };
        self.telemetry.record(&event);
        if let Some(sink) = &self.event_sink {
            sink.record(&event);
        }
    }

    fn report(&self, error: &Error, context: &ErrorContext<'_>) {
        self.error_sink.report(error, context);
        self.emit(context.name, context.key.unwrap_or_default(), MemoActivity::Error, None);
    }

    fn encode(&self, entry: &Entry) -> Result<Vec<u8>, Error> {
        let payload = self.codec.serialize(entry)?;
        match (self.compression, self.store.capability()) {
            (Some(compression), StoreCapability::Binary) => compression.compress(payload),
            _ => Ok(payload),
        }
    }

    fn decode<T: DeserializeOwned>(&self, payload: Vec<u8>) -> Result<Result<T, CapturedError>, Error> {
        let payload = Compression::decompress(payload)?;
        self.codec.deserialize(&payload)?.into_outcome()
    }

    fn capture<E: CapturableError>(&self, error: &E) -> CapturedError {
        let captured = error.capture();
        match &self.error_fields {
            Some(allowed) => captured.retain_fields(allowed),
            None => captured,
        }
    }
}

/// Wraps computations so their outcomes are shared through a [`RemoteStore`].
///
/// A memoizer owns the pending background writes and every computation it wraps
/// coalesces concurrent calls in this process. Clones share that state, so build one
/// per store and clone it freely.
///
/// # Examples
///
/// ```
/// use recall::{Memoizer, TracingErrorSink, WrapOptions};
/// use recall_store::MemoryStore;
/// use tick::Clock;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), recall::Error> {
///
/// let clock = Clock::new_tokio();
/// let memoizer = Memoizer::builder(MemoryStore::new(clock.clone()), clock)
///     .error_sink(TracingErrorSink)
///     .build()?;
///
/// let add = memoizer.wrap(
///     |(a, b): (i64, i64)| async move { Ok::<_, String>(a + b) },
///     WrapOptions::new("add"),
/// )?;
///
/// assert_eq!(add.call((1, 2)).await, Ok(3));
/// assert_eq!(add.call((1, 2)).await, Ok(3));
/// # Ok(())
/// # }
/// ```
pub struct Memoizer<S> {
    core: Arc<Core<S>>,
}

impl<S> Clone for Memoizer<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S> fmt::Debug for Memoizer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoizer")
            .field("namespace", &self.core.namespace)
            .field("default_ttl", &self.core.default_ttl)
            .field("lookup_timeout", &self.core.lookup_timeout)
            .field("lock_timeout", &self.core.lock_timeout)
            .field("pending", &self.core.pending)
            .finish_non_exhaustive()
    }
}

impl<S> Memoizer<S>
where
    S: RemoteStore + 'static,
{
    /// Starts building a memoizer over `store`, keeping time with `clock`.
    pub fn builder(store: S, clock: Clock) -> MemoizerBuilder<S> {
        MemoizerBuilder::new(store, clock)
    }

    pub(crate) fn from_core(core: Core<S>) -> Self {
        Self { core: Arc::new(core) }
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Core<S> {
        &self.core
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.core.namespace
    }

    /// Returns the store outcomes are written to.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.core.store
    }

    /// Builds the key under which `name` called with `args` is stored.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `args` cannot be represented as JSON.
    pub fn key_for<A>(&self, name: &str, args: &A) -> Result<CacheKey, Error>
    where
        A: Serialize + ?Sized,
    {
        CacheKey::new(&self.core.namespace, name, args)
    }

    /// Wraps `computation` under the options' name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty or only whitespace.
    pub fn wrap<A, T, E, F, Fut>(&self, computation: F, options: WrapOptions<T, E>) -> Result<Memoized<S, A, T, E, F>, Error>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if options.name.trim().is_empty() {
            return Err(Error::configuration("computation name must not be empty"));
        }

        let ttl = options.ttl.clone().unwrap_or(Ttl::Fixed(self.core.default_ttl));
        let lock_timeout = options.lock_timeout.unwrap_or(self.core.lock_timeout);
        Ok(Memoized {
            core: Arc::clone(&self.core),
            name: Arc::from(options.name.as_str()),
            ttl,
            lock_timeout,
            memoize_errors_when: options.memoize_errors_when,
            computation,
            flight: UniFlight::new(),
            _args: PhantomData,
        })
    }

    /// Waits until every background write submitted so far has finished.
    ///
    /// Call before shutting down so recently computed outcomes reach the store.
    pub async fn flush(&self) {
        self.core.pending.wait_all().await;
    }
}

/// A computation wrapped by [`Memoizer::wrap`].
pub struct Memoized<S, A, T, E, F> {
    core: Arc<Core<S>>,
    name: Arc<str>,
    ttl: Ttl<T>,
    lock_timeout: Duration,
    memoize_errors_when: Option<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
    computation: F,
    flight: UniFlight<String, Result<T, E>>,
    _args: PhantomData<fn(A)>,
}

impl<S, A, T, E, F> fmt::Debug for Memoized<S, A, T, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl<S, A, T, E, F> Memoized<S, A, T, E, F>
where
    S: RemoteStore + 'static,
    A: Serialize,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    E: CapturableError + Clone + Send + Sync + 'static,
{
    /// Returns the computation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stored outcome for `args`, computing and storing it on a miss.
    ///
    /// Store, codec, and lock problems never fail the call: they are reported to the
    /// error sink and the computation runs directly. The only error returned is the
    /// computation's own, either fresh or replayed from the store.
    ///
    /// # Errors
    ///
    /// Returns the computation's error.
    pub async fn call<Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match CacheKey::new(&self.core.namespace, &self.name, &args) {
            Ok(key) => key,
            Err(error) => {
                self.report(&error, None, Phase::Key);
                return (self.computation)(args).await;
            }
        };

        if let Some(outcome) = self.lookup(&key).await {
            return outcome;
        }

        // Followers of a canceled leader are promoted and run their own closure.
        let mut led = false;
        let outcome = self
            .flight
            .work(key.as_str().to_owned(), || {
                led = true;
                self.lead(&key, args)
            })
            .await;
        if !led {
            self.emit(&key, MemoActivity::Coalesced, None);
        }
        outcome
    }

    async fn lead<Fut>(&self, key: &CacheKey, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = self.core.clock.instant();
        let lease = self.core.lock.acquire(key.as_str(), self.lock_timeout).await;
        let waited = self.core.clock.instant().saturating_duration_since(started);
        let activity = if lease.is_owned() {
            MemoActivity::LockAcquired
        } else {
            MemoActivity::LockTimedOut
        };
        self.emit(key, activity, Some(waited));

        let outcome = match self.lookup(key).await {
            Some(outcome) => outcome,
            None => {
                let outcome = (self.computation)(args).await;
                self.settle(key, &outcome).await;
                outcome
            }
        };

        self.release(key, lease).await;
        outcome
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Result<T, E>> {
        let core = &self.core;
        let bound = self.ttl.estimate().min(core.lookup_timeout);
        let started = core.clock.instant();

        let read = async {
            core.pending.wait(key.as_str()).await;
            core.store.get(key.as_str()).await
        }
        .timeout(&core.clock, bound)
        .await;
        let elapsed = core.clock.instant().saturating_duration_since(started);

        let Ok(read) = read else {
            self.emit(key, MemoActivity::LookupTimeout, Some(elapsed));
            return None;
        };
        self.emit(key, MemoActivity::LookupCompleted, Some(elapsed));

        let payload = match read {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.emit(key, MemoActivity::Miss, None);
                return None;
            }
            Err(error) => {
                self.report(&error.into(), Some(key), Phase::Lookup);
                self.emit(key, MemoActivity::Miss, None);
                return None;
            }
        };

        match core.decode::<T>(payload) {
            Ok(outcome) => {
                self.emit(key, MemoActivity::Hit, None);
                Some(outcome.map_err(E::from_captured))
            }
            Err(error) => {
                self.report(&error, Some(key), Phase::Lookup);
                self.emit(key, MemoActivity::Miss, None);
                None
            }
        }
    }

    async fn settle(&self, key: &CacheKey, outcome: &Result<T, E>) {
        match outcome {
            Ok(value) => {
                let ttl = self.ttl.resolve(Some(value));
                if ttl.is_zero() {
                    return;
                }
                match Entry::from_value(value).and_then(|entry| self.core.encode(&entry)) {
                    Ok(payload) => self.write_in_background(key, payload, ttl).await,
                    Err(error) => self.report(&error, Some(key), Phase::Write),
                }
            }
            Err(error) => {
                let captured = self.core.capture(error);
                let memoize = match &self.memoize_errors_when {
                    Some(predicate) => predicate(error),
                    None => (self.core.memoize_errors)(&captured),
                };
                let ttl = self.ttl.resolve(None);
                if !memoize || ttl.is_zero() {
                    return;
                }
                if let Err(error) = self.write_error(key, &Entry::Error(captured), ttl).await {
                    self.report(&error, Some(key), Phase::ErrorWrite);
                }
            }
        }
    }

    async fn write_in_background(&self, key: &CacheKey, payload: Vec<u8>, ttl: Duration) {
        let guard = self.core.pending.register(key.as_str());
        let core = Arc::clone(&self.core);
        let name = Arc::clone(&self.name);
        let key = key.clone();

        spawn_or_run(async move {
            if let Err(error) = core.store.set(key.as_str(), payload, ttl, SetMode::Always).await {
                let context = ErrorContext {
                    name: &name,
                    key: Some(key.as_str()),
                    phase: Phase::Write,
                };
                core.report(&error.into(), &context);
            }
            drop(guard);
        })
        .await;
    }

    // Callers see a memoized error right away, so this write is awaited.
    async fn write_error(&self, key: &CacheKey, entry: &Entry, ttl: Duration) -> Result<(), Error> {
        let payload = self.core.encode(entry)?;
        self.core
            .store
            .set(key.as_str(), payload, ttl, SetMode::Always)
            .timeout(&self.core.clock, self.core.lookup_timeout)
            .await
            .map_err(Error::store)??;
        Ok(())
    }

    async fn release(&self, key: &CacheKey, lease: Lease<S>) {
        let held = lease.held();
        match lease.release().await {
            Ok(true) => self.emit(key, MemoActivity::LockReleased, Some(held)),
            Ok(false) => {}
            Err(error) => self.report(&error.into(), Some(key), Phase::Release),
        }
    }

    fn emit(&self, key: &CacheKey, activity: MemoActivity, duration: Option<Duration>) {
        self.core.emit(&self.name, key.as_str(), activity, duration);
    }

    fn report(&self, error: &Error, key: Option<&CacheKey>, phase: Phase) {
        let context = ErrorContext {
            name: &self.name,
            key: key.map(CacheKey::as_str),
            phase,
        };
        self.core.report(error, &context);
    }
}
