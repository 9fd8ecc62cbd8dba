// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc, time::Duration};

use recall_store::RemoteStore;
use tick::Clock;

use super::{CapturedPredicate, DEFAULT_LOCK_TIMEOUT, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_TTL, Settings};
use crate::{
    CapturedError, Codec, Compression, DistributedLock, Error, ErrorSink, EventSink, JsonCodec, MemoTelemetry, Memoizer,
    engine::Core, key::DEFAULT_NAMESPACE, lock::DEFAULT_RETRY_DELAY,
};

const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Builder for a [`Memoizer`].
///
/// Created by [`Memoizer::builder`]. An [`ErrorSink`] is required; everything else has a
/// default.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall::{Memoizer, TracingErrorSink};
/// use recall_store::MemoryStore;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let memoizer = Memoizer::builder(MemoryStore::new(clock.clone()), clock)
///     .namespace("rev-42")
///     .default_ttl(Duration::from_secs(60))
///     .error_sink(TracingErrorSink)
///     .build()?;
///
/// assert_eq!(memoizer.namespace(), "rev-42");
/// # Ok::<(), recall::Error>(())
/// ```
#[must_use]
pub struct MemoizerBuilder<S> {
    store: S,
    clock: Clock,
    namespace: String,
    default_ttl: Duration,
    lookup_timeout: Duration,
    lock_timeout: Duration,
    lock_retry_delay: Duration,
    memoize_errors: CapturedPredicate,
    error_fields: Option<Vec<String>>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    event_sink: Option<Arc<dyn EventSink>>,
    codec: Arc<dyn Codec>,
    compression: Option<Compression>,
    telemetry: MemoTelemetry,
}

impl<S> MemoizerBuilder<S>
where
    S: RemoteStore + 'static,
{
    pub(crate) fn new(store: S, clock: Clock) -> Self {
        Self {
            store,
            clock,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            default_ttl: DEFAULT_TTL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_retry_delay: DEFAULT_RETRY_DELAY,
            memoize_errors: Arc::new(|_: &CapturedError| false),
            error_fields: None,
            error_sink: None,
            event_sink: None,
            codec: Arc::new(JsonCodec::new()),
            compression: None,
            telemetry: MemoTelemetry::new(),
        }
    }

    /// Sets the prefix of every cache key. Defaults to `recall`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the expiry of outcomes whose computation sets no TTL. Defaults to 5 minutes.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Bounds every store read. Defaults to 300 ms.
    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Sets how long callers wait for the distributed lock. Defaults to 1 s.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the pause between lock attempts. Defaults to 50 ms; values below 1 ms are
    /// raised to 1 ms.
    pub fn lock_retry_delay(mut self, delay: Duration) -> Self {
        self.lock_retry_delay = delay;
        self
    }

    /// Memoizes every computation error, or none.
    pub fn memoize_errors(mut self, enabled: bool) -> Self {
        self.memoize_errors = Arc::new(move |_: &CapturedError| enabled);
        self
    }

    /// Memoizes computation errors for which `predicate` returns `true`.
    pub fn memoize_errors_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CapturedError) -> bool + Send + Sync + 'static,
    {
        self.memoize_errors = Arc::new(predicate);
        self
    }

    /// Keeps only the named error attributes when storing errors.
    pub fn error_fields<I, N>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.error_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the receiver of swallowed store and codec errors. Required.
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Sets a receiver for every memoization event.
    pub fn event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.event_sink = Some(Arc::new(sink));
        self
    }

    /// Replaces the default [`JsonCodec`].
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Compresses large payloads for stores that accept binary values.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Enables built-in logs and metrics.
    pub fn telemetry(mut self, telemetry: MemoTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Applies loaded [`Settings`], replacing every value they cover.
    pub fn settings(self, settings: Settings) -> Self {
        let builder = self
            .namespace(settings.namespace.clone())
            .default_ttl(settings.default_ttl())
            .lookup_timeout(settings.lookup_timeout())
            .lock_timeout(settings.lock_timeout())
            .lock_retry_delay(settings.lock_retry_delay())
            .memoize_errors(settings.memoize_errors);
        match settings.error_fields {
            Some(fields) => builder.error_fields(fields),
            None => MemoizerBuilder {
                error_fields: None,
                ..builder
            },
        }
    }

    /// Builds the memoizer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no error sink was set or the namespace is blank.
    pub fn build(self) -> Result<Memoizer<S>, Error> {
        let Some(error_sink) = self.error_sink else {
            return Err(Error::configuration("an error sink is required"));
        };
        if self.namespace.trim().is_empty() {
            return Err(Error::configuration("namespace must not be empty"));
        }

        let store = Arc::new(self.store);
        let lock =
            DistributedLock::new(Arc::clone(&store), self.clock.clone()).with_retry_delay(self.lock_retry_delay.max(MIN_RETRY_DELAY));

        Ok(Memoizer::from_core(Core {
            store,
            clock: self.clock,
            lock,
            namespace: self.namespace,
            default_ttl: self.default_ttl,
            lookup_timeout: self.lookup_timeout,
            lock_timeout: self.lock_timeout,
            memoize_errors: self.memoize_errors,
            error_fields: self.error_fields,
            error_sink,
            event_sink: self.event_sink,
            codec: self.codec,
            compression: self.compression,
            telemetry: self.telemetry,
            pending: crate::background::PendingWrites::default(),
        }))
    }
}

impl<S> fmt::Debug for MemoizerBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizerBuilder")
            .field("namespace", &self.namespace)
            .field("default_ttl", &self.default_ttl)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("lock_timeout", &self.lock_timeout)
            .field("lock_retry_delay", &self.lock_retry_delay)
            .field("error_fields", &self.error_fields)
            .field("error_sink", &self.error_sink.is_some())
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}
