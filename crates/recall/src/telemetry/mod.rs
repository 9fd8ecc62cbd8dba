// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoization events, structured logs, and metrics.

use std::time::Duration;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, MeterProvider},
};
use tracing::Level;

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// What happened during a memoized call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MemoActivity {
    /// The store held an outcome for the key.
    Hit,
    /// The store had nothing usable for the key.
    Miss,
    /// The store did not answer within the lookup timeout.
    LookupTimeout,
    /// A store read finished, hit or miss. Carries the read duration.
    LookupCompleted,
    /// The caller took the distributed lock. Carries the wait.
    LockAcquired,
    /// The caller gave up on the lock and runs without it. Carries the wait.
    LockTimedOut,
    /// An owned lock was released. Carries how long it was held.
    LockReleased,
    /// The caller waited for another in-process caller's outcome.
    Coalesced,
    /// An infrastructure error was reported to the error sink.
    Error,
}

impl MemoActivity {
    /// Returns the stable name of this activity.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "memo.hit",
            Self::Miss => "memo.miss",
            Self::LookupTimeout => "memo.lookup_timeout",
            Self::LookupCompleted => "memo.lookup_completed",
            Self::LockAcquired => "memo.lock_acquired",
            Self::LockTimedOut => "memo.lock_timed_out",
            Self::LockReleased => "memo.lock_released",
            Self::Coalesced => "memo.coalesced",
            Self::Error => "memo.error",
        }
    }

    pub(crate) fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::LookupCompleted | Self::LockAcquired | Self::LockReleased | Self::Coalesced => {
                Level::DEBUG
            }
            Self::LookupTimeout | Self::LockTimedOut => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }
}

/// One memoization event, passed to [`EventSink`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoEvent<'a> {
    /// The computation name given at wrap time.
    pub name: &'a str,
    /// The cache key of the call.
    pub key: &'a str,
    /// What happened.
    pub activity: MemoActivity,
    /// Duration attached to the activity, if it has one.
    pub duration: Option<Duration>,
}

/// Receives every [`MemoEvent`].
///
/// Closures taking `&MemoEvent` implement this trait.
///
/// # Examples
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// use recall::{EventSink, MemoActivity, MemoEvent};
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let sink = {
///     let hits = Arc::clone(&hits);
///     move |event: &MemoEvent<'_>| {
///         if event.activity == MemoActivity::Hit {
///             hits.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// };
///
/// sink.record(&MemoEvent { name: "fn1", key: "recall:fn1:00", activity: MemoActivity::Hit, duration: None });
/// assert_eq!(hits.load(Ordering::Relaxed), 1);
/// ```
pub trait EventSink: Send + Sync {
    /// Handles one event. Must not block.
    fn record(&self, event: &MemoEvent<'_>);
}

impl<F> EventSink for F
where
    F: Fn(&MemoEvent<'_>) + Send + Sync,
{
    fn record(&self, event: &MemoEvent<'_>) {
        self(event);
    }
}

/// Built-in recording of memoization events as logs and metrics.
///
/// Everything is disabled by default. Logs go through `tracing` with the event's
/// activity deciding the level; metrics use OpenTelemetry (feature `metrics`).
///
/// # Examples
///
/// ```
/// use recall::MemoTelemetry;
///
/// let telemetry = MemoTelemetry::new().with_logs();
/// assert!(telemetry.logs_enabled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoTelemetry {
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
    #[cfg(any(feature = "metrics", test))]
    operation_duration: Option<Histogram<f64>>,
}

impl MemoTelemetry {
    /// Creates a telemetry recorder with logs and metrics disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a `tracing` event for every memoization event.
    #[must_use]
    pub fn with_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Records counters and durations through `provider`.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_metrics(mut self, provider: &dyn MeterProvider) -> Self {
        let meter = metrics::create_meter(provider);
        self.event_counter = Some(metrics::create_event_counter(&meter));
        self.operation_duration = Some(metrics::create_operation_duration_histogram(&meter));
        self
    }

    /// Returns `true` if log emission is enabled.
    #[must_use]
    pub fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }

    pub(crate) fn record(&self, event: &MemoEvent<'_>) {
        #[cfg(any(feature = "metrics", test))]
        {
            let attrs = [
                KeyValue::new(attributes::MEMO_NAME, event.name.to_owned()),
                KeyValue::new(attributes::MEMO_ACTIVITY, event.activity.as_str()),
            ];
            if let Some(counter) = &self.event_counter {
                counter.add(1, &attrs);
            }
            if let (Some(duration), Some(histogram)) = (event.duration, &self.operation_duration) {
                histogram.record(duration.as_secs_f64(), &attrs);
            }
        }

        if self.logs_enabled {
            Self::emit(event);
        }
    }

    fn emit(event: &MemoEvent<'_>) {
        let activity = event.activity.as_str();
        let duration_ns = event.duration.map(|d| d.as_nanos());

        // Field names must match the constants in `attributes`.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    memo.name = event.name,
                    memo.key = event.key,
                    memo.activity = activity,
                    memo.duration_ns = ?duration_ns,
                    "memo.event"
                )
            };
        }

        match event.activity.level() {
            Level::ERROR => emit_event!(error),
            Level::INFO => emit_event!(info),
            _ => emit_event!(debug),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};

    fn event(activity: MemoActivity, duration: Option<Duration>) -> MemoEvent<'static> {
        MemoEvent {
            name: "fn1",
            key: "recall:fn1:abc",
            activity,
            duration,
        }
    }

    #[test]
    fn activity_names() {
        assert_eq!(MemoActivity::Hit.as_str(), "memo.hit");
        assert_eq!(MemoActivity::LookupTimeout.as_str(), "memo.lookup_timeout");
        assert_eq!(MemoActivity::LockReleased.as_str(), "memo.lock_released");
        assert_eq!(MemoActivity::Error.as_str(), "memo.error");
    }

    #[test]
    fn activity_levels() {
        assert_eq!(MemoActivity::Hit.level(), Level::DEBUG);
        assert_eq!(MemoActivity::Miss.level(), Level::DEBUG);
        assert_eq!(MemoActivity::LockTimedOut.level(), Level::INFO);
        assert_eq!(MemoActivity::LookupTimeout.level(), Level::INFO);
        assert_eq!(MemoActivity::Error.level(), Level::ERROR);
    }

    #[test]
    fn logs_contain_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        MemoTelemetry::new()
            .with_logs()
            .record(&event(MemoActivity::LookupCompleted, Some(Duration::from_nanos(4321))));

        capture.assert_contains(attributes::MEMO_NAME);
        capture.assert_contains(attributes::MEMO_KEY);
        capture.assert_contains(attributes::MEMO_ACTIVITY);
        capture.assert_contains(attributes::MEMO_DURATION);
        capture.assert_contains(attributes::MEMO_EVENT);
        capture.assert_contains("recall:fn1:abc");
        capture.assert_contains("4321");
    }

    #[test]
    fn logs_use_activity_level() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        MemoTelemetry::emit(&event(MemoActivity::Error, None));
        capture.assert_contains("ERROR");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        MemoTelemetry::emit(&event(MemoActivity::LockTimedOut, None));
        capture.assert_contains("INFO");
    }

    #[test]
    fn disabled_telemetry_is_silent() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        MemoTelemetry::new().record(&event(MemoActivity::Hit, None));

        assert!(capture.output().is_empty());
    }

    #[test]
    fn metrics_carry_name_and_activity() {
        let tester = MetricTester::new();
        let telemetry = MemoTelemetry::new().with_metrics(tester.meter_provider());

        telemetry.record(&event(MemoActivity::Miss, None));
        telemetry.record(&event(MemoActivity::LookupCompleted, Some(Duration::from_millis(3))));

        tester.assert_attributes_contain(&[
            KeyValue::new(attributes::MEMO_NAME, "fn1"),
            KeyValue::new(attributes::MEMO_ACTIVITY, MemoActivity::Miss.as_str()),
            KeyValue::new(attributes::MEMO_ACTIVITY, MemoActivity::LookupCompleted.as_str()),
        ]);
    }
}
