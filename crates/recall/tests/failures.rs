// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for computation errors and for store failures that must not reach callers.

mod common;

use std::{fmt, time::Duration};

use common::{Calls, Recorder, builder};
use recall::{CapturableError, CapturedError, ErrorKind, MemoActivity, Memoizer, Phase, WrapOptions};
use recall_store::{
    MemoryStore, SetMode,
    testing::{MockStore, StoreOp},
};
use serde_json::{Map, Value};
use tick::Clock;

#[derive(Debug, Clone, PartialEq)]
struct HttpError {
    status: u16,
    body: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed with {}", self.status)
    }
}

impl CapturableError for HttpError {
    fn attributes(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("status".to_owned(), self.status.into());
        fields.insert("body".to_owned(), self.body.clone().into());
        fields
    }

    fn from_captured(captured: CapturedError) -> Self {
        Self {
            status: captured
                .field("status")
                .and_then(Value::as_u64)
                .and_then(|status| u16::try_from(status).ok())
                .unwrap_or_default(),
            body: captured.field("body").and_then(Value::as_str).unwrap_or_default().to_owned(),
        }
    }
}

#[tokio::test]
async fn errors_are_not_memoized_by_default() {
    let clock = Clock::new_frozen();
    let recorder = Recorder::default();
    let memoizer = builder(MemoryStore::new(clock.clone()), clock, &recorder).build().unwrap();
    let calls = Calls::default();
    let failing = memoizer
        .wrap(
            |id: u32| {
                calls.hit();
                async move { Err::<u32, _>(format!("{id} is unavailable")) }
            },
            WrapOptions::new("failing"),
        )
        .unwrap();

    assert_eq!(failing.call(1).await, Err("1 is unavailable".to_owned()));
    assert_eq!(failing.call(1).await, Err("1 is unavailable".to_owned()));
    assert_eq!(failing.call(1).await, Err("1 is unavailable".to_owned()));
    assert_eq!(calls.get(), 3);
    assert!(recorder.phases().is_empty());
}

#[tokio::test]
async fn memoized_errors_replay_message_and_fields() {
    let clock = Clock::new_frozen();
    let recorder = Recorder::default();
    let memoizer = builder(MemoryStore::new(clock.clone()), clock, &recorder)
        .memoize_errors(true)
        .build()
        .unwrap();
    let calls = Calls::default();
    let fetch = memoizer
        .wrap(
            |path: String| {
                calls.hit();
                async move {
                    Err::<String, _>(HttpError {
                        status: 404,
                        body: format!("{path} not found"),
                    })
                }
            },
            WrapOptions::new("fetch"),
        )
        .unwrap();

    let fresh = fetch.call("/a".to_owned()).await.unwrap_err();
    let replayed = fetch.call("/a".to_owned()).await.unwrap_err();

    assert_eq!(replayed, fresh);
    assert_eq!(replayed.to_string(), "request failed with 404");
    assert_eq!(calls.get(), 1);
    assert_eq!(recorder.count(MemoActivity::Hit), 1);
}

#[tokio::test]
async fn error_predicate_decides_per_error() {
    let clock = Clock::new_frozen();
    let recorder = Recorder::default();
    let memoizer = builder(MemoryStore::new(clock.clone()), clock, &recorder)
        .memoize_errors_when(|error| error.field("status").and_then(Value::as_u64).is_some_and(|status| status < 500))
        .build()
        .unwrap();
    let calls = Calls::default();
    let fetch = memoizer
        .wrap(
            |status: u16| {
                calls.hit();
                async move {
                    Err::<(), _>(HttpError {
                        status,
                        body: String::new(),
                    })
                }
            },
            WrapOptions::new("fetch"),
        )
        .unwrap();

    fetch.call(404).await.unwrap_err();
    fetch.call(404).await.unwrap_err();
    assert_eq!(calls.get(), 1);

    fetch.call(503).await.unwrap_err();
    fetch.call(503).await.unwrap_err();
    assert_eq!(calls.get(), 3);
}

#[tokio::test]
async fn error_fields_allow_list_drops_other_attributes() {
    let clock = Clock::new_frozen();
    let recorder = Recorder::default();
    let memoizer = builder(MemoryStore::new(clock.clone()), clock, &recorder)
        .memoize_errors(true)
        .error_fields(["status"])
        .build()
        .unwrap();
    let fetch = memoizer
        .wrap(
            |(): ()| async {
                Err::<(), _>(HttpError {
                    status: 410,
                    body: "secret".to_owned(),
                })
            },
            WrapOptions::new("fetch"),
        )
        .unwrap();

    fetch.call(()).await.unwrap_err();
    let replayed = fetch.call(()).await.unwrap_err();

    assert_eq!(replayed.status, 410);
    assert_eq!(replayed.body, "");
}

#[tokio::test]
async fn unavailable_store_falls_back_to_computation() {
    let clock = Clock::new_tokio();
    let store = MockStore::new(clock.clone());
    store.fail_when(|_| true);
    let recorder = Recorder::default();
    let memoizer = builder(store, clock, &recorder)
        .lock_timeout(Duration::from_millis(30))
        .lock_retry_delay(Duration::from_millis(10))
        .build()
        .unwrap();
    let calls = Calls::default();
    let echo = memoizer
        .wrap(
            |x: u32| {
                calls.hit();
                async move { Ok::<_, String>(x) }
            },
            WrapOptions::new("echo"),
        )
        .unwrap();

    assert_eq!(echo.call(1).await, Ok(1));
    assert_eq!(echo.call(1).await, Ok(1));
    memoizer.flush().await;

    assert_eq!(calls.get(), 2);
    let phases = recorder.phases();
    assert!(phases.contains(&Phase::Lookup));
    assert!(phases.contains(&Phase::Write));
    assert!(!phases.contains(&Phase::Release), "an unowned lock is never released");
    assert!(recorder.error_keys().iter().all(|key| key.as_deref().is_some_and(|key| key.starts_with("recall:echo:"))));
    assert!(recorder.error_messages().iter().all(|message| message.contains("store")));
    assert_eq!(recorder.count(MemoActivity::LockTimedOut), 2);
}

#[tokio::test]
async fn slow_store_is_bounded_by_lookup_timeout() {
    let clock = Clock::new_tokio();
    let store = MockStore::new(clock.clone());
    store.delay_when(|op| matches!(op, StoreOp::Get(_)).then_some(Duration::from_secs(2)));
    let recorder = Recorder::default();
    let memoizer = builder(store, clock.clone(), &recorder)
        .lookup_timeout(Duration::from_millis(30))
        .build()
        .unwrap();
    let calls = Calls::default();
    let echo = memoizer
        .wrap(
            |x: u32| {
                calls.hit();
                async move { Ok::<_, String>(x) }
            },
            WrapOptions::new("echo"),
        )
        .unwrap();

    let started = clock.instant();
    assert_eq!(echo.call(9).await, Ok(9));
    let elapsed = clock.instant().duration_since(started);

    assert!(elapsed < Duration::from_millis(500), "call took {elapsed:?}");
    assert_eq!(calls.get(), 1);
    assert_eq!(recorder.count(MemoActivity::LookupTimeout), 2);
    assert_eq!(recorder.count(MemoActivity::LookupCompleted), 0);
    assert!(recorder.phases().is_empty(), "timeouts are events, not errors");
}

#[tokio::test]
async fn failed_background_write_is_reported_not_returned() {
    let clock = Clock::new_frozen();
    let store = MockStore::new(clock.clone());
    store.fail_when(|op| matches!(op, StoreOp::Set { mode: SetMode::Always, .. }));
    let recorder = Recorder::default();
    let memoizer = builder(store, clock, &recorder).build().unwrap();
    let echo = memoizer
        .wrap(|x: u32| async move { Ok::<_, String>(x) }, WrapOptions::new("echo"))
        .unwrap();

    assert_eq!(echo.call(4).await, Ok(4));
    memoizer.flush().await;

    assert_eq!(recorder.phases(), vec![Phase::Write]);
    assert_eq!(recorder.count(MemoActivity::Error), 1);
}

#[test]
fn missing_error_sink_is_a_configuration_error() {
    let clock = Clock::new_frozen();
    let error = Memoizer::builder(MemoryStore::new(clock.clone()), clock).build().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Configuration);
}

#[test]
fn blank_name_is_a_configuration_error() {
    let clock = Clock::new_frozen();
    let memoizer = builder(MemoryStore::new(clock.clone()), clock, &Recorder::default())
        .build()
        .unwrap();

    for name in ["", "   "] {
        let error = memoizer
            .wrap(|x: u32| async move { Ok::<_, String>(x) }, WrapOptions::new(name))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }
}
