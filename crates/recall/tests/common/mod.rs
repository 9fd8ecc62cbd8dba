// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(dead_code, reason = "each test binary uses a different subset")]

//! Helpers shared by the integration tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use recall::{Error, ErrorContext, MemoActivity, MemoEvent, Memoizer, MemoizerBuilder, Phase};
use recall_store::RemoteStore;
use tick::Clock;

/// Collects everything a memoizer reports.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    errors: Arc<Mutex<Vec<(Phase, Option<String>, String)>>>,
    events: Arc<Mutex<Vec<MemoActivity>>>,
}

impl Recorder {
    pub fn phases(&self) -> Vec<Phase> {
        self.errors.lock().iter().map(|(phase, _, _)| *phase).collect()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().iter().map(|(_, _, message)| message.clone()).collect()
    }

    pub fn error_keys(&self) -> Vec<Option<String>> {
        self.errors.lock().iter().map(|(_, key, _)| key.clone()).collect()
    }

    pub fn activities(&self) -> Vec<MemoActivity> {
        self.events.lock().clone()
    }

    pub fn count(&self, activity: MemoActivity) -> usize {
        self.events.lock().iter().filter(|seen| **seen == activity).count()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
        self.events.lock().clear();
    }
}

/// A builder with the recorder attached as error and event sink.
pub fn builder<S>(store: S, clock: Clock, recorder: &Recorder) -> MemoizerBuilder<S>
where
    S: RemoteStore + 'static,
{
    let errors = Arc::clone(&recorder.errors);
    let events = Arc::clone(&recorder.events);
    Memoizer::builder(store, clock)
        .error_sink(move |error: &Error, context: &ErrorContext<'_>| {
            errors
                .lock()
                .push((context.phase, context.key.map(str::to_owned), error.to_string()));
        })
        .event_sink(move |event: &MemoEvent<'_>| events.lock().push(event.activity))
}

/// Counts invocations of a computation.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
