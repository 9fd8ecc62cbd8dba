// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Network-backed memoization with distributed locking and stampede protection.
//!
//! A [`Memoizer`] wraps asynchronous computations so their outcomes are stored in a
//! shared [`RemoteStore`](recall_store::RemoteStore) under a key derived from a stable
//! computation name and the call arguments. Identical calls, in one process or across a
//! fleet, then share a single execution.
//!
//! # Call Flow
//!
//! 1. **Lookup**: read the key, bounded by the lookup timeout. A stored value is returned,
//!    a stored error is replayed.
//! 2. **Coalesce**: concurrent misses for the same key in this process wait for the first
//!    caller and receive a clone of its outcome.
//! 3. **Lock**: the first caller takes a [`DistributedLock`] so other processes wait for it,
//!    then looks up again in case another process already stored the outcome.
//! 4. **Execute and settle**: the computation runs once; its value is written in the
//!    background and errors are written right away when error memoization is enabled.
//!
//! Every step fails open. When the store is slow or broken the call degrades to running
//! the computation directly, at most one lookup timeout later than an unmemoized call.
//! The failures go to the required [`ErrorSink`].
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use recall::{Memoizer, TracingErrorSink, WrapOptions};
//! use recall_store::MemoryStore;
//! use serde::{Deserialize, Serialize};
//! use tick::Clock;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), recall::Error> {
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Pair {
//!     a: i32,
//!     b: i32,
//! }
//!
//! let clock = Clock::new_tokio();
//! let memoizer = Memoizer::builder(MemoryStore::new(clock.clone()), clock)
//!     .error_sink(TracingErrorSink)
//!     .build()?;
//!
//! let fn1 = memoizer.wrap(
//!     |(a, b): (i32, i32)| async move { Ok::<_, String>(Pair { a, b }) },
//!     WrapOptions::new("fn1").ttl(Duration::from_secs(60)),
//! )?;
//!
//! assert_eq!(fn1.call((1, 2)).await, Ok(Pair { a: 1, b: 2 }));
//! memoizer.flush().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Stored Format
//!
//! Keys are `<namespace>:<name>:<fingerprint>` ([`CacheKey`]); lock markers live under
//! `lock.<key>`. Values are encoded by a [`Codec`], by default [`JsonCodec`], as a tagged
//! [`Entry`] so that `null`, `()`, and stored errors stay distinguishable. Typed values
//! such as `chrono::DateTime` round-trip through their own serde impls; the opt-in
//! [`DateReviver`] normalizes timestamp strings in dynamic payloads.
//!
//! # Features
//!
//! - `metrics`: OpenTelemetry counters and histograms through [`MemoTelemetry::with_metrics`].
//! - `redis`: the Redis store from `recall_store`.

mod background;
pub mod codec;
mod config;
mod engine;
mod error;
mod key;
mod lock;
mod sink;
mod telemetry;
mod ttl;

#[doc(inline)]
pub use codec::{CapturableError, CapturedError, Codec, Compression, DateReviver, Entry, JsonCodec, Reviver};
#[doc(inline)]
pub use config::{DEFAULT_LOCK_TIMEOUT, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_TTL, MemoizerBuilder, Settings, WrapOptions};
#[doc(inline)]
pub use engine::{Memoized, Memoizer};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use key::{CacheKey, DEFAULT_NAMESPACE, fingerprint};
#[doc(inline)]
pub use lock::{DEFAULT_RETRY_DELAY, DistributedLock, Lease, MAX_LOCK_TIMEOUT};
#[doc(inline)]
pub use sink::{ErrorContext, ErrorSink, Phase, TracingErrorSink};
#[doc(inline)]
pub use telemetry::{EventSink, MemoActivity, MemoEvent, MemoTelemetry};
#[doc(inline)]
pub use ttl::Ttl;
