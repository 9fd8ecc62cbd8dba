// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Remote key-value store abstraction used by `recall`.
//!
//! This crate defines the [`RemoteStore`] trait that the memoization engine talks to,
//! together with the small vocabulary it needs: [`SetMode`] for plain and set-if-absent
//! writes, [`SetOutcome`] to report whether a conditional write happened, and
//! [`StoreCapability`] to describe whether the backing client can carry arbitrary bytes.
//!
//! # Implementing a Store
//!
//! ```
//! use std::time::Duration;
//!
//! use recall_store::{Error, RemoteStore, SetMode, SetOutcome};
//!
//! struct NullStore;
//!
//! impl RemoteStore for NullStore {
//!     async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, Error> {
//!         Ok(None)
//!     }
//!
//!     async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration, _mode: SetMode) -> Result<SetOutcome, Error> {
//!         Ok(SetOutcome::Stored)
//!     }
//!
//!     async fn delete(&self, _key: &str) -> Result<(), Error> {
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Provided Stores
//!
//! - [`MemoryStore`]: process-local store driven by a [`tick::Clock`], useful for
//!   development and single-process deployments.
//! - `RedisStore` (feature `redis`): Redis client over a multiplexed connection manager.
//! - `testing::MockStore` (feature `test-util`): records operations and injects failures
//!   and latency.

pub mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
#[doc(inline)]
pub use redis::RedisStore;
#[doc(inline)]
pub use store::{RemoteStore, SetMode, SetOutcome, StoreCapability, ttl_millis};
