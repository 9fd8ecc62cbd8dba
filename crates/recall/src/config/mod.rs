// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoizer construction and per-computation options.

use std::{sync::Arc, time::Duration};

use crate::CapturedError;

mod builder;
mod options;
mod settings;

pub use builder::MemoizerBuilder;
pub use options::WrapOptions;
pub use settings::Settings;

/// Expiry of memoized outcomes when a computation sets none.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Upper bound on a single store read.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(300);

/// How long a caller waits for the distributed lock before computing anyway.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Decides from its stored form whether a computation error is memoized.
pub(crate) type CapturedPredicate = Arc<dyn Fn(&CapturedError) -> bool + Send + Sync>;
