// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Conversion between memoized outcomes and stored bytes.

mod captured;
mod compression;
mod entry;
mod json;
mod revive;

pub use captured::{CapturableError, CapturedError};
pub use compression::Compression;
pub use entry::Entry;
pub use json::JsonCodec;
pub use revive::{DateReviver, Reviver};

use crate::Error;

/// Encodes [`Entry`] values for the store.
///
/// Replace the default [`JsonCodec`] through
/// [`MemoizerBuilder::codec`](crate::MemoizerBuilder::codec). Implementations must keep
/// the three entry variants distinguishable after a round trip.
pub trait Codec: Send + Sync {
    /// Encodes an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded; nothing is written in that case.
    fn serialize(&self, entry: &Entry) -> Result<Vec<u8>, Error>;

    /// Decodes an entry.
    ///
    /// # Errors
    ///
    /// Returns an error for corrupt or foreign payloads; the lookup is then treated as a
    /// miss.
    fn deserialize(&self, bytes: &[u8]) -> Result<Entry, Error>;
}
