// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, sync::Arc};

use super::{Codec, Entry, Reviver, revive::revive_tree};
use crate::Error;

/// The default [`Codec`]: tagged JSON, with an optional [`Reviver`].
///
/// # Examples
///
/// ```
/// use recall::{Codec, DateReviver, Entry, JsonCodec};
/// use serde_json::json;
///
/// let codec = JsonCodec::new().with_reviver(DateReviver);
/// let bytes = codec.serialize(&Entry::Value(json!({ "at": "2024-05-01T08:00:00+08:00" })))?;
///
/// assert_eq!(codec.deserialize(&bytes)?, Entry::Value(json!({ "at": "2024-05-01T00:00:00Z" })));
/// # Ok::<(), recall::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct JsonCodec {
    reviver: Option<Arc<dyn Reviver>>,
}

impl JsonCodec {
    /// Creates a codec without a reviver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `reviver` to decoded values.
    #[must_use]
    pub fn with_reviver(mut self, reviver: impl Reviver + 'static) -> Self {
        self.reviver = Some(Arc::new(reviver));
        self
    }
}

impl fmt::Debug for JsonCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec").field("reviver", &self.reviver.is_some()).finish()
    }
}

impl Codec for JsonCodec {
    fn serialize(&self, entry: &Entry) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(entry).map_err(Error::codec)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Entry, Error> {
        let entry: Entry = serde_json::from_slice(bytes).map_err(Error::codec)?;
        Ok(match (entry, &self.reviver) {
            (Entry::Value(value), Some(reviver)) => Entry::Value(revive_tree(reviver.as_ref(), value)),
            (entry, _) => entry,
        })
    }
}
