// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use xxhash_rust::xxh3::xxh3_128;

use crate::Error;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "recall";

const LOCK_PREFIX: &str = "lock.";

/// The store key of one memoized call.
///
/// Rendered as `<namespace>:<name>:<fingerprint>`, where the fingerprint is the
/// lowercase hex xxh3-128 digest of the arguments after JSON normalization. Object keys
/// are written in sorted order at every depth, so maps with equal contents produce equal
/// keys regardless of iteration order or how `serde_json` stores objects.
///
/// # Examples
///
/// ```
/// use recall::CacheKey;
///
/// let key = CacheKey::new("recall", "fn1", &(1, 2))?;
/// assert!(key.as_str().starts_with("recall:fn1:"));
/// assert_eq!(key, CacheKey::new("recall", "fn1", &(1, 2))?);
/// assert_ne!(key, CacheKey::new("recall", "fn2", &(1, 2))?);
/// # Ok::<(), recall::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    rendered: String,
    name_end: usize,
    namespace_end: usize,
}

impl CacheKey {
    /// Builds the key for calling computation `name` with `args`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `args` cannot be represented as JSON, for example a map
    /// with non-string keys.
    pub fn new<A>(namespace: &str, name: &str, args: &A) -> Result<Self, Error>
    where
        A: Serialize + ?Sized,
    {
        let fingerprint = fingerprint(args)?;
        let rendered = format!("{namespace}:{name}:{fingerprint}");
        Ok(Self {
            namespace_end: namespace.len(),
            name_end: namespace.len() + 1 + name.len(),
            rendered,
        })
    }

    /// Returns the full key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Returns the namespace segment.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.rendered[..self.namespace_end]
    }

    /// Returns the computation name segment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.rendered[self.namespace_end + 1..self.name_end]
    }

    /// Returns the argument fingerprint segment.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.rendered[self.name_end + 1..]
    }

    /// Returns the key of the lock record guarding this entry.
    #[must_use]
    pub fn lock_key(&self) -> String {
        lock_key(&self.rendered)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

/// Returns the hex digest identifying `args`.
///
/// # Errors
///
/// Returns a codec error if `args` cannot be represented as JSON.
pub fn fingerprint<A>(args: &A) -> Result<String, Error>
where
    A: Serialize + ?Sized,
{
    let normalized = serde_json::to_value(args).map_err(Error::codec)?;
    let mut bytes = Vec::new();
    write_canonical(&normalized, &mut bytes).map_err(Error::codec)?;
    Ok(format!("{:032x}", xxh3_128(&bytes)))
}

// `Map` keeps insertion order when serde_json's `preserve_order` is on, so sort here.
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> serde_json::Result<()> {
    match value {
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            out.push(b'{');
            for (index, (name, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, name)?;
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

pub(crate) fn lock_key(key: &str) -> String {
    format!("{LOCK_PREFIX}{key}")
}
