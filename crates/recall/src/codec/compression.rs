// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Error;

/// Leading bytes of every zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const DEFAULT_LEVEL: i32 = 3;
const DEFAULT_THRESHOLD: usize = 1024;

/// zstd compression for stored payloads.
///
/// Payloads at or above the size threshold are compressed. Readers recognize compressed
/// payloads by the zstd frame magic, which can never start a JSON document, so entries
/// written with and without compression can be mixed in one store.
///
/// Compression is skipped for stores that only accept text.
///
/// # Examples
///
/// ```
/// use recall::Compression;
///
/// let compression = Compression::zstd().threshold(16);
/// let payload = br#"{"kind":"value","data":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#.to_vec();
///
/// let packed = compression.compress(payload.clone())?;
/// assert!(Compression::is_compressed(&packed));
/// assert_eq!(Compression::decompress(packed)?, payload);
/// # Ok::<(), recall::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    level: i32,
    threshold: usize,
}

impl Default for Compression {
    fn default() -> Self {
        Self::zstd()
    }
}

impl Compression {
    /// zstd at level 3 for payloads of 1 KiB or more.
    #[must_use]
    pub fn zstd() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Sets the zstd compression level.
    #[must_use]
    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Sets the minimum payload size that gets compressed.
    #[must_use]
    pub fn threshold(mut self, bytes: usize) -> Self {
        self.threshold = bytes;
        self
    }

    /// Compresses `payload` if it is large enough.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the encoder fails.
    pub fn compress(&self, payload: Vec<u8>) -> Result<Vec<u8>, Error> {
        if payload.len() < self.threshold {
            return Ok(payload);
        }
        zstd::encode_all(payload.as_slice(), self.level).map_err(Error::codec)
    }

    /// Returns `true` if `payload` starts with a zstd frame.
    #[must_use]
    pub fn is_compressed(payload: &[u8]) -> bool {
        payload.starts_with(&ZSTD_MAGIC)
    }

    /// Decompresses `payload` if it is a zstd frame and passes it through otherwise.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a frame is truncated or corrupt.
    pub fn decompress(payload: Vec<u8>) -> Result<Vec<u8>, Error> {
        if !Self::is_compressed(&payload) {
            return Ok(payload);
        }
        zstd::decode_all(payload.as_slice()).map_err(Error::codec)
    }
}
