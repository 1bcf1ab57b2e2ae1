//! Deterministic content hashes
//!
//! Hashes are persisted in annotations, so they must be stable across builds
//! and toolchains. Inputs are serialized through `serde_json::Value`, whose
//! maps are sorted, so map iteration order never leaks into a hash.

use std::fmt::Write;

use aws_lc_rs::digest;
use serde::Serialize;

use eskube_common::{Error, Result};

fn truncated_hex(digest: &digest::Digest) -> String {
    digest.as_ref()[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

fn canonical_bytes<T: Serialize>(object: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(object).map_err(|e| Error::serialization(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| Error::serialization(e.to_string()))
}

/// Truncated SHA-256 of some bytes: hex of the first 8 bytes
pub fn hash_bytes(input: &[u8]) -> String {
    truncated_hex(&digest::digest(&digest::SHA256, input))
}

/// Hash of a serializable object, independent of map ordering
pub fn hash_object<T: Serialize>(object: &T) -> Result<String> {
    Ok(hash_bytes(&canonical_bytes(object)?))
}

/// Incremental hash over several parts
pub struct ContentHasher {
    ctx: digest::Context,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    /// Start an empty hash
    pub fn new() -> Self {
        Self {
            ctx: digest::Context::new(&digest::SHA256),
        }
    }

    /// Add raw bytes
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.ctx.update(bytes);
        self
    }

    /// Add a serializable object
    pub fn update_object<T: Serialize>(&mut self, object: &T) -> Result<&mut Self> {
        let bytes = canonical_bytes(object)?;
        Ok(self.update(&bytes))
    }

    /// Hex of the first 8 bytes of the digest
    pub fn finish(self) -> String {
        truncated_hex(&self.ctx.finish())
    }
}
