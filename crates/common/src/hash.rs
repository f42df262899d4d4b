//! Deterministic content hashing.
//!
//! Queue deduplication ids and transaction ids are derived from message
//! content so that re-sending identical content collapses inside the
//! transport's deduplication window.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 digest of `content`.
pub fn content_hash(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    hex::encode(hasher.finalize())
}

/// Serializes `value` to JSON and hashes the resulting bytes.
///
/// Struct fields serialize in declaration order, so equal values always
/// produce equal hashes.
pub fn json_content_hash<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(content_hash(bytes))
}
