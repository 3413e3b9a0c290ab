//! Stored representation of a cache entry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A cached value together with its bookkeeping.
///
/// Entries are immutable once written; a later `set()` replaces the whole
/// entry. Serialized as JSON:
///
/// ```json
/// {"data": ..., "metadata": {"cachedAt": 1700000000000, "expiresAt": 1700000300000,
///  "etag": "9f86d0...", "tags": ["fixtures"]}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub metadata: CacheMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Epoch milliseconds at write time.
    pub cached_at: i64,
    /// `cached_at + ttl`, epoch milliseconds.
    pub expires_at: i64,
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
}

impl CacheMetadata {
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms <= self.expires_at
    }

    /// Milliseconds since expiry; zero or negative while fresh.
    pub fn stale_for_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.expires_at)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().flatten().map(String::as_str)
    }
}

/// Hex SHA-256 of the value's canonical JSON form.
///
/// Object keys are sorted before hashing, so two maps with the same contents
/// produce the same etag regardless of insertion order.
pub fn compute_etag<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
