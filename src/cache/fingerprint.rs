//! Content hashing for cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::filter::FilterSelection;

/// SHA-256 of the JSON serialization of `value`, as 64 lowercase hex chars.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint of a filter selection. Selections holding the same values
/// hash equal whatever order the values were picked in.
pub fn fingerprint(filter: &FilterSelection) -> Result<String, serde_json::Error> {
    compute_hash(filter)
}
