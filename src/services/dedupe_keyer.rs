//! Deterministic fingerprint of (type, params) — C3.
//!
//! Canonicalization relies on `serde_json::Value`'s default map
//! representation: without the `preserve_order` feature, object keys are
//! stored in a `BTreeMap` and therefore serialize in lexicographic order at
//! every depth, with no insignificant whitespace and numbers in their
//! minimal JSON form. That is exactly the canonical form this key needs, so
//! no custom canonicalizer is required — `serde_json::to_string` on a
//! `{"type":..,"params":..}` envelope already produces it.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Compute the 64-char lowercase hex dedupe key for a task submission.
/// Pure: identical `(type_name, params)` always yields the identical key.
#[must_use]
pub fn compute(type_name: &str, params: &Value) -> String {
    let envelope = json!({ "type": type_name, "params": params });
    let canonical = serde_json::to_string(&envelope).expect("Value serialization cannot fail");
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}
