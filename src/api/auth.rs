//! `X-API-Key` authentication (spec §6): a fixed key compared with
//! constant-time equality. The health endpoint is the sole exemption,
//! enforced by the caller (the dispatcher never calls this for `Health`).

use axum::http::HeaderMap;

/// Byte-for-byte comparison that runs in time independent of where the
/// first mismatch falls, so a timing side-channel can't be used to guess
/// the key one byte at a time. Still returns early on a length mismatch
/// (the key length itself is not a secret worth protecting).
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Extract `X-API-Key` and compare it against `expected`.
#[must_use]
pub fn verify(expected: &str, headers: &HeaderMap) -> bool {
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or_default();
    constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn equal_keys_match() {
        assert!(constant_time_eq(b"secret-key", b"secret-key"));
    }

    #[test]
    fn different_lengths_do_not_match() {
        assert!(!constant_time_eq(b"short", b"a-much-longer-key"));
    }

    #[test]
    fn single_byte_difference_does_not_match() {
        assert!(!constant_time_eq(b"secret-key", b"secret-keX"));
    }

    #[test]
    fn header_lookup_is_case_insensitive_for_header_name() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Key", HeaderValue::from_static("abc123"));
        assert!(verify("abc123", &headers));
        assert!(!verify("wrong", &headers));
    }

    #[test]
    fn missing_header_never_matches_a_nonempty_key() {
        let headers = HeaderMap::new();
        assert!(!verify("abc123", &headers));
    }
}
