//! Request-identity cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request: method plus canonical URL.
///
/// The method is upper-cased so `get` and `GET` address the same entry.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", "https://example.com/index.html");
        let key2 = compute_request_key("GET", "https://example.com/index.html");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_method_case_insensitive() {
        assert_eq!(
            compute_request_key("get", "https://example.com/"),
            compute_request_key("GET", "https://example.com/")
        );
    }

    #[test]
    fn test_key_different_method() {
        let get = compute_request_key("GET", "https://example.com/");
        let head = compute_request_key("HEAD", "https://example.com/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
