//! Deterministic digests used as dedup keys

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `input`
fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Identifying hash of a canonical project repository URL
///
/// Two themes from the same project carry the same hash no matter which
/// provider produced them. An empty URL has an empty hash.
pub fn repository_hash(canonical_url: &str) -> String {
    if canonical_url.is_empty() {
        return String::new();
    }
    sha256_hex(canonical_url)
}

/// Content hash of a theme download URL
pub fn content_hash(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    sha256_hex(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = repository_hash("https://github.com/owner/name");
        let b = repository_hash("https://github.com/owner/name");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_differs_for_different_input() {
        assert_ne!(
            repository_hash("https://github.com/owner/one"),
            repository_hash("https://github.com/owner/two")
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(repository_hash(""), "");
        assert_eq!(content_hash(""), "");
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
