use sha2::{Digest, Sha256};

/// SHA-256 of the canonical content, rendered as lowercase hex. Identical
/// title sequences hash identically; any change in text or order does not.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(fingerprint("a\nb"), fingerprint("a\nb"));
    }

    #[test]
    fn test_order_sensitive() {
        assert_ne!(fingerprint("a\nb"), fingerprint("b\na"));
    }

    #[test]
    fn test_known_digest() {
        // sha256 of the empty string
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
