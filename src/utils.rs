//! Utility functions for identifiers and hash formats

use bech32::{Bech32m, Hrp};
use uuid7::uuid7;

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

const MESSAGE_HRP: Hrp = Hrp::parse_unchecked("msg");

/// Transport-level id for an outbound envelope.
pub fn new_message_id() -> String {
    let id = uuid7();
    // a 16 byte payload under a fixed hrp is always within bech32m limits
    bech32::encode::<Bech32m>(MESSAGE_HRP, id.as_bytes()).unwrap_or_else(|_| id.to_string())
}

/// True when `value` looks like a digest produced by the canonical hasher.
pub fn is_content_hash(value: &str) -> bool {
    value.len() == HASH_HEX_LEN
        && !value.chars().any(|c| c.is_ascii_uppercase())
        && hex::decode(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique_bech32m() {
        let a = new_message_id();
        let b = new_message_id();

        assert!(a.starts_with("msg1"));
        assert_ne!(a, b);
        assert!(bech32::decode(&a).is_ok());
    }

    #[test]
    fn content_hash_format() {
        let digest = sha256::digest("listing");
        assert!(is_content_hash(&digest));
        assert!(!is_content_hash(&digest.to_uppercase()));
        assert!(!is_content_hash("TEST-HASH"));
        assert!(!is_content_hash(&digest[..63]));
    }
}
