//! Tamper-evidence digest over an entry's frozen fields.
//!
//! The digest covers, in fixed order, the UTF-8 bytes of `secret`,
//! `secret_key_id`, `secret_id`, `target`, `group` — SHA-256, encoded as
//! base64. The validity window and `meta` are excluded: they are not
//! identity-bearing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Compute the checksum sealing an entry's frozen fields.
pub fn compute_checksum(
    secret: &str,
    secret_key_id: &str,
    secret_id: &str,
    target: &str,
    group: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(secret_key_id.as_bytes());
    hasher.update(secret_id.as_bytes());
    hasher.update(target.as_bytes());
    hasher.update(group.as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = compute_checksum("s3cr3t", "k1", "id1", "web", "g1");
        let b = compute_checksum("s3cr3t", "k1", "id1", "web", "g1");
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_length_printable() {
        // base64 of a 32-byte digest is always 44 chars.
        let cs = compute_checksum("s", "k", "i", "t", "g");
        assert_eq!(cs.len(), 44);
        assert!(cs.is_ascii());
    }

    #[test]
    fn every_field_participates() {
        let base = compute_checksum("s", "k", "i", "t", "g");
        assert_ne!(base, compute_checksum("x", "k", "i", "t", "g"));
        assert_ne!(base, compute_checksum("s", "x", "i", "t", "g"));
        assert_ne!(base, compute_checksum("s", "k", "x", "t", "g"));
        assert_ne!(base, compute_checksum("s", "k", "i", "x", "g"));
        assert_ne!(base, compute_checksum("s", "k", "i", "t", "x"));
    }

    #[test]
    fn field_order_is_fixed() {
        // Swapping two field values must change the digest.
        let a = compute_checksum("s3cr3t", "k1", "id1", "web", "g1");
        let b = compute_checksum("k1", "s3cr3t", "id1", "web", "g1");
        assert_ne!(a, b);
    }
}
