//! Credential digests.
//!
//! Plaintext secrets never cross the wire and never touch storage. A
//! password is digested once on the client and compared digest-to-digest
//! on the server; the same scheme covers invite words. The digest is
//! deterministic, one-way, and collision-resistant (SHA-256).

use sha2::{Digest as _, Sha256};

/// Length in characters of a hex-encoded digest.
pub const DIGEST_LEN: usize = 64;

/// Digests a secret into a fixed-length lowercase hex string.
///
/// Used for password-at-rest, password-over-wire, invite-word-at-rest,
/// and invite-word-over-wire. Equality is a plain string compare; timing
/// side-channels are out of scope for this protocol.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Returns `true` if `s` has the exact shape of a [`digest`] output.
///
/// The handshake uses this to recognize a bare invite-digest control
/// frame without ambiguity: a digest contains no commas and is exactly
/// [`DIGEST_LEN`] hex characters.
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_LEN
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(digest("hunter2"), digest("hunter2"));
    }

    #[test]
    fn test_digest_matches_known_sha256_vector() {
        // SHA-256("abc"), a standard test vector.
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_fixed_length_lowercase_hex() {
        let d = digest("пароль with unicode ✓");
        assert_eq!(d.len(), DIGEST_LEN);
        assert!(is_digest(&d));
    }

    #[test]
    fn test_distinct_secrets_produce_distinct_digests() {
        assert_ne!(digest("pw1"), digest("pw2"));
    }

    #[test]
    fn test_is_digest_rejects_wrong_shapes() {
        assert!(!is_digest(""));
        assert!(!is_digest("abc"));
        // Right length, uppercase hex — not our canonical form.
        assert!(!is_digest(&digest("x").to_uppercase()));
        // Right length, non-hex characters.
        assert!(!is_digest(&"z".repeat(DIGEST_LEN)));
    }
}
