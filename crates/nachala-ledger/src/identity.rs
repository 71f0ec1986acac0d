//! Heir identity verification hashes
//!
//! Content-addressed verification: an heir's claim secret is never stored,
//! only an iterated salted SHA-256 digest of it. Claiming recomputes the
//! digest and compares. The salt is per-user, so equal secrets under
//! different owners produce unrelated hashes.

use sha2::{Digest, Sha256};

/// Iterations of the digest chain
const HASH_ITERATIONS: u32 = 10_000;

/// Domain separator, versioned so the scheme can rotate
const DOMAIN_TAG: &[u8] = b"nachala-heir-verification-v1";

/// Derive the stored verification hash from a claim secret and the owner's
/// salt. Returns a lowercase hex digest.
pub fn derive_verification_hash(secret: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(DOMAIN_TAG)
        .chain_update(salt.as_bytes())
        .chain_update(secret.as_bytes())
        .finalize();
    for _ in 1..HASH_ITERATIONS {
        digest = Sha256::new()
            .chain_update(DOMAIN_TAG)
            .chain_update(digest)
            .finalize();
    }
    hex::encode(digest)
}

/// Check a presented secret against a stored verification hash
pub fn verify_secret(secret: &str, salt: &str, expected_hash: &str) -> bool {
    derive_verification_hash(secret, salt) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(
            derive_verification_hash("family-motto", "user-1"),
            derive_verification_hash("family-motto", "user-1")
        );
    }

    #[test]
    fn salt_separates_users() {
        assert_ne!(
            derive_verification_hash("family-motto", "user-1"),
            derive_verification_hash("family-motto", "user-2")
        );
    }

    #[test]
    fn verify_accepts_correct_secret_only() {
        let hash = derive_verification_hash("family-motto", "user-1");
        assert!(verify_secret("family-motto", "user-1", &hash));
        assert!(!verify_secret("wrong-guess", "user-1", &hash));
        assert!(!verify_secret("family-motto", "user-2", &hash));
    }

    #[test]
    fn hash_is_hex_sha256_sized() {
        let hash = derive_verification_hash("s", "u");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
