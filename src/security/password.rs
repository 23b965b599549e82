use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;

use crate::error::{AppError, AppResult};

/// Hash a secret with a fresh random salt. Two calls for the same input
/// produce different digests; both verify.
pub fn hash(plaintext: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let digest = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(digest)
}

/// Check a candidate against a stored digest. Mismatch and malformed digests
/// both come back as `false`, never as an error.
pub fn verify(plaintext: &str, digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let digest = hash("iloveecomm").unwrap();
        assert!(verify("iloveecomm", &digest));
        assert!(!verify("wrong password", &digest));
    }

    #[test]
    fn hashing_twice_salts_differently() {
        let first = hash("same input").unwrap();
        let second = hash("same input").unwrap();
        assert_ne!(first, second);
        assert!(verify("same input", &first));
        assert!(verify("same input", &second));
    }

    #[test]
    fn digest_does_not_contain_plaintext() {
        let digest = hash("hunter2hunter2").unwrap();
        assert!(!digest.contains("hunter2"));
    }

    #[test]
    fn malformed_digest_is_false_not_an_error() {
        assert!(!verify("anything", "not-a-phc-string"));
        assert!(!verify("anything", ""));
    }
}
