use crate::errors::{AppError, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

pub struct PasswordManager;

impl PasswordManager {
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::EncryptionError(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::EncryptionError(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

/// Hex SHA-256 of a session token; only the digest is persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Credential comparison whose timing depends on neither the contents nor
/// the lengths of its inputs. Both sides are reduced to SHA-256 digests and
/// the fixed-size digests are compared without early exit.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (Sha256::digest(a.as_bytes()), Sha256::digest(b.as_bytes()));
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = PasswordManager::hash_password("Sup3r$ecret").unwrap();
        assert!(PasswordManager::verify_password("Sup3r$ecret", &hash).unwrap());
        assert!(!PasswordManager::verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(PasswordManager::verify_password("x", "plainly-not-a-hash").is_err());
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let digest = hash_token("abc");
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq("admin@tradevault.ng", "admin@tradevault.ng"));
        assert!(!constant_time_eq("admin", "admiN"));
        assert!(!constant_time_eq("admin", "admin2"));
        assert!(!constant_time_eq("", "bootstrap-pass-1"));
        assert!(constant_time_eq("", ""));
    }
}
