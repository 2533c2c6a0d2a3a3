//! # Cryptographic Utilities
//!
//! Password hashing and storage secret generation.
//!
//! Passwords are only ever stored as Argon2id hashes. Secret comparison is
//! constant-time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;

use super::errors::{AuthError, AuthResult};

/// Raw bytes of entropy in a generated storage secret key
pub const SECRET_KEY_BYTES: usize = 32;

/// Hash a password using Argon2id with a fresh salt
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::HashingFailed)
}

/// Verify a password against its hash
///
/// An unparsable hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Generate a storage secret key from `len` random bytes (URL-safe, unpadded)
pub fn generate_secret_key(len: usize) -> String {
    let mut bytes = vec![0u8; len.max(SECRET_KEY_BYTES)];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison of two strings
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert_ne!(hash, "hunter2hunter2");
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_secret_key_shape() {
        let key = generate_secret_key(SECRET_KEY_BYTES);
        // 32 bytes -> 43 unpadded base64 chars
        assert_eq!(key.len(), 43);
        assert!(!key.contains('='));
        assert!(!key.contains('+'));
        assert!(!key.contains('/'));
        assert_ne!(key, generate_secret_key(SECRET_KEY_BYTES));
    }

    #[test]
    fn test_secret_key_has_minimum_entropy() {
        assert_eq!(generate_secret_key(4).len(), 43);
        assert_eq!(generate_secret_key(48).len(), 64);
    }

    #[test]
    fn test_constant_time_comparison() {
        assert!(constant_time_str_eq("secret", "secret"));
        assert!(!constant_time_str_eq("secret", "secreT"));
        assert!(!constant_time_str_eq("secret", "secret!"));
    }
}
