//! Password hashing.
//!
//! The user repository receives a [`PasswordHasher`] at construction instead of
//! reaching for a global. Hashing is CPU-bound, so implementations are
//! synchronous and callers run them on a blocking worker.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{Error, Result};

/// Turns plain-text passwords into storable credentials and checks them.
pub trait PasswordHasher: Send + Sync {
    /// Hash a password into a self-describing credential string.
    fn hash(&self, password: &str) -> Result<String>;

    /// Check a password against a credential produced by [`hash`](Self::hash).
    fn verify(&self, password: &str, credential: &str) -> Result<bool>;
}

/// Argon2id hasher producing PHC-format strings.
#[derive(Default, Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::Credential(e.to_string()))
    }

    fn verify(&self, password: &str, credential: &str) -> Result<bool> {
        let parsed = PasswordHash::new(credential).map_err(|e| Error::Credential(e.to_string()))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Credential(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let credential = hasher.hash("correct horse").unwrap();

        assert!(credential.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &credential).unwrap());
        assert!(!hasher.verify("battery staple", &credential).unwrap());
    }

    #[test]
    fn test_argon2_salts_differ() {
        let hasher = Argon2Hasher::new();
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_credential() {
        let hasher = Argon2Hasher::new();
        let err = hasher.verify("pw", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }
}
