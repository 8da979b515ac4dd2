//! One-way client secret hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use crate::errors::CredentialError;

/// Hashes client secrets at load time and checks presented secrets against
/// the stored hash.
///
/// `verify` must compare in constant time; implementations return `false`
/// for malformed hashes instead of failing.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError>;

    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Argon2id verifier producing PHC-formatted hash strings.
///
/// Verification reads the parameters embedded in the stored hash and compares
/// digests in constant time.
#[derive(Clone)]
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Argon2Verifier {
    /// Argon2id with the crate's recommended default cost parameters
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Argon2id with explicit cost parameters
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::HashingFailed(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed_hash) => parsed_hash,
            Err(e) => {
                tracing::error!(error = %e, "stored client secret hash is malformed");
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_verifier() -> Argon2Verifier {
        Argon2Verifier::with_params(Params::new(1024, 1, 1, None).unwrap())
    }

    #[test]
    fn test_hash_then_verify() {
        let verifier = test_verifier();
        let hash = verifier.hash("s3cr3t").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("s3cr3t"));
        assert!(verifier.verify("s3cr3t", &hash));
    }

    #[test]
    fn test_wrong_plaintext_is_rejected() {
        let verifier = test_verifier();
        let hash = verifier.hash("s3cr3t").unwrap();

        assert!(!verifier.verify("wrong", &hash));
        assert!(!verifier.verify("", &hash));
        assert!(!verifier.verify("s3cr3t ", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let verifier = test_verifier();
        let first = verifier.hash("s3cr3t").unwrap();
        let second = verifier.hash("s3cr3t").unwrap();

        assert_ne!(first, second);
        assert!(verifier.verify("s3cr3t", &first));
        assert!(verifier.verify("s3cr3t", &second));
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        let verifier = test_verifier();
        assert!(!verifier.verify("s3cr3t", "s3cr3t"));
        assert!(!verifier.verify("s3cr3t", ""));
    }

    #[test]
    fn test_verification_uses_parameters_from_hash() {
        let cheap = test_verifier();
        let hash = cheap.hash("s3cr3t").unwrap();

        let other = Argon2Verifier::with_params(Params::new(2048, 2, 1, None).unwrap());
        assert!(other.verify("s3cr3t", &hash));
    }
}
