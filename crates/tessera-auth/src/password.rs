//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use tessera_core::error::TesseraResult;
use tessera_core::repository::CredentialVerifier;

use crate::error::AuthError;

/// Hash a plaintext password into an Argon2id PHC string.
///
/// If `pepper` is provided it is prepended to the password before
/// hashing. The same pepper must be supplied to [`verify_password`].
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let input = peppered(password, pepper);
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let input = peppered(password, pepper);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

fn peppered(password: &str, pepper: Option<&str>) -> String {
    match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_owned(),
    }
}

/// [`CredentialVerifier`] backed by Argon2id with an optional pepper.
#[derive(Debug, Clone, Default)]
pub struct Argon2Verifier {
    pepper: Option<String>,
}

impl Argon2Verifier {
    pub fn new(pepper: Option<String>) -> Self {
        Self { pepper }
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, password: &str) -> TesseraResult<String> {
        Ok(hash_password(password, self.pepper.as_deref())?)
    }

    fn verify(&self, password: &str, digest: &str) -> TesseraResult<bool> {
        Ok(verify_password(password, digest, self.pepper.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("hunter2", Some("pepper!")).unwrap();
        assert!(verify_password("hunter2", &hash, Some("pepper!")).unwrap());
        // Without pepper should fail.
        assert!(!verify_password("hunter2", &hash, None).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        let result = verify_password("pw", "not-a-hash", None);
        assert!(result.is_err());
    }

    #[test]
    fn verifier_uses_its_pepper() {
        let verifier = Argon2Verifier::new(Some("pepper!".into()));
        let digest = verifier.hash("hunter2").unwrap();
        assert!(verifier.verify("hunter2", &digest).unwrap());
        assert!(!Argon2Verifier::default().verify("hunter2", &digest).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("hunter2", None).unwrap();
        let b = hash_password("hunter2", None).unwrap();
        assert_ne!(a, b);
    }
}
