//! Argon2 password hashing shared by the store adapters.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

/// Hash a password into a PHC string (`$argon2id$...`).
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &SecretString) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &SecretString, phc: &str) -> bool {
    PasswordHash::new(phc).is_ok_and(|hash| {
        Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &hash)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() -> Result<()> {
        let password = SecretString::from("correct horse");
        let phc = hash_password(&password)?;
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_password(&password, &phc));
        assert!(!verify_password(&SecretString::from("wrong horse"), &phc));
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let password = SecretString::from("same");
        assert_ne!(hash_password(&password)?, hash_password(&password)?);
        Ok(())
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password(&SecretString::from("x"), "not-a-phc-string"));
        assert!(!verify_password(&SecretString::from("x"), ""));
    }
}
