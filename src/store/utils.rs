//! Small helpers shared by the store adapters.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;

use crate::identity::IdentityError;

/// Basic email format check.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Random single-use token for email/phone confirmation.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate confirmation token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

pub(crate) fn duplicate_username(username: &str) -> IdentityError {
    IdentityError::new(
        "DuplicateUserName",
        format!("Name {username} is already taken."),
    )
}

pub(crate) fn key_space_exhausted() -> IdentityError {
    IdentityError::new(
        "KeySpaceExhausted",
        "No account identifiers are left for new accounts.",
    )
}

pub(crate) fn duplicate_email(email: &str) -> IdentityError {
    IdentityError::new("DuplicateEmail", format!("Email '{email}' is already taken."))
}

pub(crate) fn invalid_email(email: &str) -> IdentityError {
    IdentityError::new("InvalidEmail", format!("Email '{email}' is invalid."))
}

pub(crate) fn duplicate_phone(phone_number: &str) -> IdentityError {
    IdentityError::new(
        "DuplicatePhoneNumber",
        format!("Phone number '{phone_number}' is already taken."),
    )
}

pub(crate) fn invalid_phone(phone_number: &str) -> IdentityError {
    IdentityError::new(
        "InvalidPhoneNumber",
        format!("Phone number '{phone_number}' is invalid."),
    )
}

pub(crate) fn login_already_associated() -> IdentityError {
    IdentityError::new(
        "LoginAlreadyAssociated",
        "A user with this login already exists.",
    )
}

pub(crate) fn invalid_token() -> IdentityError {
    IdentityError::new("InvalidToken", "Invalid token.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_malformed() {
        assert!(!valid_email("no-at-sign"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("a b@example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn tokens_are_url_safe_and_unique() -> Result<()> {
        let first = generate_token()?;
        let second = generate_token()?;
        assert_eq!(first.len(), 43);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(first, second);
        Ok(())
    }
}
