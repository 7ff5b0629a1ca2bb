//! Error types for the identity engine.

use super::key::KeyKind;
use super::store::StoreError;

/// Raised while building a `UserService`; never at request time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("account key type `{0}` is not supported; supply a subject parser")]
    UnsupportedKeyType(&'static str),
    #[error("account key type cannot hold values of its declared kind {0:?}")]
    KeyKindMismatch(KeyKind),
}

/// Failures surfaced by `UserService` operations.
///
/// Invalid credentials and unknown users during authentication are not
/// errors: those return `Ok(None)` so callers cannot probe for accounts.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Profile lookups for a subject with no account.
    #[error("invalid subject identifier: {0}")]
    NotFound(String),
    /// A hook or store broke an engine invariant. Programming error.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}
