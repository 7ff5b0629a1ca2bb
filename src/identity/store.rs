//! Boundary with the account store.
//!
//! The store owns persistence and per-attribute atomicity. The engine only
//! reads capability flags, looks accounts up, and requests mutations; a
//! refused mutation comes back as a [`Rejection`], a broken backend as a
//! [`StoreError`].

use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use uuid::Uuid;

use super::claims::Claim;
use super::key::AccountKey;

/// One reason a store refused a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError {
    pub code: String,
    pub description: String,
}

impl IdentityError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// A refused mutation. Always carries at least one error, in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    first: IdentityError,
    rest: Vec<IdentityError>,
}

impl Rejection {
    #[must_use]
    pub fn new(error: IdentityError) -> Self {
        Self {
            first: error,
            rest: Vec::new(),
        }
    }

    /// `None` when `errors` is empty.
    #[must_use]
    pub fn from_errors(errors: Vec<IdentityError>) -> Option<Self> {
        let mut errors = errors.into_iter();
        let first = errors.next()?;
        Some(Self {
            first,
            rest: errors.collect(),
        })
    }

    #[must_use]
    pub fn first(&self) -> &IdentityError {
        &self.first
    }

    pub fn errors(&self) -> impl Iterator<Item = &IdentityError> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)
    }
}

/// The store could not be reached or failed internally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outer error: backend failure. Inner error: the store refused the change.
pub type Mutation<T = ()> = StoreResult<Result<T, Rejection>>;

/// Attribute kinds a store supports. The engine checks these before touching
/// the corresponding attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StoreCapabilities {
    pub email: bool,
    pub phone: bool,
    pub claims: bool,
    pub roles: bool,
    pub password: bool,
    pub lockout: bool,
}

impl StoreCapabilities {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            email: true,
            phone: true,
            claims: true,
            roles: true,
            password: true,
            lockout: true,
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self {
            email: false,
            phone: false,
            claims: false,
            roles: false,
            password: false,
            lockout: false,
        }
    }

    #[must_use]
    pub const fn with_email(mut self, enabled: bool) -> Self {
        self.email = enabled;
        self
    }

    #[must_use]
    pub const fn with_phone(mut self, enabled: bool) -> Self {
        self.phone = enabled;
        self
    }

    #[must_use]
    pub const fn with_claims(mut self, enabled: bool) -> Self {
        self.claims = enabled;
        self
    }

    #[must_use]
    pub const fn with_roles(mut self, enabled: bool) -> Self {
        self.roles = enabled;
        self
    }

    #[must_use]
    pub const fn with_password(mut self, enabled: bool) -> Self {
        self.password = enabled;
        self
    }

    #[must_use]
    pub const fn with_lockout(mut self, enabled: bool) -> Self {
        self.lockout = enabled;
        self
    }
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// External provider login linked to an account.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoginInfo {
    pub provider: String,
    pub provider_key: String,
}

impl LoginInfo {
    pub fn new(provider: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_key: provider_key.into(),
        }
    }
}

/// Snapshot of the scalar attributes of a stored account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account<K> {
    pub id: K,
    pub username: String,
    pub email: Option<String>,
    pub email_confirmed: bool,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
}

/// Account about to be created. The store assigns the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
}

impl NewAccount {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// Opaque random username, used when an external sign-in creates the
    /// account and nothing else is known yet.
    #[must_use]
    pub fn with_random_username() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    type Key: AccountKey;

    fn capabilities(&self) -> StoreCapabilities;

    async fn find_by_id(&self, id: &Self::Key) -> StoreResult<Option<Account<Self::Key>>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account<Self::Key>>>;

    async fn find_by_login(&self, login: &LoginInfo) -> StoreResult<Option<Account<Self::Key>>>;

    async fn create(&self, account: NewAccount) -> Mutation<Account<Self::Key>>;

    /// Must reject when the login is already linked to any account.
    async fn add_login(&self, id: &Self::Key, login: LoginInfo) -> Mutation;

    /// Sets the email and clears its confirmation.
    async fn set_email(&self, id: &Self::Key, email: &str) -> Mutation;

    async fn generate_email_confirmation_token(&self, id: &Self::Key) -> StoreResult<String>;

    async fn confirm_email(&self, id: &Self::Key, token: &str) -> Mutation;

    /// Sets the phone number and clears its confirmation.
    async fn set_phone_number(&self, id: &Self::Key, phone_number: &str) -> Mutation;

    async fn generate_change_phone_number_token(
        &self,
        id: &Self::Key,
        phone_number: &str,
    ) -> StoreResult<String>;

    /// Redeems a change-number token, storing the number as confirmed.
    async fn change_phone_number(&self, id: &Self::Key, phone_number: &str, token: &str)
    -> Mutation;

    async fn claims(&self, id: &Self::Key) -> StoreResult<Vec<Claim>>;

    async fn add_claim(&self, id: &Self::Key, claim: Claim) -> Mutation;

    async fn roles(&self, id: &Self::Key) -> StoreResult<Vec<String>>;

    async fn check_password(
        &self,
        account: &Account<Self::Key>,
        password: &SecretString,
    ) -> StoreResult<bool>;

    async fn is_locked_out(&self, id: &Self::Key) -> StoreResult<bool>;

    /// Records a failed attempt. Applying the lockout threshold is the
    /// store's job.
    async fn access_failed(&self, id: &Self::Key) -> Mutation;

    async fn reset_access_failed_count(&self, id: &Self::Key) -> Mutation;
}
