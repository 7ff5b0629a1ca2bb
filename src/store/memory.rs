//! In-process account store.
//!
//! Enforces the same constraints a database-backed store would: unique
//! usernames, unique external logins, unique emails and phone numbers,
//! single-use confirmation tokens, and the configured lockout policy.
//! Each operation takes the lock once, so every mutation is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::lockout::LockoutPolicy;
use super::password::{hash_password, verify_password};
use super::utils::{
    duplicate_email, duplicate_phone, duplicate_username, generate_token, invalid_email,
    invalid_phone, invalid_token, key_space_exhausted, login_already_associated, valid_email,
};
use crate::identity::{
    Account, AccountKey, AccountStore, Claim, IdentityError, LoginInfo, Mutation, NewAccount,
    Rejection, StoreCapabilities, StoreError, StoreResult,
};

/// Keys the in-memory store can mint for new accounts.
pub trait GeneratedKey: AccountKey {
    /// `sequence` starts at 1 and grows by one per created account.
    /// `None` once the key type cannot represent `sequence`.
    fn generate(sequence: u64) -> Option<Self>;
}

impl GeneratedKey for String {
    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::new_v4().to_string())
    }
}

impl GeneratedKey for i32 {
    fn generate(sequence: u64) -> Option<Self> {
        Self::try_from(sequence).ok()
    }
}

impl GeneratedKey for u32 {
    fn generate(sequence: u64) -> Option<Self> {
        Self::try_from(sequence).ok()
    }
}

impl GeneratedKey for i64 {
    fn generate(sequence: u64) -> Option<Self> {
        Self::try_from(sequence).ok()
    }
}

impl GeneratedKey for Uuid {
    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::new_v4())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TokenPurpose {
    ConfirmEmail,
    ChangePhoneNumber(String),
}

#[derive(Debug)]
struct StoredAccount<K> {
    account: Account<K>,
    password_hash: Option<String>,
    claims: Vec<Claim>,
    roles: Vec<String>,
    logins: Vec<LoginInfo>,
    access_failed_count: u32,
    lockout_end: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner<K> {
    accounts: HashMap<K, StoredAccount<K>>,
    usernames: HashMap<String, K>,
    logins: HashMap<LoginInfo, K>,
    tokens: HashMap<(K, TokenPurpose), String>,
    sequence: u64,
}

impl<K: AccountKey> Inner<K> {
    fn account(&self, id: &K) -> StoreResult<&StoredAccount<K>> {
        self.accounts
            .get(id)
            .ok_or_else(|| StoreError::UnknownAccount(id.to_string()))
    }

    fn account_mut(&mut self, id: &K) -> StoreResult<&mut StoredAccount<K>> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownAccount(id.to_string()))
    }

    fn email_taken(&self, id: &K, email: &str) -> bool {
        self.accounts.values().any(|stored| {
            stored.account.id != *id
                && stored
                    .account
                    .email
                    .as_deref()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
        })
    }

    fn phone_taken(&self, id: &K, phone_number: &str) -> bool {
        self.accounts.values().any(|stored| {
            stored.account.id != *id
                && stored.account.phone_number.as_deref() == Some(phone_number)
        })
    }

    fn redeem(&mut self, id: &K, purpose: TokenPurpose, token: &str) -> bool {
        let key = (id.clone(), purpose);
        if self.tokens.get(&key).is_some_and(|stored| stored == token) {
            self.tokens.remove(&key);
            true
        } else {
            false
        }
    }
}

pub struct MemoryAccountStore<K: GeneratedKey> {
    inner: Mutex<Inner<K>>,
    capabilities: StoreCapabilities,
    lockout: LockoutPolicy,
    claim_limit: Option<usize>,
}

impl<K: GeneratedKey> MemoryAccountStore<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                accounts: HashMap::new(),
                usernames: HashMap::new(),
                logins: HashMap::new(),
                tokens: HashMap::new(),
                sequence: 0,
            }),
            capabilities: StoreCapabilities::all(),
            lockout: LockoutPolicy::default(),
            claim_limit: None,
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: StoreCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_lockout_policy(mut self, policy: LockoutPolicy) -> Self {
        self.lockout = policy;
        self
    }

    /// Refuse `add_claim` once an account holds `limit` claims.
    #[must_use]
    pub fn with_claim_limit(mut self, limit: usize) -> Self {
        self.claim_limit = Some(limit);
        self
    }

    /// Create a local account with a password.
    ///
    /// # Errors
    /// Returns a store error if hashing fails.
    pub async fn create_with_password(
        &self,
        account: NewAccount,
        password: &SecretString,
    ) -> Mutation<Account<K>> {
        let password_hash = hash_password(password)?;
        let mut inner = self.inner.lock().await;
        Ok(Self::insert(&mut inner, account, Some(password_hash)))
    }

    fn insert(
        inner: &mut Inner<K>,
        account: NewAccount,
        password_hash: Option<String>,
    ) -> Result<Account<K>, Rejection> {
        if inner.usernames.contains_key(&account.username) {
            return Err(Rejection::new(duplicate_username(&account.username)));
        }

        let Some(id) = K::generate(inner.sequence + 1) else {
            return Err(Rejection::new(key_space_exhausted()));
        };
        inner.sequence += 1;
        let account = Account {
            id: id.clone(),
            username: account.username,
            email: None,
            email_confirmed: false,
            phone_number: None,
            phone_number_confirmed: false,
        };

        inner.usernames.insert(account.username.clone(), id.clone());
        inner.accounts.insert(
            id,
            StoredAccount {
                account: account.clone(),
                password_hash,
                claims: Vec::new(),
                roles: Vec::new(),
                logins: Vec::new(),
                access_failed_count: 0,
                lockout_end: None,
            },
        );

        Ok(account)
    }

    /// # Errors
    /// Returns `StoreError::UnknownAccount` for unknown ids.
    pub async fn add_to_role(&self, id: &K, role: &str) -> Mutation {
        let mut inner = self.inner.lock().await;
        let stored = inner.account_mut(id)?;
        if stored.roles.iter().any(|existing| existing == role) {
            return Ok(Err(Rejection::new(IdentityError::new(
                "UserAlreadyInRole",
                format!("User already in role '{role}'."),
            ))));
        }
        stored.roles.push(role.to_string());
        Ok(Ok(()))
    }

    /// # Errors
    /// Returns `StoreError::UnknownAccount` for unknown ids.
    pub async fn access_failed_count(&self, id: &K) -> StoreResult<u32> {
        let inner = self.inner.lock().await;
        Ok(inner.account(id)?.access_failed_count)
    }

    /// # Errors
    /// Returns `StoreError::UnknownAccount` for unknown ids.
    pub async fn logins(&self, id: &K) -> StoreResult<Vec<LoginInfo>> {
        let inner = self.inner.lock().await;
        Ok(inner.account(id)?.logins.clone())
    }

    pub async fn account_count(&self) -> usize {
        self.inner.lock().await.accounts.len()
    }
}

impl<K: GeneratedKey> Default for MemoryAccountStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: GeneratedKey> AccountStore for MemoryAccountStore<K> {
    type Key = K;

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    async fn find_by_id(&self, id: &K) -> StoreResult<Option<Account<K>>> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(id).map(|stored| stored.account.clone()))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account<K>>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.accounts.get(id))
            .map(|stored| stored.account.clone()))
    }

    async fn find_by_login(&self, login: &LoginInfo) -> StoreResult<Option<Account<K>>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .logins
            .get(login)
            .and_then(|id| inner.accounts.get(id))
            .map(|stored| stored.account.clone()))
    }

    async fn create(&self, account: NewAccount) -> Mutation<Account<K>> {
        let mut inner = self.inner.lock().await;
        Ok(Self::insert(&mut inner, account, None))
    }

    async fn add_login(&self, id: &K, login: LoginInfo) -> Mutation {
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        if inner.logins.contains_key(&login) {
            return Ok(Err(Rejection::new(login_already_associated())));
        }
        inner.logins.insert(login.clone(), id.clone());
        inner.account_mut(id)?.logins.push(login);
        Ok(Ok(()))
    }

    async fn set_email(&self, id: &K, email: &str) -> Mutation {
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        if !valid_email(email) {
            return Ok(Err(Rejection::new(invalid_email(email))));
        }
        if inner.email_taken(id, email) {
            return Ok(Err(Rejection::new(duplicate_email(email))));
        }
        let stored = inner.account_mut(id)?;
        stored.account.email = Some(email.to_string());
        stored.account.email_confirmed = false;
        Ok(Ok(()))
    }

    async fn generate_email_confirmation_token(&self, id: &K) -> StoreResult<String> {
        let token = generate_token()?;
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        inner
            .tokens
            .insert((id.clone(), TokenPurpose::ConfirmEmail), token.clone());
        Ok(token)
    }

    async fn confirm_email(&self, id: &K, token: &str) -> Mutation {
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        if !inner.redeem(id, TokenPurpose::ConfirmEmail, token) {
            return Ok(Err(Rejection::new(invalid_token())));
        }
        inner.account_mut(id)?.account.email_confirmed = true;
        Ok(Ok(()))
    }

    async fn set_phone_number(&self, id: &K, phone_number: &str) -> Mutation {
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        if phone_number.trim().is_empty() {
            return Ok(Err(Rejection::new(invalid_phone(phone_number))));
        }
        if inner.phone_taken(id, phone_number) {
            return Ok(Err(Rejection::new(duplicate_phone(phone_number))));
        }
        let stored = inner.account_mut(id)?;
        stored.account.phone_number = Some(phone_number.to_string());
        stored.account.phone_number_confirmed = false;
        Ok(Ok(()))
    }

    async fn generate_change_phone_number_token(
        &self,
        id: &K,
        phone_number: &str,
    ) -> StoreResult<String> {
        let token = generate_token()?;
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        inner.tokens.insert(
            (
                id.clone(),
                TokenPurpose::ChangePhoneNumber(phone_number.to_string()),
            ),
            token.clone(),
        );
        Ok(token)
    }

    async fn change_phone_number(&self, id: &K, phone_number: &str, token: &str) -> Mutation {
        let mut inner = self.inner.lock().await;
        inner.account(id)?;
        let purpose = TokenPurpose::ChangePhoneNumber(phone_number.to_string());
        if !inner.redeem(id, purpose, token) {
            return Ok(Err(Rejection::new(invalid_token())));
        }
        if inner.phone_taken(id, phone_number) {
            return Ok(Err(Rejection::new(duplicate_phone(phone_number))));
        }
        let stored = inner.account_mut(id)?;
        stored.account.phone_number = Some(phone_number.to_string());
        stored.account.phone_number_confirmed = true;
        Ok(Ok(()))
    }

    async fn claims(&self, id: &K) -> StoreResult<Vec<Claim>> {
        let inner = self.inner.lock().await;
        Ok(inner.account(id)?.claims.clone())
    }

    async fn add_claim(&self, id: &K, claim: Claim) -> Mutation {
        let mut inner = self.inner.lock().await;
        let stored = inner.account_mut(id)?;
        if let Some(limit) = self.claim_limit {
            if stored.claims.len() >= limit {
                return Ok(Err(Rejection::new(IdentityError::new(
                    "ClaimLimitExceeded",
                    format!("Account cannot hold more than {limit} claims."),
                ))));
            }
        }
        stored.claims.push(claim);
        Ok(Ok(()))
    }

    async fn roles(&self, id: &K) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.account(id)?.roles.clone())
    }

    async fn check_password(
        &self,
        account: &Account<K>,
        password: &SecretString,
    ) -> StoreResult<bool> {
        let password_hash = {
            let inner = self.inner.lock().await;
            inner.account(&account.id)?.password_hash.clone()
        };
        Ok(password_hash.is_some_and(|phc| verify_password(password, &phc)))
    }

    async fn is_locked_out(&self, id: &K) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .account(id)?
            .lockout_end
            .is_some_and(|end| Utc::now() < end))
    }

    async fn access_failed(&self, id: &K) -> Mutation {
        let mut inner = self.inner.lock().await;
        let stored = inner.account_mut(id)?;
        stored.access_failed_count += 1;
        if self.lockout.should_lock(stored.access_failed_count) {
            stored.lockout_end = Some(self.lockout.lockout_end(Utc::now()));
            stored.access_failed_count = 0;
            debug!(account = %id, "account locked out");
        }
        Ok(Ok(()))
    }

    async fn reset_access_failed_count(&self, id: &K) -> Mutation {
        let mut inner = self.inner.lock().await;
        inner.account_mut(id)?.access_failed_count = 0;
        Ok(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use std::time::Duration;

    async fn seeded() -> Result<(MemoryAccountStore<i32>, Account<i32>)> {
        let store = MemoryAccountStore::<i32>::new();
        let account = store
            .create_with_password(NewAccount::new("alice"), &SecretString::from("secret"))
            .await?
            .map_err(|rejection| anyhow!("create rejected: {rejection}"))?;
        Ok((store, account))
    }

    #[tokio::test]
    async fn integer_keys_are_sequential() -> Result<()> {
        let store = MemoryAccountStore::<i64>::new();
        let first = store.create(NewAccount::new("a")).await?;
        let second = store.create(NewAccount::new("b")).await?;
        assert_eq!(first.map(|a| a.id), Ok(1));
        assert_eq!(second.map(|a| a.id), Ok(2));
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_key_space_refuses_new_accounts() -> Result<()> {
        let store = MemoryAccountStore::<i32>::new();
        store.create(NewAccount::new("a")).await?;
        store.inner.lock().await.sequence = u64::try_from(i32::MAX)? - 1;
        let max = store.create(NewAccount::new("b")).await?;
        assert_eq!(max.map(|a| a.id), Ok(i32::MAX));

        let err = store
            .create(NewAccount::new("c"))
            .await?
            .err()
            .ok_or_else(|| anyhow!("expected key space rejection"))?;
        assert_eq!(err.first().code, "KeySpaceExhausted");
        assert_eq!(store.account_count().await, 2);
        assert!(store.find_by_username("c").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn usernames_are_unique() -> Result<()> {
        let (store, _) = seeded().await?;
        let err = store
            .create(NewAccount::new("alice"))
            .await?
            .err()
            .ok_or_else(|| anyhow!("expected duplicate username rejection"))?;
        assert_eq!(err.first().code, "DuplicateUserName");
        Ok(())
    }

    #[tokio::test]
    async fn logins_are_unique_across_accounts() -> Result<()> {
        let (store, alice) = seeded().await?;
        let bob = store
            .create(NewAccount::new("bob"))
            .await?
            .map_err(|rejection| anyhow!("{rejection}"))?;
        let login = LoginInfo::new("Google", "g123");

        assert!(store.add_login(&alice.id, login.clone()).await?.is_ok());
        let err = store
            .add_login(&bob.id, login.clone())
            .await?
            .err()
            .ok_or_else(|| anyhow!("expected login rejection"))?;
        assert_eq!(err.first().code, "LoginAlreadyAssociated");

        let found = store.find_by_login(&login).await?;
        assert_eq!(found.map(|a| a.id), Some(alice.id));
        assert_eq!(store.logins(&alice.id).await?, vec![login]);
        Ok(())
    }

    #[tokio::test]
    async fn set_email_validates_and_enforces_uniqueness() -> Result<()> {
        let (store, alice) = seeded().await?;
        let bob = store
            .create(NewAccount::new("bob"))
            .await?
            .map_err(|rejection| anyhow!("{rejection}"))?;

        let invalid = store.set_email(&alice.id, "not-an-email").await?;
        assert_eq!(
            invalid.err().map(|r| r.first().code.clone()),
            Some("InvalidEmail".to_string())
        );

        assert!(store.set_email(&alice.id, "a@x.com").await?.is_ok());
        let duplicate = store.set_email(&bob.id, "A@X.com").await?;
        assert_eq!(
            duplicate.err().map(|r| r.first().code.clone()),
            Some("DuplicateEmail".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn email_tokens_are_single_use() -> Result<()> {
        let (store, alice) = seeded().await?;
        assert!(store.set_email(&alice.id, "a@x.com").await?.is_ok());

        assert!(store.confirm_email(&alice.id, "forged").await?.is_err());

        let token = store.generate_email_confirmation_token(&alice.id).await?;
        assert!(store.confirm_email(&alice.id, &token).await?.is_ok());
        assert!(store.confirm_email(&alice.id, &token).await?.is_err());

        let account = store.find_by_id(&alice.id).await?;
        assert_eq!(account.map(|a| a.email_confirmed), Some(true));
        Ok(())
    }

    #[tokio::test]
    async fn phone_tokens_are_bound_to_the_number() -> Result<()> {
        let (store, alice) = seeded().await?;
        assert!(store.set_phone_number(&alice.id, "+15550100").await?.is_ok());

        let token = store
            .generate_change_phone_number_token(&alice.id, "+15550100")
            .await?;
        assert!(
            store
                .change_phone_number(&alice.id, "+15550199", &token)
                .await?
                .is_err()
        );
        assert!(
            store
                .change_phone_number(&alice.id, "+15550100", &token)
                .await?
                .is_ok()
        );

        let account = store.find_by_id(&alice.id).await?;
        assert_eq!(account.map(|a| a.phone_number_confirmed), Some(true));
        Ok(())
    }

    #[tokio::test]
    async fn access_failed_locks_at_threshold() -> Result<()> {
        let store = MemoryAccountStore::<i32>::new()
            .with_lockout_policy(LockoutPolicy::new().with_max_failed_attempts(2));
        let alice = store
            .create(NewAccount::new("alice"))
            .await?
            .map_err(|rejection| anyhow!("{rejection}"))?;

        assert!(store.access_failed(&alice.id).await?.is_ok());
        assert_eq!(store.access_failed_count(&alice.id).await?, 1);
        assert!(!store.is_locked_out(&alice.id).await?);

        assert!(store.access_failed(&alice.id).await?.is_ok());
        assert!(store.is_locked_out(&alice.id).await?);
        assert_eq!(store.access_failed_count(&alice.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn zero_length_lockout_expires_immediately() -> Result<()> {
        let store = MemoryAccountStore::<i32>::new().with_lockout_policy(
            LockoutPolicy::new()
                .with_max_failed_attempts(1)
                .with_lockout_duration(Duration::ZERO),
        );
        let alice = store
            .create(NewAccount::new("alice"))
            .await?
            .map_err(|rejection| anyhow!("{rejection}"))?;
        assert!(store.access_failed(&alice.id).await?.is_ok());
        assert!(!store.is_locked_out(&alice.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn passwords_are_checked_against_hash() -> Result<()> {
        let (store, alice) = seeded().await?;
        assert!(store.check_password(&alice, &SecretString::from("secret")).await?);
        assert!(!store.check_password(&alice, &SecretString::from("nope")).await?);

        let external = store
            .create(NewAccount::new("external"))
            .await?
            .map_err(|rejection| anyhow!("{rejection}"))?;
        assert!(!store.check_password(&external, &SecretString::from("")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_accounts_are_store_errors() -> Result<()> {
        let store = MemoryAccountStore::<i32>::new();
        let err = store.claims(&99).await.err();
        assert!(matches!(err, Some(StoreError::UnknownAccount(ref id)) if id == "99"));
        Ok(())
    }

    #[tokio::test]
    async fn claim_limit_rejects_extra_claims() -> Result<()> {
        let store = MemoryAccountStore::<i32>::new().with_claim_limit(1);
        let alice = store
            .create(NewAccount::new("alice"))
            .await?
            .map_err(|rejection| anyhow!("{rejection}"))?;
        assert!(store.add_claim(&alice.id, Claim::new("a", "1")).await?.is_ok());
        let err = store.add_claim(&alice.id, Claim::new("b", "2")).await?;
        assert_eq!(
            err.err().map(|r| r.first().code.clone()),
            Some("ClaimLimitExceeded".to_string())
        );
        Ok(())
    }
}
