#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use idlink::identity::{
    Account, AccountStore, Claim, ClaimSet, ExternalIdentity, LoginInfo, Mutation, NewAccount,
    StoreCapabilities, StoreResult, UserService,
};
use idlink::store::MemoryAccountStore;
use secrecy::SecretString;
use std::sync::Arc;

pub type Store = MemoryAccountStore<i32>;

pub fn service(store: Store) -> Result<(Arc<Store>, UserService<Store>)> {
    let store = Arc::new(store);
    let service = UserService::new(store.clone())?;
    Ok((store, service))
}

pub async fn local_account(store: &Store, username: &str, password: &str) -> Result<Account<i32>> {
    store
        .create_with_password(NewAccount::new(username), &SecretString::from(password))
        .await?
        .map_err(|rejection| anyhow!("create rejected: {rejection}"))
}

pub async fn plain_account(store: &Store, username: &str) -> Result<Account<i32>> {
    store
        .create(NewAccount::new(username))
        .await?
        .map_err(|rejection| anyhow!("create rejected: {rejection}"))
}

pub fn claims(pairs: &[(&str, &str)]) -> ClaimSet {
    pairs
        .iter()
        .map(|(claim_type, value)| Claim::new(*claim_type, *value))
        .collect()
}

pub fn google(provider_id: &str, pairs: &[(&str, &str)]) -> ExternalIdentity {
    ExternalIdentity::new("Google", provider_id, claims(pairs))
}

/// Store whose login lookups always miss, so a sign-in races a link that
/// another sign-in already created.
pub struct StaleLoginStore {
    pub inner: Store,
}

#[async_trait]
impl AccountStore for StaleLoginStore {
    type Key = i32;

    fn capabilities(&self) -> StoreCapabilities {
        self.inner.capabilities()
    }

    async fn find_by_id(&self, id: &i32) -> StoreResult<Option<Account<i32>>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account<i32>>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_login(&self, _login: &LoginInfo) -> StoreResult<Option<Account<i32>>> {
        Ok(None)
    }

    async fn create(&self, account: NewAccount) -> Mutation<Account<i32>> {
        self.inner.create(account).await
    }

    async fn add_login(&self, id: &i32, login: LoginInfo) -> Mutation {
        self.inner.add_login(id, login).await
    }

    async fn set_email(&self, id: &i32, email: &str) -> Mutation {
        self.inner.set_email(id, email).await
    }

    async fn generate_email_confirmation_token(&self, id: &i32) -> StoreResult<String> {
        self.inner.generate_email_confirmation_token(id).await
    }

    async fn confirm_email(&self, id: &i32, token: &str) -> Mutation {
        self.inner.confirm_email(id, token).await
    }

    async fn set_phone_number(&self, id: &i32, phone_number: &str) -> Mutation {
        self.inner.set_phone_number(id, phone_number).await
    }

    async fn generate_change_phone_number_token(
        &self,
        id: &i32,
        phone_number: &str,
    ) -> StoreResult<String> {
        self.inner
            .generate_change_phone_number_token(id, phone_number)
            .await
    }

    async fn change_phone_number(&self, id: &i32, phone_number: &str, token: &str) -> Mutation {
        self.inner.change_phone_number(id, phone_number, token).await
    }

    async fn claims(&self, id: &i32) -> StoreResult<Vec<Claim>> {
        self.inner.claims(id).await
    }

    async fn add_claim(&self, id: &i32, claim: Claim) -> Mutation {
        self.inner.add_claim(id, claim).await
    }

    async fn roles(&self, id: &i32) -> StoreResult<Vec<String>> {
        self.inner.roles(id).await
    }

    async fn check_password(
        &self,
        account: &Account<i32>,
        password: &SecretString,
    ) -> StoreResult<bool> {
        self.inner.check_password(account, password).await
    }

    async fn is_locked_out(&self, id: &i32) -> StoreResult<bool> {
        self.inner.is_locked_out(id).await
    }

    async fn access_failed(&self, id: &i32) -> Mutation {
        self.inner.access_failed(id).await
    }

    async fn reset_access_failed_count(&self, id: &i32) -> Mutation {
        self.inner.reset_access_failed_count(id).await
    }
}
