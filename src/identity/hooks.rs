//! Extension points of the user service.
//!
//! Every hook has a default, so `DefaultHooks` gives the stock behavior.
//! Implementors override only what they need and hand the hooks to
//! `UserService::builder`.

use async_trait::async_trait;

use super::claims::ClaimSet;
use super::error::ServiceError;
use super::reconcile;
use super::result::AuthenticateResult;
use super::store::{Account, AccountStore, NewAccount};

/// Context of the sign-in request that triggered authentication.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignInMessage {
    pub client_id: Option<String>,
    pub idp: Option<String>,
    pub return_url: Option<String>,
    pub acr_values: Vec<String>,
}

/// A subject asserted by an external identity provider for one sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: String,
    pub provider_id: String,
    pub claims: ClaimSet,
}

impl ExternalIdentity {
    pub fn new(
        provider: impl Into<String>,
        provider_id: impl Into<String>,
        claims: impl Into<ClaimSet>,
    ) -> Self {
        Self {
            provider: provider.into(),
            provider_id: provider_id.into(),
            claims: claims.into(),
        }
    }
}

type HookResult = Result<Option<AuthenticateResult>, ServiceError>;

#[async_trait]
pub trait UserServiceHooks<S: AccountStore>: Send + Sync {
    /// Runs before any credential check. `Some` short-circuits sign-in.
    async fn pre_authenticate(&self, _message: &SignInMessage) -> HookResult {
        Ok(None)
    }

    /// Runs after a correct password. `Some` replaces the default success,
    /// e.g. to demand a second factor.
    async fn post_authenticate_local(
        &self,
        _store: &S,
        _account: &Account<S::Key>,
        _message: &SignInMessage,
    ) -> HookResult {
        Ok(None)
    }

    /// Account to create for a never-seen external login. Returning `None`
    /// is a programming error and aborts the sign-in.
    fn new_account_from_external(&self, _identity: &ExternalIdentity) -> Option<NewAccount> {
        Some(NewAccount::with_random_username())
    }

    /// Runs once the new account and its login link exist. The default
    /// promotes email and phone, then reconciles the remaining claims.
    async fn account_created_from_external(
        &self,
        store: &S,
        id: &S::Key,
        identity: &ExternalIdentity,
    ) -> HookResult {
        reconcile::apply_external_claims(store, id, identity.claims.clone()).await
    }

    /// Runs when the external login is already linked. `Some` replaces the
    /// plain sign-in.
    async fn existing_external_account(
        &self,
        _store: &S,
        _id: &S::Key,
        _identity: &ExternalIdentity,
    ) -> HookResult {
        Ok(None)
    }
}

/// Stock behavior for every hook.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl<S: AccountStore> UserServiceHooks<S> for DefaultHooks {}
