//! User service: local and external authentication plus profile projection.
//!
//! Flow Overview (external sign-in):
//! 1) Look the `(provider, provider id)` login up in the store.
//! 2) Linked: sign in as that account.
//! 3) Not linked: provision an account, link the login, run claim
//!    reconciliation, then sign in through the same exit as step 2.
//!
//! Security boundaries:
//! - Unknown users, wrong passwords and locked accounts all return `None`
//!   from local authentication so callers cannot tell them apart.
//! - A locked account is never checked against its password and never
//!   accrues further failures.
//! - Profile lookups for unknown subjects fail loudly; liveness checks
//!   return `false`.

use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::claims::{Claim, ClaimSet, types};
use super::error::{ConfigError, ServiceError};
use super::hooks::{DefaultHooks, ExternalIdentity, SignInMessage, UserServiceHooks};
use super::key::{SubjectParser, default_parser};
use super::result::AuthenticateResult;
use super::store::{Account, AccountStore, LoginInfo};

pub struct UserService<S: AccountStore> {
    store: Arc<S>,
    hooks: Arc<dyn UserServiceHooks<S>>,
    parse_subject: SubjectParser<S::Key>,
}

pub struct UserServiceBuilder<S: AccountStore> {
    store: Arc<S>,
    hooks: Arc<dyn UserServiceHooks<S>>,
    parse_subject: Option<SubjectParser<S::Key>>,
}

impl<S: AccountStore + 'static> UserServiceBuilder<S> {
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn UserServiceHooks<S>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Use `parser` instead of the one derived from the key kind.
    #[must_use]
    pub fn subject_parser(mut self, parser: SubjectParser<S::Key>) -> Self {
        self.parse_subject = Some(parser);
        self
    }

    /// # Errors
    /// Returns a `ConfigError` if no parser was supplied and the store's key
    /// type has no built-in one.
    pub fn build(self) -> Result<UserService<S>, ConfigError> {
        let parse_subject = match self.parse_subject {
            Some(parser) => parser,
            None => default_parser::<S::Key>()?,
        };
        Ok(UserService {
            store: self.store,
            hooks: self.hooks,
            parse_subject,
        })
    }
}

impl<S: AccountStore + 'static> UserService<S> {
    /// Service with default hooks and the key kind's subject parser.
    ///
    /// # Errors
    /// Returns a `ConfigError` if the store's key type is unsupported.
    pub fn new(store: Arc<S>) -> Result<Self, ConfigError> {
        Self::builder(store).build()
    }

    pub fn builder(store: Arc<S>) -> UserServiceBuilder<S> {
        UserServiceBuilder {
            store,
            hooks: Arc::new(DefaultHooks),
            parse_subject: None,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Extension point callers consult before any credential check.
    ///
    /// # Errors
    /// Propagates hook errors.
    pub async fn pre_authenticate(
        &self,
        message: &SignInMessage,
    ) -> Result<Option<AuthenticateResult>, ServiceError> {
        self.hooks.pre_authenticate(message).await
    }

    /// Validate a username and password.
    ///
    /// `Ok(None)` covers every quiet failure: no password support, unknown
    /// user, locked account, wrong password.
    ///
    /// # Errors
    /// Returns an error only if the store backend fails or a hook errors.
    #[instrument(skip(self, password, message))]
    pub async fn authenticate_local(
        &self,
        username: &str,
        password: &SecretString,
        message: &SignInMessage,
    ) -> Result<Option<AuthenticateResult>, ServiceError> {
        let capabilities = self.store.capabilities();
        if !capabilities.password {
            debug!("store does not support passwords");
            return Ok(None);
        }

        let Some(account) = self.store.find_by_username(username).await? else {
            debug!("unknown username");
            return Ok(None);
        };

        if capabilities.lockout && self.store.is_locked_out(&account.id).await? {
            debug!(account = %account.id, "account is locked out");
            return Ok(None);
        }

        if !self.store.check_password(&account, password).await? {
            if capabilities.lockout {
                if let Err(rejection) = self.store.access_failed(&account.id).await? {
                    warn!(account = %account.id, code = %rejection.first().code, "failed to record failed attempt");
                }
            }
            debug!(account = %account.id, "password mismatch");
            return Ok(None);
        }

        if capabilities.lockout {
            if let Err(rejection) = self.store.reset_access_failed_count(&account.id).await? {
                warn!(account = %account.id, code = %rejection.first().code, "failed to reset failed attempt counter");
            }
        }

        if let Some(result) = self
            .hooks
            .post_authenticate_local(self.store.as_ref(), &account, message)
            .await?
        {
            debug!(account = %account.id, "post-authentication hook replaced the result");
            return Ok(Some(result));
        }

        let display_name = self.display_name(&account).await?;
        Ok(Some(AuthenticateResult::local(
            account.id.to_string(),
            display_name,
        )))
    }

    /// Sign in a subject asserted by an external provider, creating and
    /// linking a local account on first sight.
    ///
    /// # Errors
    /// Returns `ServiceError::InvariantViolation` if the provisioning hook
    /// yields no account, or a store error if the backend fails. Store
    /// rejections come back as `AuthenticateResult::Failure`.
    #[instrument(skip(self, identity, _message), fields(provider = %identity.provider))]
    pub async fn authenticate_external(
        &self,
        identity: &ExternalIdentity,
        _message: &SignInMessage,
    ) -> Result<AuthenticateResult, ServiceError> {
        if identity.provider.trim().is_empty() || identity.provider_id.trim().is_empty() {
            return Ok(AuthenticateResult::failure(
                "External identity is missing its provider or provider id.",
            ));
        }

        let login = LoginInfo::new(&identity.provider, &identity.provider_id);
        match self.store.find_by_login(&login).await? {
            Some(account) => self.process_existing_account(&account.id, identity).await,
            None => self.process_new_account(login, identity).await,
        }
    }

    async fn process_existing_account(
        &self,
        id: &S::Key,
        identity: &ExternalIdentity,
    ) -> Result<AuthenticateResult, ServiceError> {
        debug!(account = %id, "external login already linked");
        if let Some(result) = self
            .hooks
            .existing_external_account(self.store.as_ref(), id, identity)
            .await?
        {
            return Ok(result);
        }
        self.sign_in_external(id, &identity.provider).await
    }

    async fn process_new_account(
        &self,
        login: LoginInfo,
        identity: &ExternalIdentity,
    ) -> Result<AuthenticateResult, ServiceError> {
        let new_account = self
            .hooks
            .new_account_from_external(identity)
            .ok_or(ServiceError::InvariantViolation(
                "account provisioning hook returned no account",
            ))?;

        let account = match self.store.create(new_account).await? {
            Ok(account) => account,
            Err(rejection) => {
                warn!(code = %rejection.first().code, "store refused new external account");
                return Ok(AuthenticateResult::failure(
                    rejection.first().description.clone(),
                ));
            }
        };

        // A concurrent sign-in for the same login loses here: the store's
        // uniqueness constraint on the link is the only guard.
        if let Err(rejection) = self.store.add_login(&account.id, login).await? {
            warn!(account = %account.id, code = %rejection.first().code, "store refused external login link");
            return Ok(AuthenticateResult::failure(
                rejection.first().description.clone(),
            ));
        }
        debug!(account = %account.id, "created account for external login");

        if let Some(result) = self
            .hooks
            .account_created_from_external(self.store.as_ref(), &account.id, identity)
            .await?
        {
            return Ok(result);
        }

        self.sign_in_external(&account.id, &identity.provider).await
    }

    async fn sign_in_external(
        &self,
        id: &S::Key,
        provider: &str,
    ) -> Result<AuthenticateResult, ServiceError> {
        let account = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        let display_name = self.display_name(&account).await?;
        Ok(AuthenticateResult::external(
            account.id.to_string(),
            display_name,
            provider,
        ))
    }

    /// `name` claim, then the legacy name claim, then the username.
    async fn display_name(&self, account: &Account<S::Key>) -> Result<String, ServiceError> {
        if self.store.capabilities().claims {
            let claims: ClaimSet = self.store.claims(&account.id).await?.into();
            if let Some(name) = claims
                .value_of(types::NAME)
                .or_else(|| claims.value_of(types::LEGACY_NAME))
            {
                return Ok(name.to_string());
            }
        }
        Ok(account.username.clone())
    }

    /// Claims describing `subject_id`, optionally filtered by type.
    ///
    /// An empty filter means every claim.
    ///
    /// # Errors
    /// Returns `ServiceError::NotFound` for unknown subjects.
    #[instrument(skip(self, requested_claim_types))]
    pub async fn get_profile_data(
        &self,
        subject_id: &str,
        requested_claim_types: Option<&[String]>,
    ) -> Result<ClaimSet, ServiceError> {
        let key = (self.parse_subject)(subject_id);
        let account = self
            .store
            .find_by_id(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(subject_id.to_string()))?;

        let claims = self.claims_from_account(&account).await?;
        Ok(match requested_claim_types {
            Some(requested) if !requested.is_empty() => claims.retain_types(requested),
            _ => claims,
        })
    }

    async fn claims_from_account(&self, account: &Account<S::Key>) -> Result<ClaimSet, ServiceError> {
        let capabilities = self.store.capabilities();
        let mut claims = ClaimSet::new();
        claims.push(Claim::new(types::SUBJECT, account.id.to_string()));

        if capabilities.email {
            if let Some(email) = non_blank(account.email.as_deref()) {
                claims.push(Claim::new(types::EMAIL, email));
                claims.push(Claim::new(
                    types::EMAIL_VERIFIED,
                    bool_claim(account.email_confirmed),
                ));
            }
        }

        if capabilities.phone {
            if let Some(phone) = non_blank(account.phone_number.as_deref()) {
                claims.push(Claim::new(types::PHONE_NUMBER, phone));
                claims.push(Claim::new(
                    types::PHONE_NUMBER_VERIFIED,
                    bool_claim(account.phone_number_confirmed),
                ));
            }
        }

        if capabilities.claims {
            claims.extend(self.store.claims(&account.id).await?);
        }

        if capabilities.roles {
            claims.extend(
                self.store
                    .roles(&account.id)
                    .await?
                    .into_iter()
                    .map(|role| Claim::new(types::ROLE, role)),
            );
        }

        Ok(claims)
    }

    /// Whether `subject_id` still maps to an account.
    ///
    /// # Errors
    /// Returns an error only if the store backend fails.
    #[instrument(skip(self))]
    pub async fn is_active(&self, subject_id: &str) -> Result<bool, ServiceError> {
        let key = (self.parse_subject)(subject_id);
        Ok(self.store.find_by_id(&key).await?.is_some())
    }

    /// Nothing is held per session, so signing out only logs.
    #[instrument(skip(self))]
    pub fn sign_out(&self, subject_id: &str) {
        debug!("subject signed out");
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

const fn bool_claim(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
