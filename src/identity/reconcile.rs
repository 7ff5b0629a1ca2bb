//! Claim reconciliation for accounts created from an external provider.
//!
//! Flow Overview:
//! 1) Promote the asserted email into the account's email slot (if empty).
//! 2) Promote the asserted phone number the same way.
//! 3) Persist every remaining claim whose `(type, value)` pair the account
//!    does not already hold, one at a time.
//!
//! Email runs before phone. A promoted attribute and its `*_verified` claim
//! are consumed and never reach step 3. A refused promotion is treated as a
//! lost race (another account already owns the value): the claim stays in
//! the set and flows through as an ordinary claim.

use tracing::{debug, instrument, warn};

use super::claims::{ClaimSet, types};
use super::error::ServiceError;
use super::result::AuthenticateResult;
use super::store::{AccountStore, IdentityError};

/// Contact attributes with a native slot on the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactAttribute {
    Email,
    PhoneNumber,
}

impl ContactAttribute {
    const fn value_type(self) -> &'static str {
        match self {
            Self::Email => types::EMAIL,
            Self::PhoneNumber => types::PHONE_NUMBER,
        }
    }

    const fn verified_type(self) -> &'static str {
        match self {
            Self::Email => types::EMAIL_VERIFIED,
            Self::PhoneNumber => types::PHONE_NUMBER_VERIFIED,
        }
    }
}

/// What a promotion pass did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The attribute was stored; `confirmed` when the provider vouched for it
    /// and the confirmation token was redeemed.
    Applied { confirmed: bool },
    /// The store refused the value. Claims were left untouched.
    RejectedBenign(IdentityError),
    /// Nothing to do: no asserted value, the account already has one, or
    /// the store does not support the attribute.
    Skipped,
}

/// Result of one promotion pass: what happened plus the claims still to
/// reconcile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promotion {
    pub outcome: PromotionOutcome,
    pub remaining: ClaimSet,
}

impl Promotion {
    fn unchanged(claims: ClaimSet) -> Self {
        Self {
            outcome: PromotionOutcome::Skipped,
            remaining: claims,
        }
    }
}

/// Promote an asserted email into the account's email slot.
///
/// # Errors
/// Returns `ServiceError::NotFound` if the account vanished, or a store error
/// if the backend fails. Store rejections are not errors.
pub async fn promote_email<S: AccountStore>(
    store: &S,
    id: &S::Key,
    claims: ClaimSet,
) -> Result<Promotion, ServiceError> {
    promote(store, id, claims, ContactAttribute::Email).await
}

/// Promote an asserted phone number into the account's phone slot.
///
/// # Errors
/// Same as [`promote_email`].
pub async fn promote_phone<S: AccountStore>(
    store: &S,
    id: &S::Key,
    claims: ClaimSet,
) -> Result<Promotion, ServiceError> {
    promote(store, id, claims, ContactAttribute::PhoneNumber).await
}

#[instrument(skip(store, claims), fields(account = %id))]
async fn promote<S: AccountStore>(
    store: &S,
    id: &S::Key,
    claims: ClaimSet,
    attribute: ContactAttribute,
) -> Result<Promotion, ServiceError> {
    let capabilities = store.capabilities();
    let supported = match attribute {
        ContactAttribute::Email => capabilities.email,
        ContactAttribute::PhoneNumber => capabilities.phone,
    };
    if !supported {
        return Ok(Promotion::unchanged(claims));
    }

    let Some(asserted) = claims.value_of(attribute.value_type()).map(str::to_string) else {
        return Ok(Promotion::unchanged(claims));
    };

    let account = store
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
    let current = match attribute {
        ContactAttribute::Email => account.email.as_ref(),
        ContactAttribute::PhoneNumber => account.phone_number.as_ref(),
    };
    if current.is_some() {
        debug!("account already has a value on file, leaving claims unchanged");
        return Ok(Promotion::unchanged(claims));
    }

    let set = match attribute {
        ContactAttribute::Email => store.set_email(id, &asserted).await?,
        ContactAttribute::PhoneNumber => store.set_phone_number(id, &asserted).await?,
    };
    if let Err(rejection) = set {
        // Any refusal counts as "already claimed elsewhere", including
        // validation failures.
        warn!(
            code = %rejection.first().code,
            "store refused promoted value, keeping it as an ordinary claim"
        );
        return Ok(Promotion {
            outcome: PromotionOutcome::RejectedBenign(rejection.first().clone()),
            remaining: claims,
        });
    }

    let vouched = claims.value_of(attribute.verified_type()) == Some("true");
    let confirmed = if vouched {
        confirm(store, id, &asserted, attribute).await?
    } else {
        false
    };

    debug!(confirmed, "promoted asserted value into account slot");

    Ok(Promotion {
        outcome: PromotionOutcome::Applied { confirmed },
        remaining: claims.without_types(&[attribute.value_type(), attribute.verified_type()]),
    })
}

/// Generate and immediately redeem a confirmation token. The token never
/// leaves this call.
async fn confirm<S: AccountStore>(
    store: &S,
    id: &S::Key,
    value: &str,
    attribute: ContactAttribute,
) -> Result<bool, ServiceError> {
    let redeemed = match attribute {
        ContactAttribute::Email => {
            let token = store.generate_email_confirmation_token(id).await?;
            store.confirm_email(id, &token).await?
        }
        ContactAttribute::PhoneNumber => {
            let token = store.generate_change_phone_number_token(id, value).await?;
            store.change_phone_number(id, value, &token).await?
        }
    };

    match redeemed {
        Ok(()) => Ok(true),
        Err(rejection) => {
            warn!(
                code = %rejection.first().code,
                "confirmation token was not redeemed, value stays unconfirmed"
            );
            Ok(false)
        }
    }
}

/// Persist the asserted claims the account does not already hold.
///
/// Returns `Ok(None)` when every new claim was stored (or there were none),
/// and `Ok(Some(failure))` carrying the first store error otherwise. Claims
/// stored before the failure stay stored.
///
/// # Errors
/// Returns a store error if the backend fails.
#[instrument(skip(store, claims), fields(account = %id, asserted = claims.len()))]
pub async fn update_from_external_claims<S: AccountStore>(
    store: &S,
    id: &S::Key,
    claims: &ClaimSet,
) -> Result<Option<AuthenticateResult>, ServiceError> {
    if claims.is_empty() {
        return Ok(None);
    }

    if !store.capabilities().claims {
        debug!("store does not support claims, dropping asserted claims");
        return Ok(None);
    }

    let existing = store.claims(id).await?;
    let new_claims = claims.difference(&existing);
    debug!(new = new_claims.len(), "persisting new external claims");

    for claim in new_claims {
        if let Err(rejection) = store.add_claim(id, claim).await? {
            warn!(code = %rejection.first().code, "store refused external claim");
            return Ok(Some(AuthenticateResult::failure(
                rejection.first().description.clone(),
            )));
        }
    }

    Ok(None)
}

/// Email promotion, phone promotion, then reconciliation of what is left.
///
/// # Errors
/// Propagates errors from the individual passes.
pub async fn apply_external_claims<S: AccountStore>(
    store: &S,
    id: &S::Key,
    claims: ClaimSet,
) -> Result<Option<AuthenticateResult>, ServiceError> {
    let email = promote_email(store, id, claims).await?;
    let phone = promote_phone(store, id, email.remaining).await?;
    update_from_external_claims(store, id, &phone.remaining).await
}
