//! Identity reconciliation and authentication engine.
//!
//! `UserService` sits between "a credential or external assertion arrived"
//! and "a subject plus claim set was established". Persistence is delegated
//! to an [`AccountStore`]; extension points live in [`UserServiceHooks`].
//!
//! ## Claim Reconciliation
//!
//! When an external sign-in creates an account, the asserted email and phone
//! number are promoted into the account's native slots (confirmed when the
//! provider says they are verified) and every other asserted claim the
//! account does not already hold is stored. Already-linked accounts are
//! signed in without touching their claims.

pub mod claims;
pub mod error;
pub mod hooks;
pub mod key;
pub mod reconcile;
pub mod result;
pub mod service;
pub mod store;

pub use claims::{Claim, ClaimSet};
pub use error::{ConfigError, ServiceError};
pub use hooks::{DefaultHooks, ExternalIdentity, SignInMessage, UserServiceHooks};
pub use key::{AccountKey, KeyKind, SubjectParser, SubjectValue};
pub use reconcile::{ContactAttribute, Promotion, PromotionOutcome};
pub use result::{AuthMethod, AuthenticateResult, AuthenticatedSubject};
pub use service::{UserService, UserServiceBuilder};
pub use store::{
    Account, AccountStore, IdentityError, LoginInfo, Mutation, NewAccount, Rejection,
    StoreCapabilities, StoreError, StoreResult,
};
