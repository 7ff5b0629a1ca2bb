//! # idlink (Identity Reconciliation & Authentication)
//!
//! `idlink` turns either a local username/password pair or an identity
//! asserted by an external provider into an authenticated subject with a
//! claim set.
//!
//! ## External Sign-in
//!
//! An external identity is keyed by `(provider, provider id)`. The first
//! sign-in provisions a local account, links the login to it and reconciles
//! the asserted claims into the account:
//!
//! - **Email / phone promotion:** the asserted value fills the account's empty
//!   slot and is confirmed when the provider marks it verified.
//! - **Claim reconciliation:** only `(type, value)` pairs the account does not
//!   already hold are stored.
//!
//! Later sign-ins with the same login reuse the linked account.
//!
//! ## Local Sign-in
//!
//! Password checks honor the store's lockout policy. Unknown users, wrong
//! passwords and locked accounts are indistinguishable to the caller.
//!
//! ## Storage
//!
//! Stores advertise what they support through `StoreCapabilities`; the engine
//! skips any step whose capability is missing. The HTTP server runs on the
//! `PostgreSQL` store, see `sql/schema.sql`.

pub mod api;
pub mod cli;
pub mod identity;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
