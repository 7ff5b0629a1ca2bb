//! Claim and claim-set types.
//!
//! A claim is a `(type, value)` pair. Two claims are the same claim when both
//! parts match exactly (case-sensitive); that equality drives reconciliation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// Claim types the engine reads or projects.
pub mod types {
    pub const SUBJECT: &str = "sub";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const EMAIL_VERIFIED: &str = "email_verified";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const PHONE_NUMBER_VERIFIED: &str = "phone_number_verified";
    pub const ROLE: &str = "role";

    /// Name claim URI still emitted by some WS-* era providers.
    pub const LEGACY_NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    fn key(&self) -> (&str, &str) {
        (self.claim_type.as_str(), self.value.as_str())
    }
}

/// Unordered collection of claims. Duplicate types are allowed.
///
/// Insertion order is kept so projected claim sets stay deterministic.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ClaimSet(Vec<Claim>);

impl ClaimSet {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, claim: Claim) {
        self.0.push(claim);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.0.iter()
    }

    /// First claim of the given type, if any.
    #[must_use]
    pub fn first_of_type(&self, claim_type: &str) -> Option<&Claim> {
        self.0.iter().find(|claim| claim.claim_type == claim_type)
    }

    /// Value of the first claim of `claim_type`, if any.
    #[must_use]
    pub fn value_of(&self, claim_type: &str) -> Option<&str> {
        self.first_of_type(claim_type).map(|claim| claim.value.as_str())
    }

    #[must_use]
    pub fn contains(&self, claim: &Claim) -> bool {
        self.0.iter().any(|existing| existing == claim)
    }

    /// Drop every claim whose type is listed in `claim_types`.
    #[must_use]
    pub fn without_types(self, claim_types: &[&str]) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|claim| !claim_types.contains(&claim.claim_type.as_str()))
                .collect(),
        )
    }

    /// Keep only claims whose type is in `claim_types`.
    #[must_use]
    pub fn retain_types<S: AsRef<str>>(self, claim_types: &[S]) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|claim| {
                    claim_types
                        .iter()
                        .any(|requested| requested.as_ref() == claim.claim_type)
                })
                .collect(),
        )
    }

    /// Claims in `self` whose `(type, value)` pair is absent from `existing`.
    ///
    /// Keyed on the `(type, value)` tuple. Repeats inside `self` collapse to
    /// their first occurrence so a single pass never persists a pair twice.
    #[must_use]
    pub fn difference(&self, existing: &[Claim]) -> Vec<Claim> {
        let mut seen: HashSet<(&str, &str)> = existing.iter().map(Claim::key).collect();
        self.0
            .iter()
            .filter(|claim| seen.insert(claim.key()))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Claim> {
        self.0
    }
}

impl From<Vec<Claim>> for ClaimSet {
    fn from(claims: Vec<Claim>) -> Self {
        Self(claims)
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Claim> for ClaimSet {
    fn extend<I: IntoIterator<Item = Claim>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ClaimSet {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, &str)]) -> ClaimSet {
        pairs.iter().map(|(t, v)| Claim::new(*t, *v)).collect()
    }

    #[test]
    fn difference_is_keyed_on_type_and_value() {
        let existing = vec![Claim::new("group", "admins"), Claim::new("name", "Alice")];
        let asserted = set(&[
            ("group", "admins"),
            ("group", "ops"),
            ("name", "alice"),
            ("Name", "Alice"),
        ]);

        let new = asserted.difference(&existing);
        assert_eq!(
            new,
            vec![
                Claim::new("group", "ops"),
                Claim::new("name", "alice"),
                Claim::new("Name", "Alice"),
            ]
        );
    }

    #[test]
    fn difference_collapses_repeated_pairs() {
        let asserted = set(&[("group", "ops"), ("group", "ops")]);
        assert_eq!(asserted.difference(&[]), vec![Claim::new("group", "ops")]);
    }

    #[test]
    fn without_types_removes_every_match() {
        let claims = set(&[
            (types::EMAIL, "a@x.com"),
            (types::EMAIL_VERIFIED, "true"),
            (types::NAME, "A"),
            (types::EMAIL, "b@x.com"),
        ]);
        let rest = claims.without_types(&[types::EMAIL, types::EMAIL_VERIFIED]);
        assert_eq!(rest, set(&[(types::NAME, "A")]));
    }

    #[test]
    fn retain_types_filters_by_requested_type() {
        let claims = set(&[(types::SUBJECT, "1"), (types::EMAIL, "a@x.com"), (types::ROLE, "admin")]);
        let filtered = claims.retain_types(&["email", "role"]);
        assert_eq!(filtered, set(&[(types::EMAIL, "a@x.com"), (types::ROLE, "admin")]));
    }

    #[test]
    fn claim_serializes_with_type_field() -> anyhow::Result<()> {
        let value = serde_json::to_value(Claim::new("name", "Alice"))?;
        assert_eq!(value, serde_json::json!({"type": "name", "value": "Alice"}));
        Ok(())
    }
}
