//! Outcome of an authentication attempt.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Local,
    External,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedSubject {
    pub subject_id: String,
    pub display_name: String,
    pub method: AuthMethod,
    /// Set only for external sign-ins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_provider: Option<String>,
}

/// Terminal value of an authentication call. Never retried by the engine.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuthenticateResult {
    Success(AuthenticatedSubject),
    Failure { error: String },
}

impl AuthenticateResult {
    #[must_use]
    pub fn local(subject_id: String, display_name: String) -> Self {
        Self::Success(AuthenticatedSubject {
            subject_id,
            display_name,
            method: AuthMethod::Local,
            identity_provider: None,
        })
    }

    #[must_use]
    pub fn external(subject_id: String, display_name: String, provider: &str) -> Self {
        Self::Success(AuthenticatedSubject {
            subject_id,
            display_name,
            method: AuthMethod::External,
            identity_provider: Some(provider.to_string()),
        })
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn subject(&self) -> Option<&AuthenticatedSubject> {
        match self {
            Self::Success(subject) => Some(subject),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }
}
