//! Subject id to account key conversion.
//!
//! Subject ids always arrive as strings. The parser for an account key type
//! is chosen once, when the service is built, from the key's [`KeyKind`].
//! Malformed subjects parse to the kind's zero value so they resolve to
//! "no such account" instead of failing the request.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ConfigError;

/// Semantic kind of an account key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Text,
    Int32,
    UInt32,
    Int64,
    Uuid,
    /// A key type without a built-in parser; needs an explicit one.
    Other(&'static str),
}

/// A subject id parsed according to a [`KeyKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubjectValue {
    Text(String),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    Uuid(Uuid),
}

/// Key types usable as account identifiers.
pub trait AccountKey: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {
    fn kind() -> KeyKind;

    /// Convert a parsed subject into this key. `None` when the value's kind
    /// does not belong to this key type.
    fn from_subject_value(value: SubjectValue) -> Option<Self>;
}

pub type SubjectParser<K> = Arc<dyn Fn(&str) -> K + Send + Sync>;

type ParseFn = fn(&str) -> SubjectValue;

fn parse_text(subject: &str) -> SubjectValue {
    SubjectValue::Text(subject.to_string())
}

fn parse_int32(subject: &str) -> SubjectValue {
    SubjectValue::Int32(subject.parse().unwrap_or(0))
}

fn parse_uint32(subject: &str) -> SubjectValue {
    SubjectValue::UInt32(subject.parse().unwrap_or(0))
}

fn parse_int64(subject: &str) -> SubjectValue {
    SubjectValue::Int64(subject.parse().unwrap_or(0))
}

fn parse_uuid(subject: &str) -> SubjectValue {
    SubjectValue::Uuid(Uuid::parse_str(subject).unwrap_or(Uuid::nil()))
}

impl KeyKind {
    fn strategy(self) -> Result<ParseFn, ConfigError> {
        match self {
            Self::Text => Ok(parse_text),
            Self::Int32 => Ok(parse_int32),
            Self::UInt32 => Ok(parse_uint32),
            Self::Int64 => Ok(parse_int64),
            Self::Uuid => Ok(parse_uuid),
            Self::Other(name) => Err(ConfigError::UnsupportedKeyType(name)),
        }
    }
}

/// Build the subject parser for `K` from its key kind.
///
/// # Errors
/// Returns `ConfigError::UnsupportedKeyType` for [`KeyKind::Other`] and
/// `ConfigError::KeyKindMismatch` when `K` cannot hold values of its own
/// declared kind.
pub fn default_parser<K: AccountKey>() -> Result<SubjectParser<K>, ConfigError> {
    let kind = K::kind();
    let parse = kind.strategy()?;

    // Probe with an empty subject: every strategy maps it to the zero value,
    // which is also the fallback if a later conversion ever fails.
    let fallback =
        K::from_subject_value(parse("")).ok_or(ConfigError::KeyKindMismatch(kind))?;

    Ok(Arc::new(move |subject: &str| {
        K::from_subject_value(parse(subject)).unwrap_or_else(|| fallback.clone())
    }))
}

impl AccountKey for String {
    fn kind() -> KeyKind {
        KeyKind::Text
    }

    fn from_subject_value(value: SubjectValue) -> Option<Self> {
        match value {
            SubjectValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl AccountKey for i32 {
    fn kind() -> KeyKind {
        KeyKind::Int32
    }

    fn from_subject_value(value: SubjectValue) -> Option<Self> {
        match value {
            SubjectValue::Int32(key) => Some(key),
            _ => None,
        }
    }
}

impl AccountKey for u32 {
    fn kind() -> KeyKind {
        KeyKind::UInt32
    }

    fn from_subject_value(value: SubjectValue) -> Option<Self> {
        match value {
            SubjectValue::UInt32(key) => Some(key),
            _ => None,
        }
    }
}

impl AccountKey for i64 {
    fn kind() -> KeyKind {
        KeyKind::Int64
    }

    fn from_subject_value(value: SubjectValue) -> Option<Self> {
        match value {
            SubjectValue::Int64(key) => Some(key),
            _ => None,
        }
    }
}

impl AccountKey for Uuid {
    fn kind() -> KeyKind {
        KeyKind::Uuid
    }

    fn from_subject_value(value: SubjectValue) -> Option<Self> {
        match value {
            SubjectValue::Uuid(key) => Some(key),
            _ => None,
        }
    }
}
