use super::TimePeriod;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Live value of one field inside a payload.
///
/// One variant per primitive kind; the owning
/// [`FieldDefinition`](super::FieldDefinition) decides which variant a
/// slot holds and validates every write into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInstance {
    Text(Option<String>),
    Integer(Option<i64>),
    Decimal(Option<Decimal>),
    Timestamp(Option<DateTime<Utc>>),
    TimePeriod(Option<TimePeriod>),
    /// Stored form: a one-way hash or a ciphertext, never the clear value
    Encrypted(Option<String>),
    Binary(Option<Vec<u8>>),
    Choice(Option<String>),
    MultiChoice(BTreeSet<String>),
}

impl FieldInstance {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(v) => v.is_none(),
            Self::Integer(v) => v.is_none(),
            Self::Decimal(v) => v.is_none(),
            Self::Timestamp(v) => v.is_none(),
            Self::TimePeriod(v) => v.is_none(),
            Self::Encrypted(v) => v.is_none(),
            Self::Binary(v) => v.is_none(),
            Self::Choice(v) => v.is_none(),
            Self::MultiChoice(v) => v.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => *v,
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(v) => *v,
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(v) => *v,
            _ => None,
        }
    }

    pub fn as_time_period(&self) -> Option<TimePeriod> {
        match self {
            Self::TimePeriod(v) => *v,
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => v.as_deref(),
            _ => None,
        }
    }

    /// Storage code of a single choice.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Self::Choice(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_choices(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::MultiChoice(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn stored_secret(&self) -> Option<&str> {
        match self {
            Self::Encrypted(v) => v.as_deref(),
            _ => None,
        }
    }
}
