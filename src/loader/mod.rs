//! Flat-file round trip.
//!
//! A loader collaborator (spreadsheet, CSV importer) hands raw cells to
//! [`ObjectInstance::load`](crate::object::ObjectInstance::load) and reads
//! them back with
//! [`put_content_in_cell`](crate::object::ObjectInstance::put_content_in_cell).
//! Loads are change-detecting: a cell equal to the current value reports
//! no change and fires no trigger.

pub mod field;
pub mod object;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a loader does with a cell it cannot accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoaderMode {
    /// Fail with [`EngineError::Load`](crate::core::EngineError::Load)
    #[default]
    Strict,
    /// Log a warning and write the field's blank/default value
    Lenient,
}

/// One raw cell as supplied by, or handed back to, a flat file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoaderCell {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
}

impl LoaderCell {
    /// Empty cells and whitespace-only text both count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for LoaderCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(text) => write!(f, "{}", text),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<&str> for LoaderCell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for LoaderCell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for LoaderCell {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<Decimal> for LoaderCell {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<DateTime<Utc>> for LoaderCell {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl<T: Into<LoaderCell>> From<Option<T>> for LoaderCell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Empty)
    }
}

/// Documentation entry for one loadable column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderFieldSample {
    /// Path accepted by `load`: `field` or `property.field`
    pub name: String,
    pub optional: bool,
    pub example: String,
    pub constraints: Vec<String>,
}

pub use object::samples_to_json;
