pub mod error;
pub mod types;
pub mod value;

pub use error::{EngineError, Result, ValidationFailure};
pub use types::{Column, ColumnKind, ID_COLUMN, IndexSchema, Row, TableSchema};
pub use value::Value;
