use super::{EngineError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// System column holding the object id, first in every object table.
pub const ID_COLUMN: &str = "id";

/// A flattened storage row, positionally aligned with a [`TableSchema`].
pub type Row = Vec<Value>;

/// Primitive kind of a stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Text { max_len: usize },
    Integer,
    Decimal { precision: u32, scale: u32 },
    Timestamp,
    Binary { max_len: Option<usize> },
}

impl ColumnKind {
    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Text { .. }, Value::Text(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Decimal { .. }, Value::Decimal(_))
                | (Self::Timestamp, Value::Timestamp(_))
                | (Self::Binary { .. }, Value::Binary(_))
        )
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { max_len } => write!(f, "VARCHAR({})", max_len),
            Self::Integer => write!(f, "INTEGER"),
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Binary { .. } => write!(f, "BLOB"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(EngineError::Storage(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.kind.is_compatible(value) {
            return Err(EngineError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.kind,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Column and index catalog of one object table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    indexes: Vec<IndexSchema>,
    positions: HashMap<String, usize>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a column, rejecting a name already present in the table.
    pub fn add_column(&mut self, column: Column) -> Result<usize> {
        if self.positions.contains_key(&column.name) {
            return Err(EngineError::Composition(format!(
                "Duplicate column '{}' in table '{}'",
                column.name, self.name
            )));
        }
        let position = self.columns.len();
        self.positions.insert(column.name.clone(), position);
        self.columns.push(column);
        Ok(position)
    }

    pub fn add_index(&mut self, index: IndexSchema) -> Result<()> {
        if self.indexes.iter().any(|existing| existing.name == index.name) {
            return Err(EngineError::Composition(format!(
                "Duplicate index '{}' in table '{}'",
                index.name, self.name
            )));
        }
        if let Some(missing) = index
            .columns
            .iter()
            .find(|col| !self.positions.contains_key(*col))
        {
            return Err(EngineError::Composition(format!(
                "Index '{}' references unknown column '{}'",
                index.name, missing
            )));
        }
        self.indexes.push(index);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn indexes(&self) -> &[IndexSchema] {
        &self.indexes
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.find_column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EngineError::Storage(format!(
                "Row for table '{}' has {} values, expected {}",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_column_rejected() {
        let mut schema = TableSchema::new("invoice");
        schema
            .add_column(Column::new("amount", ColumnKind::Integer))
            .unwrap();
        let err = schema
            .add_column(Column::new("amount", ColumnKind::Timestamp))
            .unwrap_err();
        assert!(matches!(err, EngineError::Composition(_)));
    }

    #[test]
    fn test_index_on_unknown_column() {
        let mut schema = TableSchema::new("invoice");
        let result = schema.add_index(IndexSchema::new("idx_nr", vec!["nr".into()]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_row() {
        let mut schema = TableSchema::new("t");
        schema
            .add_column(Column::new("id", ColumnKind::Text { max_len: 36 }).not_null())
            .unwrap();
        assert!(schema.validate_row(&vec![Value::Text("a".into())]).is_ok());
        assert!(schema.validate_row(&vec![Value::Null]).is_err());
        assert!(schema.validate_row(&vec![Value::Integer(1)]).is_err());
    }
}
