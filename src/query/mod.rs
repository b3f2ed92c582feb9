//! Join/alias trees handed to the query collaborator.
//!
//! Only statically declared equality joins hanging off the root table are
//! expressible. [`Query::ensure_join`] is the single way to add a join and
//! returns the existing alias when the same join key was already added, so
//! a query never carries two aliases for one join condition.

use crate::core::{EngineError, Result, Value};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Alias of the object's own table in every query.
pub const ROOT_ALIAS: &str = "t0";

/// Equality join `root.local_column = table.remote_column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey {
    pub local_column: String,
    pub table: String,
    pub remote_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJoin {
    pub alias: String,
    pub key: JoinKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub alias: String,
    pub column: String,
}

#[derive(Debug, Clone)]
pub struct Query {
    table: String,
    joins: Vec<QueryJoin>,
    selections: Vec<Selection>,
    filter: Option<(String, Value)>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            joins: Vec::new(),
            selections: Vec::new(),
            filter: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn joins(&self) -> &[QueryJoin] {
        &self.joins
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn filter(&self) -> Option<(&str, &Value)> {
        self.filter.as_ref().map(|(c, v)| (c.as_str(), v))
    }

    /// Restricts the root table to rows whose `column` equals `value`.
    pub fn filter_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filter = Some((column.into(), value));
        self
    }

    /// Returns the alias joined for `key`, adding the join if absent.
    pub fn ensure_join(&mut self, key: JoinKey) -> String {
        if let Some(existing) = self.joins.iter().find(|j| j.key == key) {
            return existing.alias.clone();
        }
        let alias = format!("j{}", self.joins.len() + 1);
        self.joins.push(QueryJoin {
            alias: alias.clone(),
            key,
        });
        alias
    }

    /// Adds a column to the selection; selecting twice is a no-op.
    pub fn select(&mut self, alias: &str, column: &str) {
        let selected = self
            .selections
            .iter()
            .any(|s| s.alias == alias && s.column == column);
        if !selected {
            self.selections.push(Selection {
                alias: alias.to_string(),
                column: column.to_string(),
            });
        }
    }

    /// Rejects trees the collaborator must never receive.
    pub fn validate(&self) -> Result<()> {
        let mut aliases = HashSet::from([ROOT_ALIAS]);
        let mut keys = HashSet::new();
        for join in &self.joins {
            if !aliases.insert(join.alias.as_str()) {
                return Err(EngineError::Storage(format!(
                    "Duplicate alias '{}' in query on '{}'",
                    join.alias, self.table
                )));
            }
            if !keys.insert(&join.key) {
                return Err(EngineError::Storage(format!(
                    "Join on '{}' added twice in query on '{}'",
                    join.key.table, self.table
                )));
            }
        }
        for selection in &self.selections {
            if !aliases.contains(selection.alias.as_str()) {
                return Err(EngineError::Storage(format!(
                    "Selection uses unknown alias '{}'",
                    selection.alias
                )));
            }
        }
        Ok(())
    }
}

/// One result row: selected values grouped by table alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow {
    values: IndexMap<String, IndexMap<String, Value>>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: &str, column: &str, value: Value) {
        self.values
            .entry(alias.to_string())
            .or_default()
            .insert(column.to_string(), value);
    }

    /// Missing selections read as `Null`, like an unmatched left join.
    pub fn get(&self, alias: &str, column: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values
            .get(alias)
            .and_then(|cols| cols.get(column))
            .unwrap_or(NULL)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_key() -> JoinKey {
        JoinKey {
            local_column: "parent_id".into(),
            table: "customer".into(),
            remote_column: "id".into(),
        }
    }

    #[test]
    fn test_ensure_join_deduplicates() {
        let mut query = Query::new("invoice");
        let a = query.ensure_join(parent_key());
        let b = query.ensure_join(parent_key());
        assert_eq!(a, b);
        assert_eq!(query.joins().len(), 1);

        let other = JoinKey {
            local_column: "owner_id".into(),
            ..parent_key()
        };
        assert_ne!(query.ensure_join(other), a);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut query = Query::new("invoice");
        query.select(ROOT_ALIAS, "id");
        query.select(ROOT_ALIAS, "id");
        assert_eq!(query.selections().len(), 1);
    }

    #[test]
    fn test_validate_unknown_alias() {
        let mut query = Query::new("invoice");
        query.select("j7", "name");
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_query_row_missing_is_null() {
        let mut row = QueryRow::new();
        row.insert("j1", "name", Value::from("ACME"));
        assert_eq!(row.get("j1", "name"), &Value::from("ACME"));
        assert_eq!(row.get("j1", "city"), &Value::Null);
    }
}
