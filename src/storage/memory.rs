use super::{QueryEngine, StorageEngine, Table};
use crate::core::{Column, EngineError, IndexSchema, Result, Row, TableSchema, Value};
use crate::query::{Query, QueryRow, ROOT_ALIAS};
use std::collections::HashMap;

/// Reference storage collaborator keeping every table in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: HashMap<String, Table>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a table
    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        if self.tables.remove(table).is_none() {
            return Err(EngineError::ObjectNotFound(table.to_string()));
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::ObjectNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| EngineError::ObjectNotFound(name.to_string()))
    }

    /// List all table names
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

impl StorageEngine for InMemoryStorage {
    fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(EngineError::Storage(format!("Table '{}' already exists", name)));
        }
        self.tables.insert(name, Table::new(schema)?);
        Ok(())
    }

    fn add_column(&mut self, table: &str, column: Column) -> Result<()> {
        self.table_mut(table)?.add_column(column)
    }

    fn create_index(&mut self, table: &str, index: IndexSchema) -> Result<()> {
        self.table_mut(table)?.create_index(index)
    }

    fn table_exists(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn column_exists(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|t| t.schema().find_column_index(column).is_some())
    }

    fn index_exists(&self, table: &str, index: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|t| t.schema().indexes().iter().any(|i| i.name == index))
    }

    fn get_schema(&self, table: &str) -> Result<TableSchema> {
        Ok(self.table(table)?.schema().clone())
    }

    fn insert_row(&mut self, table: &str, row: Row) -> Result<()> {
        self.table_mut(table)?.insert(row).map(|_| ())
    }

    fn update_row(&mut self, table: &str, id: &str, row: Row) -> Result<()> {
        self.table_mut(table)?.update(id, row)
    }

    fn delete_row(&mut self, table: &str, id: &str) -> Result<()> {
        self.table_mut(table)?.delete(id)
    }

    fn fetch_row(&self, table: &str, id: &str) -> Result<Option<Row>> {
        Ok(self.table(table)?.get(id).cloned())
    }

    fn scan_table(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.table(table)?.scan())
    }

    fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.row_count())
    }

    /// All-or-nothing: the whole batch is checked before any row is written.
    fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<()> {
        let target = self.table_mut(table)?;
        target.check_insert_batch(&rows)?;
        for row in rows {
            target.insert(row)?;
        }
        Ok(())
    }
}

impl QueryEngine for InMemoryStorage {
    /// Left equality joins off the root table.
    fn run_query(&self, query: &Query) -> Result<Vec<QueryRow>> {
        query.validate()?;
        let root = self.table(query.table())?;
        let column_of = |table: &Table, column: &str| {
            table.schema().find_column_index(column).ok_or_else(|| {
                EngineError::FieldNotFound(column.to_string(), table.schema().name().to_string())
            })
        };

        let filter = match query.filter() {
            Some((column, value)) => Some((column_of(root, column)?, value)),
            None => None,
        };

        let mut joins = Vec::with_capacity(query.joins().len());
        for join in query.joins() {
            let remote = self.table(&join.key.table)?;
            joins.push((
                join.alias.as_str(),
                remote,
                column_of(root, &join.key.local_column)?,
                column_of(remote, &join.key.remote_column)?,
            ));
        }

        let mut selections = Vec::with_capacity(query.selections().len());
        for selection in query.selections() {
            let table = if selection.alias == ROOT_ALIAS {
                root
            } else {
                joins
                    .iter()
                    .find(|(alias, ..)| *alias == selection.alias)
                    .map(|(_, table, ..)| *table)
                    .ok_or_else(|| EngineError::Storage(format!("Unknown alias '{}'", selection.alias)))?
            };
            selections.push((selection, column_of(table, &selection.column)?));
        }

        let mut result = Vec::new();
        for row in root.rows() {
            if let Some((position, value)) = filter
                && &row[position] != value
            {
                continue;
            }

            let mut matched: HashMap<&str, Option<&Row>> = HashMap::new();
            for (alias, remote, local, remote_column) in &joins {
                let key = &row[*local];
                let found = if key.is_null() {
                    None
                } else {
                    remote.rows().find(|r| &r[*remote_column] == key)
                };
                matched.insert(*alias, found);
            }

            let mut out = QueryRow::new();
            for (selection, position) in &selections {
                let value = if selection.alias == ROOT_ALIAS {
                    row[*position].clone()
                } else {
                    matched
                        .get(selection.alias.as_str())
                        .copied()
                        .flatten()
                        .map(|r| r[*position].clone())
                        .unwrap_or(Value::Null)
                };
                out.insert(&selection.alias, &selection.column, value);
            }
            result.push(out);
        }
        Ok(result)
    }
}
