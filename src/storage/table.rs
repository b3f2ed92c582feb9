use crate::core::{Column, EngineError, ID_COLUMN, IndexSchema, Result, Row, TableSchema, Value};
use std::collections::{BTreeMap, HashMap};

/// Rows of one table, addressed by object id.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<usize, Row>,
    next_row_id: usize,
    ids: HashMap<String, usize>,
    /// Index name -> key -> row ids
    indexes: HashMap<String, HashMap<Vec<Value>, Vec<usize>>>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Result<Self> {
        if schema.find_column_index(ID_COLUMN).is_none() {
            return Err(EngineError::Storage(format!(
                "Table '{}' has no '{}' column",
                schema.name(),
                ID_COLUMN
            )));
        }
        let mut table = Self {
            schema: TableSchema::new(schema.name()),
            rows: BTreeMap::new(),
            next_row_id: 0,
            ids: HashMap::new(),
            indexes: HashMap::new(),
        };
        for column in schema.columns() {
            table.schema.add_column(column.clone())?;
        }
        for index in schema.indexes() {
            table.create_index(index.clone())?;
        }
        Ok(table)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn object_id(&self, row: &Row) -> Result<String> {
        let position = self.schema.find_column_index(ID_COLUMN).unwrap_or(0);
        match row.get(position) {
            Some(Value::Text(id)) => Ok(id.clone()),
            _ => Err(EngineError::Storage(format!(
                "Row of '{}' has no object id",
                self.schema.name()
            ))),
        }
    }

    pub fn insert(&mut self, row: Row) -> Result<usize> {
        self.schema.validate_row(&row)?;
        let id = self.object_id(&row)?;
        self.check_uniqueness(&row, None)?;

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.update_indexes(row_id, &row);
        self.ids.insert(id, row_id);
        self.rows.insert(row_id, row);
        Ok(row_id)
    }

    pub fn update(&mut self, id: &str, new_row: Row) -> Result<()> {
        self.schema.validate_row(&new_row)?;
        let row_id = self.row_id(id)?;
        if self.object_id(&new_row)? != id {
            return Err(EngineError::Storage(format!(
                "Update of '{}' in '{}' changes the object id",
                id,
                self.schema.name()
            )));
        }
        self.check_uniqueness(&new_row, Some(row_id))?;

        if let Some(old) = self.rows.insert(row_id, new_row.clone()) {
            self.remove_from_indexes(row_id, &old);
        }
        self.update_indexes(row_id, &new_row);
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        let row_id = self.row_id(id)?;
        self.ids.remove(id);
        if let Some(old) = self.rows.remove(&row_id) {
            self.remove_from_indexes(row_id, &old);
        }
        Ok(())
    }

    fn row_id(&self, id: &str) -> Result<usize> {
        self.ids.get(id).copied().ok_or_else(|| {
            EngineError::ObjectNotFound(format!("{} {}", self.schema.name(), id))
        })
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.ids.get(id).and_then(|row_id| self.rows.get(row_id))
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn scan(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Validates a batch as if inserted one after the other, without writing.
    pub fn check_insert_batch(&self, rows: &[Row]) -> Result<()> {
        let mut scratch = self.clone();
        for row in rows {
            scratch.insert(row.clone())?;
        }
        Ok(())
    }

    /// Appends a column; existing rows get `NULL`.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if !column.nullable && !self.rows.is_empty() {
            return Err(EngineError::Storage(format!(
                "Cannot add NOT NULL column '{}' to non-empty table '{}'",
                column.name,
                self.schema.name()
            )));
        }
        self.schema.add_column(column)?;
        for row in self.rows.values_mut() {
            row.push(Value::Null);
        }
        Ok(())
    }

    pub fn create_index(&mut self, index: IndexSchema) -> Result<()> {
        if self.indexes.contains_key(&index.name) {
            return Ok(());
        }
        let positions = self.positions(&index)?;
        let mut entries: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
        for (row_id, row) in &self.rows {
            let key: Vec<Value> = positions.iter().map(|&p| row[p].clone()).collect();
            let ids = entries.entry(key).or_default();
            if index.unique && !ids.is_empty() {
                return Err(EngineError::Storage(format!(
                    "Cannot create unique index '{}': duplicate values in '{}'",
                    index.name,
                    self.schema.name()
                )));
            }
            ids.push(*row_id);
        }
        self.schema.add_index(index.clone())?;
        self.indexes.insert(index.name, entries);
        Ok(())
    }

    fn positions(&self, index: &IndexSchema) -> Result<Vec<usize>> {
        index
            .columns
            .iter()
            .map(|column| {
                self.schema.find_column_index(column).ok_or_else(|| {
                    EngineError::FieldNotFound(column.clone(), self.schema.name().to_string())
                })
            })
            .collect()
    }

    fn check_uniqueness(&self, row: &Row, ignore: Option<usize>) -> Result<()> {
        for index in self.schema.indexes().iter().filter(|i| i.unique) {
            let positions = self.positions(index)?;
            let key: Vec<Value> = positions.iter().map(|&p| row[p].clone()).collect();
            if key.iter().any(Value::is_null) {
                continue;
            }
            let taken = self
                .indexes
                .get(&index.name)
                .and_then(|entries| entries.get(&key))
                .is_some_and(|ids| ids.iter().any(|id| Some(*id) != ignore));
            if taken {
                return Err(EngineError::Storage(format!(
                    "Unique constraint violation: index '{}' already contains {:?}",
                    index.name, key
                )));
            }
        }
        Ok(())
    }

    fn update_indexes(&mut self, row_id: usize, row: &Row) {
        for index in self.schema.indexes() {
            let Ok(positions) = self.positions(index) else {
                continue;
            };
            let key: Vec<Value> = positions.iter().map(|&p| row[p].clone()).collect();
            if let Some(entries) = self.indexes.get_mut(&index.name) {
                entries.entry(key).or_default().push(row_id);
            }
        }
    }

    fn remove_from_indexes(&mut self, row_id: usize, row: &Row) {
        for index in self.schema.indexes() {
            let Ok(positions) = self.positions(index) else {
                continue;
            };
            let key: Vec<Value> = positions.iter().map(|&p| row[p].clone()).collect();
            if let Some(ids) = self.indexes.get_mut(&index.name).and_then(|e| e.get_mut(&key)) {
                ids.retain(|&x| x != row_id);
            }
        }
    }
}
