use crate::core::{Column, IndexSchema, Result, Row, TableSchema};
use crate::query::{Query, QueryRow};

/// Storage engine trait - allows pluggable storage backends
///
/// Rows are addressed by the object id held in their `id` column. Every
/// write applies all columns of a row or none of them.
pub trait StorageEngine: Send + Sync {
    /// Create a new table with the given schema
    fn create_table(&mut self, schema: TableSchema) -> Result<()>;

    /// Append a column to an existing table
    fn add_column(&mut self, table: &str, column: Column) -> Result<()>;

    /// Create an index on an existing table
    fn create_index(&mut self, table: &str, index: IndexSchema) -> Result<()>;

    /// Check if a table exists
    fn table_exists(&self, table: &str) -> bool;

    fn column_exists(&self, table: &str, column: &str) -> bool;

    fn index_exists(&self, table: &str, index: &str) -> bool;

    /// Get the schema for a table
    fn get_schema(&self, table: &str) -> Result<TableSchema>;

    /// Insert a row into a table
    fn insert_row(&mut self, table: &str, row: Row) -> Result<()>;

    /// Replace the row of object `id`
    fn update_row(&mut self, table: &str, id: &str, row: Row) -> Result<()>;

    fn delete_row(&mut self, table: &str, id: &str) -> Result<()>;

    /// Fetch the row of object `id`
    fn fetch_row(&self, table: &str, id: &str) -> Result<Option<Row>>;

    /// Scan all rows in a table
    fn scan_table(&self, table: &str) -> Result<Vec<Row>>;

    /// Get table row count
    fn row_count(&self, table: &str) -> Result<usize>;

    fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<()> {
        for row in rows {
            self.insert_row(table, row)?;
        }
        Ok(())
    }

    /// Rows as `(object id, row)` pairs
    fn update_rows(&mut self, table: &str, rows: Vec<(String, Row)>) -> Result<()> {
        for (id, row) in rows {
            self.update_row(table, &id, row)?;
        }
        Ok(())
    }

    fn delete_rows(&mut self, table: &str, ids: &[String]) -> Result<()> {
        for id in ids {
            self.delete_row(table, id)?;
        }
        Ok(())
    }
}

/// Executes join/alias trees composed by object definitions.
pub trait QueryEngine: Send + Sync {
    fn run_query(&self, query: &Query) -> Result<Vec<QueryRow>>;
}
