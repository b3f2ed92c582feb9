use super::StorageEngine;
use crate::core::{Result, TableSchema};
use tracing::{Level, event};

/// Brings `storage` up to `schema`: creates the table if missing, else the
/// missing columns and indexes. Never drops anything.
///
/// Returns the number of tables, columns and indexes created.
pub fn provision(storage: &mut dyn StorageEngine, schema: &TableSchema) -> Result<usize> {
    let table = schema.name();
    if !storage.table_exists(table) {
        storage.create_table(schema.clone())?;
        event!(Level::INFO, table = %table, "table created");
        return Ok(1);
    }

    let mut created = 0;
    for column in schema.columns() {
        if !storage.column_exists(table, &column.name) {
            storage.add_column(table, column.clone())?;
            event!(Level::INFO, table = %table, column = %column.name, "column added");
            created += 1;
        }
    }
    for index in schema.indexes() {
        if !storage.index_exists(table, &index.name) {
            storage.create_index(table, index.clone())?;
            event!(Level::INFO, table = %table, index = %index.name, "index created");
            created += 1;
        }
    }
    Ok(created)
}
