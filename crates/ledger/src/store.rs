use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;

/// A table row: an ordered list of text cells
pub type Row = Vec<String>;

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Durable table abstraction the ledgers are built on.
///
/// This is the lowest common denominator of a spreadsheet-style
/// backend: read a whole table, append a row, overwrite a contiguous range of
/// cells in one row. There is no compare-and-swap and no atomicity across
/// calls; two concurrent `update_row` calls on the same cells both succeed and
/// the last one wins.
///
/// Row indexes are 0-based positions in the order returned by `list_rows`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows of `table`, in append order. Unknown tables are empty.
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    /// Append a row at the end of `table`, creating the table if needed
    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError>;

    /// Overwrite `values.len()` cells of row `row_index` starting at `start_column`
    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        (**self).list_rows(table).await
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        (**self).append_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        (**self)
            .update_row(table, row_index, start_column, values)
            .await
    }
}

/// Overwrite a cell range inside a row, padding with blanks when the range
/// runs past the current end of the row.
pub(crate) fn splice_cells(row: &mut Row, start_column: usize, values: Row) {
    let end = start_column + values.len();
    if row.len() < end {
        row.resize(end, String::new());
    }
    for (offset, value) in values.into_iter().enumerate() {
        row[start_column + offset] = value;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table (for testing)
    pub fn row_count(&self, table: &str) -> usize {
        self.read()
            .map(|tables| tables.get(table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Row>>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Row>>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self.read()?.get(table).cloned().unwrap_or_default())
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        self.write()?.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(row_index))
            .ok_or_else(|| StoreError::RowOutOfRange {
                table: table.to_string(),
                row_index,
            })?;
        splice_cells(row, start_column, values);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
