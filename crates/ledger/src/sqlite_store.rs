use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row as _, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::error::StoreError;
use crate::store::{splice_cells, RecordStore, Row};

const CREATE_ROWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS record_rows (
    table_name TEXT NOT NULL,
    row_index INTEGER NOT NULL,
    cells TEXT NOT NULL,
    PRIMARY KEY (table_name, row_index)
)
"#;

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

/// SQLite-backed record store.
///
/// Each logical table row is one `record_rows` row holding its cells as a JSON
/// array. Updates read the row, splice the cell range and write it back in two
/// statements, matching the last-write-wins contract of [`RecordStore`].
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (or create) a database file
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}", db_path.as_ref().display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Private in-memory database (for testing).
    ///
    /// Every sqlite in-memory connection is its own database, so the pool is
    /// pinned to a single connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_ROWS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn decode_cells(raw: &str) -> Result<Row, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    fn encode_cells(row: &Row) -> Result<String, StoreError> {
        serde_json::to_string(row).map_err(|e| StoreError::SerializationError(e.to_string()))
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::DatabaseError(other.to_string()),
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let rows = sqlx::query(
            "SELECT cells FROM record_rows WHERE table_name = ? ORDER BY row_index ASC",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| Self::decode_cells(row.get::<String, _>("cells").as_str()))
            .collect()
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        let cells = Self::encode_cells(&row)?;
        sqlx::query(
            r#"
            INSERT INTO record_rows (table_name, row_index, cells)
            VALUES (
                ?,
                (SELECT COALESCE(MAX(row_index) + 1, 0) FROM record_rows WHERE table_name = ?),
                ?
            )
            "#,
        )
        .bind(table)
        .bind(table)
        .bind(&cells)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        let existing = sqlx::query(
            "SELECT cells FROM record_rows WHERE table_name = ? AND row_index = ?",
        )
        .bind(table)
        .bind(row_index as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::RowOutOfRange {
            table: table.to_string(),
            row_index,
        })?;

        let mut cells = Self::decode_cells(existing.get::<String, _>("cells").as_str())?;
        splice_cells(&mut cells, start_column, values);

        sqlx::query("UPDATE record_rows SET cells = ? WHERE table_name = ? AND row_index = ?")
            .bind(Self::encode_cells(&cells)?)
            .bind(table)
            .bind(row_index as i64)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_append_list_update() {
        let store = SqliteRecordStore::in_memory().await.unwrap();

        store.append_row("orders", row(&["o-1", "New"])).await.unwrap();
        store.append_row("orders", row(&["o-2", "New"])).await.unwrap();
        store.append_row("drivers", row(&["D1"])).await.unwrap();

        store
            .update_row("orders", 1, 1, row(&["Claimed", "D1"]))
            .await
            .unwrap();

        let orders = store.list_rows("orders").await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0], row(&["o-1", "New"]));
        assert_eq!(orders[1], row(&["o-2", "Claimed", "D1"]));

        assert_eq!(store.list_rows("drivers").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        let result = store.update_row("orders", 0, 0, row(&["x"])).await;
        assert!(matches!(result, Err(StoreError::RowOutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.db");

        {
            let store = SqliteRecordStore::new(&path).await.unwrap();
            store.append_row("orders", row(&["o-1"])).await.unwrap();
        }

        let reopened = SqliteRecordStore::new(&path).await.unwrap();
        assert_eq!(reopened.list_rows("orders").await.unwrap(), vec![row(&["o-1"])]);
    }
}
