use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::StoreError;
use crate::store::{RecordStore, Row};

/// Store handle that exists before its backend does.
///
/// The process can start serving while the real backend connects in the
/// background. Until [`DeferredStore::install`] succeeds every operation
/// reports [`StoreError::Unavailable`].
#[derive(Clone, Default)]
pub struct DeferredStore {
    backend: Arc<OnceCell<Arc<dyn RecordStore>>>,
}

impl DeferredStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the backend. Only the first call wins.
    pub fn install(&self, backend: Arc<dyn RecordStore>) -> Result<(), StoreError> {
        self.backend
            .set(backend)
            .map_err(|_| StoreError::DatabaseError("record store already installed".to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.backend.initialized()
    }

    fn backend(&self) -> Result<&Arc<dyn RecordStore>, StoreError> {
        self.backend
            .get()
            .ok_or_else(|| StoreError::Unavailable("record store not initialized".to_string()))
    }
}

#[async_trait]
impl RecordStore for DeferredStore {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.backend()?.list_rows(table).await
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        self.backend()?.append_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        self.backend()?
            .update_row(table, row_index, start_column, values)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;

    #[tokio::test]
    async fn test_unavailable_until_installed() {
        let store = DeferredStore::new();
        assert!(!store.is_ready());
        assert!(matches!(
            store.list_rows("orders").await,
            Err(StoreError::Unavailable(_))
        ));

        store.install(Arc::new(InMemoryRecordStore::new())).unwrap();
        assert!(store.is_ready());
        assert!(store.list_rows("orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_install_is_refused() {
        let store = DeferredStore::new();
        store.install(Arc::new(InMemoryRecordStore::new())).unwrap();
        assert!(store.install(Arc::new(InMemoryRecordStore::new())).is_err());
    }

    #[tokio::test]
    async fn test_clones_see_installation() {
        let store = DeferredStore::new();
        let handle = store.clone();
        store.install(Arc::new(InMemoryRecordStore::new())).unwrap();
        handle.append_row("orders", vec!["o-1".to_string()]).await.unwrap();
        assert_eq!(store.list_rows("orders").await.unwrap().len(), 1);
    }
}
