use order_dispatch_types::OrderId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("row {row_index} out of range for table {table}")]
    RowOutOfRange { table: String, row_index: usize },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl StoreError {
    /// Failures worth retrying on a read
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::ConnectionError(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("corrupt row {row_index} in table {table}: {reason}")]
    CorruptRow {
        table: &'static str,
        row_index: usize,
        reason: String,
    },

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) | StoreError::ConnectionError(msg) => {
                LedgerError::StoreUnavailable(msg)
            }
            other => LedgerError::Store(other),
        }
    }
}
