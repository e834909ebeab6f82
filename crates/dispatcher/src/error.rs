use order_dispatch_ledger::LedgerError;
use order_dispatch_types::OrderId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl DispatchError {
    pub fn missing_fields(fields: &[&str]) -> Self {
        DispatchError::MalformedRequest(format!("missing required fields: {}", fields.join(", ")))
    }
}

impl From<LedgerError> for DispatchError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => DispatchError::NotFound(id),
            LedgerError::StoreUnavailable(msg) => DispatchError::StoreUnavailable(msg),
            other => DispatchError::Ledger(other),
        }
    }
}

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
}
