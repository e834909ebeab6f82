pub mod aggregates;
pub mod deferred;
pub mod error;
pub mod locks;
pub mod orders;
pub mod retry;
pub mod rows;
pub mod sqlite_store;
pub mod store;

pub use aggregates::{AggregateLedger, CounterUpdate};
pub use deferred::DeferredStore;
pub use error::*;
pub use locks::{KeyGuard, KeyedLocks};
pub use orders::OrderLedger;
pub use retry::{RetryPolicy, RetryingStore};
pub use rows::{CUSTOMERS_TABLE, DRIVERS_TABLE, ORDERS_TABLE};
pub use sqlite_store::SqliteRecordStore;
pub use store::{InMemoryRecordStore, RecordStore, Row};
