//! Order dispatch
//!
//! Takes delivery orders from several intake channels, broadcasts them to a
//! driver roster and tracks each order through claim and delivery on top of a
//! plain table store. Customer and driver counters roll over by calendar
//! month.
//!
//! ```no_run
//! use order_dispatch::core::{DispatchCore, LogSender};
//! use order_dispatch::ledger::InMemoryRecordStore;
//! use std::sync::Arc;
//!
//! let core = DispatchCore::builder()
//!     .with_store(Arc::new(InMemoryRecordStore::new()))
//!     .with_notifier(Arc::new(LogSender))
//!     .build()
//!     .unwrap();
//! # drop(core);
//! ```

pub use order_dispatch_channels as channels;
pub use order_dispatch_core as core;
pub use order_dispatch_ledger as ledger;
pub use order_dispatch_types as types;
