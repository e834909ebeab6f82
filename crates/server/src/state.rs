//! Shared handler state

use std::sync::Arc;
use std::time::Instant;

use order_dispatch_core::DispatchCore;
use order_dispatch_ledger::DeferredStore;
use order_dispatch_metrics::MetricsCollector;

pub type AppStateRef = Arc<AppState>;

pub struct AppState {
    pub core: DispatchCore,
    pub metrics: Arc<MetricsCollector>,
    /// The handle the backend gets installed into; health reports on it
    pub store: DeferredStore,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(core: DispatchCore, metrics: Arc<MetricsCollector>, store: DeferredStore) -> Self {
        Self {
            core,
            metrics,
            store,
            started_at: Instant::now(),
        }
    }
}
