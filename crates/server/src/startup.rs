//! Wiring from configuration to a running dispatch core

use std::sync::Arc;

use anyhow::Context;
use order_dispatch_config::{
    AppConfig, DriverEntry, NotifierConfig, NotifierKind, StoreBackend, StoreConfig,
};
use order_dispatch_core::{
    DispatchCore, DriverContact, DriverRoster, LogSender, NotificationSender, WebhookSender,
};
use order_dispatch_ledger::{
    DeferredStore, InMemoryRecordStore, RecordStore, RetryPolicy, RetryingStore,
    SqliteRecordStore, StoreError,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The store handle handlers use, plus the slot its backend lands in.
///
/// Reads through the handle are retried, so requests that arrive while the
/// backend is still connecting wait out a few backoff rounds before failing.
pub fn build_store(config: &StoreConfig) -> (Arc<dyn RecordStore>, DeferredStore) {
    let deferred = DeferredStore::new();
    let store: Arc<dyn RecordStore> =
        Arc::new(RetryingStore::new(deferred.clone(), retry_policy(config)));
    (store, deferred)
}

fn retry_policy(config: &StoreConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.read_retries,
        initial_delay: config.retry_initial_delay(),
        max_delay: config.retry_max_delay(),
    }
}

/// Connect the configured backend in the background and install it once up
pub fn spawn_store_init(config: StoreConfig, deferred: DeferredStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        let policy = retry_policy(&config);

        for attempt in 1.. {
            match connect(&config).await {
                Ok(backend) => {
                    match deferred.install(backend) {
                        Ok(()) => info!(backend = ?config.backend, "record store ready"),
                        Err(e) => warn!(error = %e, "record store install skipped"),
                    }
                    return;
                }
                Err(e) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        backend = ?config.backend,
                        attempt,
                        ?delay,
                        error = %e,
                        "record store not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    })
}

async fn connect(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryRecordStore::new())),
        StoreBackend::Sqlite => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| StoreError::ConnectionError("store.path is not set".to_string()))?;
            Ok(Arc::new(SqliteRecordStore::new(path).await?))
        }
    }
}

pub fn build_notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogSender)),
        NotifierKind::Webhook => {
            let endpoint = config
                .endpoint
                .as_deref()
                .context("notifier.endpoint is required by the webhook notifier")?;
            Ok(Arc::new(WebhookSender::new(endpoint, config.timeout())?))
        }
    }
}

pub fn build_roster(drivers: &[DriverEntry]) -> DriverRoster {
    DriverRoster::new(
        drivers
            .iter()
            .map(|d| DriverContact::new(d.phone.as_str(), d.name.as_str())),
    )
}

pub fn build_core(
    config: &AppConfig,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn NotificationSender>,
) -> anyhow::Result<DispatchCore> {
    let core = DispatchCore::builder()
        .with_store(store)
        .with_notifier(notifier)
        .with_roster(build_roster(&config.drivers))
        .with_loyalty_threshold(config.dispatch.loyalty_threshold)
        .build()?;
    Ok(core)
}
