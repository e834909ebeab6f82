use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::error::StoreError;
use crate::store::{RecordStore, Row};

/// Bounds for retrying store reads.
///
/// Pauses double from `initial_delay` on every retry and stay at
/// `max_delay` once they reach it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Pause before retry number `retry`, counting from 1
    pub fn delay_for(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay)
    }

    /// Every pause the policy allows, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts.max(1)).map(move |retry| self.delay_for(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Store decorator that retries transient read failures.
///
/// Only `list_rows` is retried. Appends and updates go through exactly once:
/// a write whose acknowledgement was lost may still have landed, and replaying
/// it blindly would duplicate a row or clobber a newer value. Callers that
/// need to retry a write must re-read state first.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RecordStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for RetryingStore<S> {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let mut pauses = self.policy.delays();
        let mut attempt = 1;

        loop {
            let error = match self.inner.list_rows(table).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };
            let Some(delay) = pauses.next() else {
                return Err(error);
            };
            warn!(
                table = %table,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "store read failed, retrying"
            );
            attempt += 1;
            tokio::time::sleep(delay).await;
        }
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        self.inner.append_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        self.inner
            .update_row(table, row_index, start_column, values)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls of every operation
    struct FlakyStore {
        inner: InMemoryRecordStore,
        failures: u32,
        reads: AtomicU32,
        writes: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryRecordStore::new(),
                failures,
                reads: AtomicU32::new(0),
                writes: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(StoreError::Unavailable("flaky".to_string()));
            }
            self.inner.list_rows(table).await
        }

        async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
            if self.writes.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(StoreError::Unavailable("flaky".to_string()));
            }
            self.inner.append_row(table, row).await
        }

        async fn update_row(
            &self,
            table: &str,
            row_index: usize,
            start_column: usize,
            values: Row,
        ) -> Result<(), StoreError> {
            self.inner
                .update_row(table, row_index, start_column, values)
                .await
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_delays_double_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        let delays: Vec<_> = policy.delays().map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_single_attempt_never_pauses() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delays().count(), 0);

        let zero = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(zero.delays().count(), 0);
    }

    #[test]
    fn test_late_retries_do_not_overflow() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_read_recovers_after_transient_failures() {
        let store = RetryingStore::new(FlakyStore::new(2), fast_policy(3));
        assert!(store.list_rows("orders").await.unwrap().is_empty());
        assert_eq!(store.inner().reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_gives_up_after_max_attempts() {
        let store = RetryingStore::new(FlakyStore::new(5), fast_policy(3));
        let result = store.list_rows("orders").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.inner().reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_writes_are_not_retried() {
        let store = RetryingStore::new(FlakyStore::new(1), fast_policy(5));
        let result = store.append_row("orders", vec!["o-1".to_string()]).await;
        assert!(result.is_err());
        assert_eq!(store.inner().writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner().inner.row_count("orders"), 0);
    }
}
