use order_dispatch_types::{Customer, Driver, MonthKey, OrderId, DEFAULT_LOYALTY_THRESHOLD};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::locks::KeyedLocks;
use crate::rows::{self, counter_cols, CUSTOMERS_TABLE, DRIVERS_TABLE};
use crate::store::{RecordStore, Row};

/// Result of folding one order into an aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct CounterUpdate<T> {
    pub record: T,
    /// `false` when the order had already been counted
    pub counted: bool,
}

/// Customer and driver counters, upserted by phone.
///
/// Each phone has its own lock so an increment is a serialized
/// read-modify-write. Every increment carries the order that caused it and
/// is dropped when that order was the last one counted.
pub struct AggregateLedger {
    store: Arc<dyn RecordStore>,
    loyalty_threshold: u64,
    customer_locks: KeyedLocks,
    driver_locks: KeyedLocks,
}

impl AggregateLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_loyalty_threshold(store, DEFAULT_LOYALTY_THRESHOLD)
    }

    pub fn with_loyalty_threshold(store: Arc<dyn RecordStore>, loyalty_threshold: u64) -> Self {
        Self {
            store,
            loyalty_threshold: loyalty_threshold.max(1),
            customer_locks: KeyedLocks::new(),
            driver_locks: KeyedLocks::new(),
        }
    }

    pub fn loyalty_threshold(&self) -> u64 {
        self.loyalty_threshold
    }

    pub async fn record_customer_order(
        &self,
        phone: &str,
        name: &str,
        month: MonthKey,
        order_id: &OrderId,
    ) -> Result<CounterUpdate<Customer>, LedgerError> {
        let phone = phone.trim();
        let _guard = self.customer_locks.lock(phone).await;
        let threshold = self.loyalty_threshold;

        let existing = self
            .locate(CUSTOMERS_TABLE, phone, |row| {
                rows::decode_customer(row, threshold)
            })
            .await?;

        let update = match existing {
            None => {
                let customer =
                    Customer::first_order(phone, name.trim(), month, order_id.clone(), threshold);
                self.store
                    .append_row(CUSTOMERS_TABLE, rows::encode_customer(&customer))
                    .await?;
                CounterUpdate {
                    record: customer,
                    counted: true,
                }
            }
            Some((row_index, mut customer)) => {
                if !customer.record_order(name, month, order_id, threshold) {
                    debug!(phone, order_id = %order_id, "customer order already counted");
                    return Ok(CounterUpdate {
                        record: customer,
                        counted: false,
                    });
                }
                let row = rows::encode_customer(&customer);
                self.store
                    .update_row(
                        CUSTOMERS_TABLE,
                        row_index,
                        counter_cols::NAME,
                        row[counter_cols::NAME..].to_vec(),
                    )
                    .await?;
                CounterUpdate {
                    record: customer,
                    counted: true,
                }
            }
        };

        info!(
            phone,
            order_id = %order_id,
            lifetime = update.record.orders.lifetime,
            month_count = update.record.orders.current_month,
            tier = %update.record.loyalty_tier,
            "customer order counted"
        );
        Ok(update)
    }

    pub async fn record_driver_delivery(
        &self,
        phone: &str,
        name: &str,
        month: MonthKey,
        order_id: &OrderId,
    ) -> Result<CounterUpdate<Driver>, LedgerError> {
        let phone = phone.trim();
        let _guard = self.driver_locks.lock(phone).await;

        let existing = self
            .locate(DRIVERS_TABLE, phone, rows::decode_driver)
            .await?;

        let update = match existing {
            None => {
                let driver = Driver::first_delivery(phone, name.trim(), month, order_id.clone());
                self.store
                    .append_row(DRIVERS_TABLE, rows::encode_driver(&driver))
                    .await?;
                CounterUpdate {
                    record: driver,
                    counted: true,
                }
            }
            Some((row_index, mut driver)) => {
                if !driver.record_delivery(name, month, order_id) {
                    debug!(phone, order_id = %order_id, "driver delivery already counted");
                    return Ok(CounterUpdate {
                        record: driver,
                        counted: false,
                    });
                }
                let row = rows::encode_driver(&driver);
                self.store
                    .update_row(
                        DRIVERS_TABLE,
                        row_index,
                        counter_cols::NAME,
                        row[counter_cols::NAME..].to_vec(),
                    )
                    .await?;
                CounterUpdate {
                    record: driver,
                    counted: true,
                }
            }
        };

        info!(
            phone,
            order_id = %order_id,
            lifetime = update.record.deliveries.lifetime,
            month_count = update.record.deliveries.current_month,
            "driver delivery counted"
        );
        Ok(update)
    }

    pub async fn customer(&self, phone: &str) -> Result<Option<Customer>, LedgerError> {
        let threshold = self.loyalty_threshold;
        Ok(self
            .locate(CUSTOMERS_TABLE, phone.trim(), |row| {
                rows::decode_customer(row, threshold)
            })
            .await?
            .map(|(_, customer)| customer))
    }

    pub async fn driver(&self, phone: &str) -> Result<Option<Driver>, LedgerError> {
        Ok(self
            .locate(DRIVERS_TABLE, phone.trim(), rows::decode_driver)
            .await?
            .map(|(_, driver)| driver))
    }

    pub async fn customers(&self) -> Result<Vec<Customer>, LedgerError> {
        let threshold = self.loyalty_threshold;
        self.list(CUSTOMERS_TABLE, |row| rows::decode_customer(row, threshold))
            .await
    }

    pub async fn drivers(&self) -> Result<Vec<Driver>, LedgerError> {
        self.list(DRIVERS_TABLE, rows::decode_driver).await
    }

    async fn locate<T>(
        &self,
        table: &'static str,
        phone: &str,
        decode: impl Fn(&Row) -> Result<T, String>,
    ) -> Result<Option<(usize, T)>, LedgerError> {
        let table_rows = self.store.list_rows(table).await?;
        let Some((row_index, row)) = table_rows
            .iter()
            .enumerate()
            .rev()
            .find(|(_, row)| rows::key_of(row) == phone)
        else {
            return Ok(None);
        };

        decode(row)
            .map(|record| Some((row_index, record)))
            .map_err(|reason| LedgerError::CorruptRow {
                table,
                row_index,
                reason,
            })
    }

    async fn list<T>(
        &self,
        table: &'static str,
        decode: impl Fn(&Row) -> Result<T, String>,
    ) -> Result<Vec<T>, LedgerError> {
        let table_rows = self.store.list_rows(table).await?;
        Ok(table_rows
            .iter()
            .enumerate()
            .filter_map(|(row_index, row)| match decode(row) {
                Ok(record) => Some(record),
                Err(reason) => {
                    warn!(table, row_index, %reason, "skipping corrupt row");
                    None
                }
            })
            .collect())
    }
}
