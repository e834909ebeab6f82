use chrono::{DateTime, Utc};
use order_dispatch_types::{
    Order, OrderId, OrderRequest, OrderStatus, RejectReason, TransitionOutcome,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::locks::KeyedLocks;
use crate::rows::{self, order_cols, ORDERS_TABLE};
use crate::store::RecordStore;

/// Order lifecycle on top of a [`RecordStore`].
///
/// Claims, deliveries, releases and enrichment of one order are serialized
/// through a per-order lock that is held across the read and the write, so
/// the second of two racing callers always sees the first caller's write.
/// Different orders never contend.
pub struct OrderLedger {
    store: Arc<dyn RecordStore>,
    locks: KeyedLocks,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Append a fresh `New` order. The request is assumed validated.
    pub async fn create(
        &self,
        request: OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, LedgerError> {
        let order = Order::from_request(OrderId::generate(), request, now);
        self.store
            .append_row(ORDERS_TABLE, rows::encode_order(&order))
            .await?;

        info!(
            order_id = %order.id,
            channel = %order.channel,
            "order created"
        );
        Ok(order)
    }

    pub async fn lookup(&self, id: &OrderId) -> Result<Order, LedgerError> {
        self.locate(id).await.map(|(_, order)| order)
    }

    /// All orders in store order. Rows that fail to decode are skipped.
    pub async fn list(&self) -> Result<Vec<Order>, LedgerError> {
        let table = self.store.list_rows(ORDERS_TABLE).await?;
        let orders = table
            .iter()
            .enumerate()
            .filter_map(|(row_index, row)| match rows::decode_order(row) {
                Ok(order) => Some(order),
                Err(reason) => {
                    warn!(row_index, %reason, "skipping corrupt order row");
                    None
                }
            })
            .collect();
        Ok(orders)
    }

    /// `New -> Claimed`, or an idempotent re-claim by the current holder
    pub async fn claim(
        &self,
        id: &OrderId,
        driver: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LedgerError> {
        let _guard = self.locks.lock(id.as_str()).await;
        let (row_index, mut order) = self.locate(id).await?;

        match order.status {
            OrderStatus::Claimed if order.is_claimed_by(driver) => {
                debug!(order_id = %id, driver, "repeated claim by holder");
                return Ok(TransitionOutcome::Accepted {
                    order,
                    replay: true,
                });
            }
            OrderStatus::Claimed => return Ok(reject(order, RejectReason::AlreadyClaimed, driver)),
            status if status.is_terminal() => {
                return Ok(reject(order, RejectReason::AlreadyDelivered, driver))
            }
            _ => {}
        }

        order.status = OrderStatus::Claimed;
        order.claimed_by = Some(driver.to_string());
        order.claimed_at = Some(now);
        self.write_lifecycle(row_index, &order).await?;

        info!(order_id = %id, driver, "order claimed");
        Ok(TransitionOutcome::Accepted {
            order,
            replay: false,
        })
    }

    /// `Claimed -> Delivered` for any driver, or `New -> Delivered` directly.
    ///
    /// The delivering driver becomes the claim holder as well, so
    /// `claimed_by` and `delivery_driver_phone` always agree on a delivered
    /// order. A repeated confirmation from the delivering driver is accepted
    /// as a replay and writes nothing.
    pub async fn mark_delivered(
        &self,
        id: &OrderId,
        driver: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LedgerError> {
        let _guard = self.locks.lock(id.as_str()).await;
        let (row_index, mut order) = self.locate(id).await?;

        if order.status.is_terminal() {
            if order.is_delivered_by(driver) {
                debug!(order_id = %id, driver, "repeated delivery confirmation");
                return Ok(TransitionOutcome::Accepted {
                    order,
                    replay: true,
                });
            }
            return Ok(reject(order, RejectReason::AlreadyDeliveredByOther, driver));
        }

        if !order.is_claimed_by(driver) {
            if let Some(holder) = order.claimed_by.as_deref() {
                info!(
                    order_id = %id,
                    driver,
                    holder,
                    "delivered by a driver other than the claimer"
                );
            }
            order.claimed_by = Some(driver.to_string());
            order.claimed_at = Some(now);
        }

        order.status = OrderStatus::Delivered;
        order.delivered_at = Some(now);
        order.delivery_driver_phone = Some(driver.to_string());
        order.delivery_note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.write_lifecycle(row_index, &order).await?;

        info!(order_id = %id, driver, "order delivered");
        Ok(TransitionOutcome::Accepted {
            order,
            replay: false,
        })
    }

    /// `Claimed -> New`, only for the driver holding the claim.
    ///
    /// Never reached by the normal flow; it keeps the reverse edge of the
    /// state machine representable for operators.
    pub async fn release_claim(
        &self,
        id: &OrderId,
        driver: &str,
    ) -> Result<TransitionOutcome, LedgerError> {
        let _guard = self.locks.lock(id.as_str()).await;
        let (row_index, mut order) = self.locate(id).await?;

        match order.status {
            OrderStatus::Claimed if order.is_claimed_by(driver) => {}
            OrderStatus::New => {
                return Ok(TransitionOutcome::Accepted {
                    order,
                    replay: true,
                })
            }
            OrderStatus::Claimed => return Ok(reject(order, RejectReason::AlreadyClaimed, driver)),
            status if status.is_terminal() => {
                return Ok(reject(order, RejectReason::AlreadyDelivered, driver))
            }
            _ => {}
        }

        order.status = OrderStatus::New;
        order.claimed_by = None;
        order.claimed_at = None;
        self.store
            .update_row(
                ORDERS_TABLE,
                row_index,
                order_cols::STATUS,
                rows::encode_lifecycle(&order)[..3].to_vec(),
            )
            .await?;

        info!(order_id = %id, driver, "claim released");
        Ok(TransitionOutcome::Accepted {
            order,
            replay: false,
        })
    }

    /// Fill the audio reference and transcript if they are still empty.
    ///
    /// Values already present are kept; the returned order shows what is
    /// stored afterwards.
    pub async fn attach_enrichment(
        &self,
        id: &OrderId,
        audio_url: Option<String>,
        transcript: Option<String>,
    ) -> Result<Order, LedgerError> {
        let _guard = self.locks.lock(id.as_str()).await;
        let (row_index, mut order) = self.locate(id).await?;

        let mut changed = false;
        if let Some(url) = non_blank(audio_url) {
            if order.audio_url.is_none() {
                order.audio_url = Some(url);
                changed = true;
            }
        }
        if let Some(text) = non_blank(transcript) {
            if order.transcript.is_none() {
                order.transcript = Some(text);
                changed = true;
            }
        }

        if changed {
            let cells = vec![
                order.audio_url.clone().unwrap_or_default(),
                order.transcript.clone().unwrap_or_default(),
            ];
            self.store
                .update_row(ORDERS_TABLE, row_index, order_cols::AUDIO_URL, cells)
                .await?;
            info!(order_id = %id, "order enriched");
        }
        Ok(order)
    }

    /// Most recent row carrying `id`, with its index
    async fn locate(&self, id: &OrderId) -> Result<(usize, Order), LedgerError> {
        let table = self.store.list_rows(ORDERS_TABLE).await?;
        let (row_index, row) = table
            .iter()
            .enumerate()
            .rev()
            .find(|(_, row)| rows::key_of(row) == id.as_str())
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;

        let order = rows::decode_order(row).map_err(|reason| LedgerError::CorruptRow {
            table: ORDERS_TABLE,
            row_index,
            reason,
        })?;
        Ok((row_index, order))
    }

    async fn write_lifecycle(&self, row_index: usize, order: &Order) -> Result<(), LedgerError> {
        self.store
            .update_row(
                ORDERS_TABLE,
                row_index,
                order_cols::STATUS,
                rows::encode_lifecycle(order),
            )
            .await?;
        Ok(())
    }
}

fn reject(order: Order, reason: RejectReason, driver: &str) -> TransitionOutcome {
    info!(order_id = %order.id, driver, %reason, "transition rejected");
    TransitionOutcome::Rejected { order, reason }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
