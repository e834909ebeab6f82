use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{MonthKey, OrderId};

/// Lifetime and current-month tally with calendar rollover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCounter {
    pub lifetime: u64,
    pub current_month: u64,
    pub last_active_month: MonthKey,
}

impl MonthlyCounter {
    /// Counter after its very first event
    pub fn first(month: MonthKey) -> Self {
        Self {
            lifetime: 1,
            current_month: 1,
            last_active_month: month,
        }
    }

    /// Count one more event in `month`.
    ///
    /// The monthly tally restarts at 1 whenever `month` differs from the last
    /// active month; the lifetime tally always grows.
    pub fn record(&mut self, month: MonthKey) {
        self.lifetime += 1;
        if self.last_active_month == month {
            self.current_month += 1;
        } else {
            self.current_month = 1;
            self.last_active_month = month;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Regular,
    Loyal,
}

impl LoyaltyTier {
    /// Tier for a monthly order count
    pub fn for_count(current_month_orders: u64, threshold: u64) -> Self {
        if current_month_orders >= threshold {
            LoyaltyTier::Loyal
        } else {
            LoyaltyTier::Regular
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyTier::Regular => "regular",
            LoyaltyTier::Loyal => "loyal",
        }
    }
}

impl FromStr for LoyaltyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(LoyaltyTier::Regular),
            "loyal" => Ok(LoyaltyTier::Loyal),
            other => Err(format!("unknown loyalty tier: {other}")),
        }
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer aggregate, keyed by phone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub phone: String,
    /// Last known name
    pub name: String,
    pub orders: MonthlyCounter,
    pub loyalty_tier: LoyaltyTier,
    /// Last order folded into the counters, used to drop repeated increments
    pub last_counted_order: Option<OrderId>,
}

impl Customer {
    pub fn first_order(
        phone: impl Into<String>,
        name: impl Into<String>,
        month: MonthKey,
        order_id: OrderId,
        loyalty_threshold: u64,
    ) -> Self {
        let orders = MonthlyCounter::first(month);
        Self {
            phone: phone.into(),
            name: name.into(),
            loyalty_tier: LoyaltyTier::for_count(orders.current_month, loyalty_threshold),
            orders,
            last_counted_order: Some(order_id),
        }
    }

    /// Fold one order into the counters.
    ///
    /// Returns `false` without touching anything when `order_id` was already
    /// the last order counted.
    pub fn record_order(
        &mut self,
        name: &str,
        month: MonthKey,
        order_id: &OrderId,
        loyalty_threshold: u64,
    ) -> bool {
        if self.last_counted_order.as_ref() == Some(order_id) {
            return false;
        }
        if !name.trim().is_empty() {
            self.name = name.trim().to_string();
        }
        self.orders.record(month);
        self.loyalty_tier = LoyaltyTier::for_count(self.orders.current_month, loyalty_threshold);
        self.last_counted_order = Some(order_id.clone());
        true
    }
}

/// Driver aggregate, keyed by phone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub phone: String,
    pub name: String,
    pub deliveries: MonthlyCounter,
    pub last_counted_order: Option<OrderId>,
}

impl Driver {
    pub fn first_delivery(
        phone: impl Into<String>,
        name: impl Into<String>,
        month: MonthKey,
        order_id: OrderId,
    ) -> Self {
        Self {
            phone: phone.into(),
            name: name.into(),
            deliveries: MonthlyCounter::first(month),
            last_counted_order: Some(order_id),
        }
    }

    /// Same contract as [`Customer::record_order`], for deliveries
    pub fn record_delivery(&mut self, name: &str, month: MonthKey, order_id: &OrderId) -> bool {
        if self.last_counted_order.as_ref() == Some(order_id) {
            return false;
        }
        if !name.trim().is_empty() {
            self.name = name.trim().to_string();
        }
        self.deliveries.record(month);
        self.last_counted_order = Some(order_id.clone());
        true
    }
}
