//! Row layouts and codecs for the three ledger tables.
//!
//! Cells are plain text so the tables stay readable in a spreadsheet-style
//! backend. Timestamps are RFC 3339 in UTC, empty cells mean "unset".

use chrono::{DateTime, SecondsFormat, Utc};
use order_dispatch_types::{
    Channel, Customer, Driver, LoyaltyTier, MonthKey, MonthlyCounter, Order, OrderId, OrderStatus,
};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::store::Row;

pub const ORDERS_TABLE: &str = "orders";
pub const CUSTOMERS_TABLE: &str = "customers";
pub const DRIVERS_TABLE: &str = "drivers";

// ═══════════════════════════════════════════════════════════════════════════
// ORDERS
// ═══════════════════════════════════════════════════════════════════════════

pub mod order_cols {
    pub const ID: usize = 0;
    pub const CREATED_AT: usize = 1;
    pub const CHANNEL: usize = 2;
    pub const CUSTOMER_NAME: usize = 3;
    pub const CUSTOMER_PHONE: usize = 4;
    pub const ADDRESS: usize = 5;
    pub const ITEMS: usize = 6;
    pub const TOTAL: usize = 7;
    pub const AUDIO_URL: usize = 8;
    pub const TRANSCRIPT: usize = 9;
    pub const STATUS: usize = 10;
    pub const CLAIMED_BY: usize = 11;
    pub const CLAIMED_AT: usize = 12;
    pub const DELIVERED_AT: usize = 13;
    pub const DELIVERY_DRIVER: usize = 14;
    pub const DELIVERY_NOTE: usize = 15;
    pub const COUNT: usize = 16;
}

// ═══════════════════════════════════════════════════════════════════════════
// CUSTOMERS / DRIVERS
// ═══════════════════════════════════════════════════════════════════════════

/// Shared prefix of the customer and driver layouts
pub mod counter_cols {
    pub const PHONE: usize = 0;
    pub const NAME: usize = 1;
    pub const LIFETIME: usize = 2;
    pub const CURRENT_MONTH: usize = 3;
    pub const LAST_MONTH: usize = 4;
}

pub mod customer_cols {
    pub const LOYALTY_TIER: usize = 5;
    pub const LAST_ORDER: usize = 6;
    pub const COUNT: usize = 7;
}

pub mod driver_cols {
    pub const LAST_ORDER: usize = 5;
    pub const COUNT: usize = 6;
}

pub fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn opt_time(at: &Option<DateTime<Utc>>) -> String {
    at.as_ref().map(format_time).unwrap_or_default()
}

fn opt_text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn cell(row: &Row, index: usize) -> &str {
    row.get(index).map(|c| c.trim()).unwrap_or("")
}

fn opt_cell(row: &Row, index: usize) -> Option<String> {
    let value = cell(row, index);
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_time(row: &Row, index: usize) -> Result<Option<DateTime<Utc>>, String> {
    match cell(row, index) {
        "" => Ok(None),
        raw => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| format!("bad timestamp '{raw}' in column {index}: {e}")),
    }
}

fn parse_count(row: &Row, index: usize) -> Result<u64, String> {
    match cell(row, index) {
        "" => Ok(0),
        raw => raw
            .parse()
            .map_err(|_| format!("bad count '{raw}' in column {index}")),
    }
}

/// The id cell of a row, without decoding the rest
pub fn key_of(row: &Row) -> &str {
    cell(row, 0)
}

pub fn encode_order(order: &Order) -> Row {
    let mut row = vec![String::new(); order_cols::COUNT];
    row[order_cols::ID] = order.id.to_string();
    row[order_cols::CREATED_AT] = format_time(&order.created_at);
    row[order_cols::CHANNEL] = order.channel.to_string();
    row[order_cols::CUSTOMER_NAME] = order.customer_name.clone();
    row[order_cols::CUSTOMER_PHONE] = order.customer_phone.clone();
    row[order_cols::ADDRESS] = order.address.clone();
    row[order_cols::ITEMS] = order.items_payload.clone();
    row[order_cols::TOTAL] = order.total_amount.map(|t| t.to_string()).unwrap_or_default();
    row[order_cols::AUDIO_URL] = opt_text(&order.audio_url);
    row[order_cols::TRANSCRIPT] = opt_text(&order.transcript);
    let lifecycle = encode_lifecycle(order);
    row[order_cols::STATUS..order_cols::COUNT].clone_from_slice(&lifecycle);
    row
}

/// Cells `STATUS..=DELIVERY_NOTE`, the range every transition rewrites
pub fn encode_lifecycle(order: &Order) -> Row {
    vec![
        order.status.to_string(),
        opt_text(&order.claimed_by),
        opt_time(&order.claimed_at),
        opt_time(&order.delivered_at),
        opt_text(&order.delivery_driver_phone),
        opt_text(&order.delivery_note),
    ]
}

pub fn decode_order(row: &Row) -> Result<Order, String> {
    let id = cell(row, order_cols::ID);
    if id.is_empty() {
        return Err("missing order id".to_string());
    }

    let created_at = parse_time(row, order_cols::CREATED_AT)?
        .ok_or_else(|| "missing created_at".to_string())?;
    let channel = Channel::from_str(cell(row, order_cols::CHANNEL)).map_err(|e| e.to_string())?;
    let status = OrderStatus::from_str(cell(row, order_cols::STATUS)).map_err(|e| e.to_string())?;
    let total_amount = match cell(row, order_cols::TOTAL) {
        "" => None,
        raw => Some(Decimal::from_str(raw).map_err(|e| format!("bad total '{raw}': {e}"))?),
    };

    Ok(Order {
        id: OrderId::from(id),
        created_at,
        channel,
        customer_name: cell(row, order_cols::CUSTOMER_NAME).to_string(),
        customer_phone: cell(row, order_cols::CUSTOMER_PHONE).to_string(),
        address: cell(row, order_cols::ADDRESS).to_string(),
        items_payload: row
            .get(order_cols::ITEMS)
            .cloned()
            .unwrap_or_default(),
        total_amount,
        audio_url: opt_cell(row, order_cols::AUDIO_URL),
        transcript: opt_cell(row, order_cols::TRANSCRIPT),
        status,
        claimed_by: opt_cell(row, order_cols::CLAIMED_BY),
        claimed_at: parse_time(row, order_cols::CLAIMED_AT)?,
        delivered_at: parse_time(row, order_cols::DELIVERED_AT)?,
        delivery_driver_phone: opt_cell(row, order_cols::DELIVERY_DRIVER),
        delivery_note: opt_cell(row, order_cols::DELIVERY_NOTE),
    })
}

fn decode_counter(row: &Row) -> Result<MonthlyCounter, String> {
    let raw_month = cell(row, counter_cols::LAST_MONTH);
    let last_active_month = MonthKey::from_str(raw_month).map_err(|e| e.to_string())?;
    Ok(MonthlyCounter {
        lifetime: parse_count(row, counter_cols::LIFETIME)?,
        current_month: parse_count(row, counter_cols::CURRENT_MONTH)?,
        last_active_month,
    })
}

fn encode_counter(row: &mut Row, phone: &str, name: &str, counter: &MonthlyCounter) {
    row[counter_cols::PHONE] = phone.to_string();
    row[counter_cols::NAME] = name.to_string();
    row[counter_cols::LIFETIME] = counter.lifetime.to_string();
    row[counter_cols::CURRENT_MONTH] = counter.current_month.to_string();
    row[counter_cols::LAST_MONTH] = counter.last_active_month.to_string();
}

pub fn encode_customer(customer: &Customer) -> Row {
    let mut row = vec![String::new(); customer_cols::COUNT];
    encode_counter(&mut row, &customer.phone, &customer.name, &customer.orders);
    row[customer_cols::LOYALTY_TIER] = customer.loyalty_tier.to_string();
    row[customer_cols::LAST_ORDER] = customer
        .last_counted_order
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    row
}

/// Decode a customer row. The stored tier cell is informational only; the
/// tier is recomputed from the monthly count and the current threshold.
pub fn decode_customer(row: &Row, loyalty_threshold: u64) -> Result<Customer, String> {
    let phone = cell(row, counter_cols::PHONE);
    if phone.is_empty() {
        return Err("missing phone".to_string());
    }
    let orders = decode_counter(row)?;
    Ok(Customer {
        phone: phone.to_string(),
        name: cell(row, counter_cols::NAME).to_string(),
        loyalty_tier: LoyaltyTier::for_count(orders.current_month, loyalty_threshold),
        orders,
        last_counted_order: opt_cell(row, customer_cols::LAST_ORDER).map(OrderId::from),
    })
}

pub fn encode_driver(driver: &Driver) -> Row {
    let mut row = vec![String::new(); driver_cols::COUNT];
    encode_counter(&mut row, &driver.phone, &driver.name, &driver.deliveries);
    row[driver_cols::LAST_ORDER] = driver
        .last_counted_order
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    row
}

pub fn decode_driver(row: &Row) -> Result<Driver, String> {
    let phone = cell(row, counter_cols::PHONE);
    if phone.is_empty() {
        return Err("missing phone".to_string());
    }
    Ok(Driver {
        phone: phone.to_string(),
        name: cell(row, counter_cols::NAME).to_string(),
        deliveries: decode_counter(row)?,
        last_counted_order: opt_cell(row, driver_cols::LAST_ORDER).map(OrderId::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use order_dispatch_types::OrderRequest;

    fn sample_order() -> Order {
        let request = OrderRequest {
            name: "Ali".to_string(),
            phone: "0555".to_string(),
            address: "12 Palm Street".to_string(),
            items_payload: "[{\"sku\":\"falafel\",\"qty\":2}]".to_string(),
            total: Some(Decimal::new(1999, 2)),
            channel: Channel::Web,
            audio_ref: None,
        };
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Order::from_request(OrderId::from("o-1"), request, created)
    }

    #[test]
    fn test_claimed_order_survives_encoding() {
        let mut order = sample_order();
        order.status = OrderStatus::Claimed;
        order.claimed_by = Some("D1".to_string());
        order.claimed_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap());

        let row = encode_order(&order);
        assert_eq!(row.len(), order_cols::COUNT);
        assert_eq!(row[order_cols::STATUS], "Claimed");
        assert_eq!(decode_order(&row).unwrap(), order);
    }

    #[test]
    fn test_lifecycle_range_matches_layout() {
        let order = sample_order();
        let lifecycle = encode_lifecycle(&order);
        assert_eq!(
            lifecycle.len(),
            order_cols::DELIVERY_NOTE - order_cols::STATUS + 1
        );
    }

    #[test]
    fn test_short_row_decodes_with_blanks() {
        let row: Row = vec![
            "o-9".to_string(),
            "2024-06-01T12:00:00.000Z".to_string(),
            "voice".to_string(),
            "Unknown".to_string(),
            "+15550100".to_string(),
            String::new(),
            "Voice order".to_string(),
            String::new(),
            "/uploads/rec.mp3".to_string(),
            String::new(),
            "New".to_string(),
        ];
        let order = decode_order(&row).unwrap();
        assert_eq!(order.channel, Channel::Voice);
        assert_eq!(order.claimed_by, None);
        assert_eq!(order.audio_url.as_deref(), Some("/uploads/rec.mp3"));
    }

    #[test]
    fn test_corrupt_status_is_reported() {
        let mut row = encode_order(&sample_order());
        row[order_cols::STATUS] = "Lost".to_string();
        assert!(decode_order(&row).is_err());
    }

    #[test]
    fn test_customer_tier_recomputed_on_decode() {
        let month: MonthKey = "2024-06".parse().unwrap();
        let mut customer = Customer::first_order("0555", "Ali", month, OrderId::from("o-1"), 5);
        customer.orders.current_month = 3;
        let row = encode_customer(&customer);

        assert_eq!(decode_customer(&row, 5).unwrap().loyalty_tier, LoyaltyTier::Regular);
        assert_eq!(decode_customer(&row, 3).unwrap().loyalty_tier, LoyaltyTier::Loyal);
    }

    #[test]
    fn test_driver_row() {
        let month: MonthKey = "2024-06".parse().unwrap();
        let driver = Driver::first_delivery("D1", "Sami", month, OrderId::from("o-1"));
        let row = encode_driver(&driver);
        assert_eq!(key_of(&row), "D1");
        assert_eq!(decode_driver(&row).unwrap(), driver);
    }
}
