use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque order identifier, assigned once at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseEnumError {
    #[error("unknown channel: {0}")]
    Channel(String),

    #[error("unknown order status: {0}")]
    Status(String),
}

/// Intake channel an order arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Voice,
    Messaging,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::Voice => "voice",
            Channel::Messaging => "messaging",
        }
    }
}

impl FromStr for Channel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Channel::Web),
            "voice" => Ok(Channel::Voice),
            "messaging" => Ok(Channel::Messaging),
            other => Err(ParseEnumError::Channel(other.to_string())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status: `New -> Claimed -> Delivered`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Claimed,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "New",
            OrderStatus::Claimed => "Claimed",
            OrderStatus::Delivered => "Delivered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(OrderStatus::New),
            "claimed" => Ok(OrderStatus::Claimed),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(ParseEnumError::Status(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical intake request produced by every channel adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub items_payload: String,
    #[serde(default)]
    pub total: Option<Decimal>,
    pub channel: Channel,
    #[serde(default)]
    pub audio_ref: Option<String>,
}

impl OrderRequest {
    /// Names of required fields that are blank.
    ///
    /// Voice orders carry no address, every other channel must.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        if self.channel != Channel::Voice && self.address.trim().is_empty() {
            missing.push("address");
        }
        if self.items_payload.trim().is_empty() {
            missing.push("items");
        }
        missing
    }
}

/// A delivery order as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // ═══════════════════════════════════════════════════════════════════════════
    // IDENTITY (immutable)
    // ═══════════════════════════════════════════════════════════════════════════
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub channel: Channel,

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTENT (immutable)
    // ═══════════════════════════════════════════════════════════════════════════
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub items_payload: String,
    pub total_amount: Option<Decimal>,

    // ═══════════════════════════════════════════════════════════════════════════
    // ENRICHMENT (write-once)
    // ═══════════════════════════════════════════════════════════════════════════
    pub audio_url: Option<String>,
    pub transcript: Option<String>,

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════
    pub status: OrderStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivery_driver_phone: Option<String>,
    pub delivery_note: Option<String>,
}

impl Order {
    /// Build a fresh `New` order from an intake request
    pub fn from_request(id: OrderId, request: OrderRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            channel: request.channel,
            customer_name: request.name.trim().to_string(),
            customer_phone: request.phone.trim().to_string(),
            address: request.address.trim().to_string(),
            items_payload: request.items_payload,
            total_amount: request.total,
            audio_url: request.audio_ref.filter(|r| !r.trim().is_empty()),
            transcript: None,
            status: OrderStatus::New,
            claimed_by: None,
            claimed_at: None,
            delivered_at: None,
            delivery_driver_phone: None,
            delivery_note: None,
        }
    }

    /// Driver currently recorded against this order, if any
    pub fn holder(&self) -> Option<&str> {
        self.delivery_driver_phone
            .as_deref()
            .or(self.claimed_by.as_deref())
    }

    pub fn is_claimed_by(&self, driver: &str) -> bool {
        self.status == OrderStatus::Claimed && self.claimed_by.as_deref() == Some(driver)
    }

    pub fn is_delivered_by(&self, driver: &str) -> bool {
        self.status == OrderStatus::Delivered
            && self.delivery_driver_phone.as_deref() == Some(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_request() -> OrderRequest {
        OrderRequest {
            name: "Ali".to_string(),
            phone: "0555".to_string(),
            address: "12 Palm Street".to_string(),
            items_payload: "2x shawarma".to_string(),
            total: Some(Decimal::new(1250, 2)),
            channel: Channel::Web,
            audio_ref: None,
        }
    }

    #[test]
    fn test_missing_fields_web() {
        let mut request = web_request();
        assert!(request.missing_fields().is_empty());

        request.address = "  ".to_string();
        request.phone = String::new();
        assert_eq!(request.missing_fields(), vec!["phone", "address"]);
    }

    #[test]
    fn test_voice_orders_need_no_address() {
        let mut request = web_request();
        request.channel = Channel::Voice;
        request.address = String::new();
        assert!(request.missing_fields().is_empty());
    }

    #[test]
    fn test_from_request_starts_new() {
        let order = Order::from_request(OrderId::from("o-1"), web_request(), Utc::now());
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.holder(), None);
        assert_eq!(order.customer_phone, "0555");
    }

    #[test]
    fn test_blank_audio_ref_is_dropped() {
        let mut request = web_request();
        request.audio_ref = Some(" ".to_string());
        let order = Order::from_request(OrderId::from("o-1"), request, Utc::now());
        assert_eq!(order.audio_url, None);
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert_eq!("New".parse::<OrderStatus>().unwrap(), OrderStatus::New);
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_only_delivered_is_terminal() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Claimed.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(OrderId::generate(), OrderId::generate());
    }
}
