use order_dispatch_types::{Channel, OrderId, OrderRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::ChannelError;

/// Storefront checkout form.
///
/// `items` is whatever the storefront sends: a JSON array of line items or
/// free text. `total` may come as a number or a string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebOrderForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub items: Value,
    #[serde(default)]
    pub total: Value,
    #[serde(default, alias = "audioUrl")]
    pub audio_url: Option<String>,
}

impl WebOrderForm {
    pub fn into_request(self) -> Result<OrderRequest, ChannelError> {
        let total = parse_total(&self.total)?;
        Ok(OrderRequest {
            name: self.name,
            phone: self.phone,
            address: self.address,
            items_payload: items_payload(self.items),
            total,
            channel: Channel::Web,
            audio_ref: self.audio_url,
        })
    }
}

fn items_payload(items: Value) -> String {
    match items {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn parse_total(total: &Value) -> Result<Option<Decimal>, ChannelError> {
    let raw = match total {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(ChannelError::MalformedRequest(format!(
                "total must be a number, got {other}"
            )))
        }
    };

    let amount = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| ChannelError::MalformedRequest(format!("total is not a number: {raw}")))?;
    if amount.is_sign_negative() {
        return Err(ChannelError::MalformedRequest(
            "total must not be negative".to_string(),
        ));
    }
    Ok(Some(amount))
}

/// Reply body for an accepted web order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebOrderReceipt {
    pub ok: bool,
    pub order_id: OrderId,
    pub message: String,
}

impl WebOrderReceipt {
    pub fn received(order_id: OrderId) -> Self {
        Self {
            ok: true,
            order_id,
            message: "Order received".to_string(),
        }
    }
}
