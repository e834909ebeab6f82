use order_dispatch_types::{Channel, OrderId, OrderRequest};
use serde::Deserialize;
use tracing::debug;

use crate::error::ChannelError;

/// Reply sent when an inbound message is neither a command nor an order
pub const HELP_TEXT: &str = "To order, text \"<items> to <address>\". \
Drivers: \"claim <order id>\" to take an order, \"delivered <order id> [note]\" once delivered.";

/// Inbound text message posted by the messaging provider (form encoded)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagingWebhook {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

impl MessagingWebhook {
    pub fn sender(&self) -> Result<&str, ChannelError> {
        let from = self.from.trim();
        if from.is_empty() {
            return Err(ChannelError::MalformedRequest("missing sender".to_string()));
        }
        Ok(from)
    }

    pub fn command(&self) -> Result<DriverCommand, ChannelError> {
        parse_command(&self.body)
    }

    /// Read the message as a customer order: `[order] <items> to <address>`.
    ///
    /// The sender's number is both the customer phone and, lacking anything
    /// better, the customer name. The split happens at the last " to ", so
    /// items may contain the word themselves.
    pub fn into_request(&self) -> Result<OrderRequest, ChannelError> {
        let phone = self.sender()?.to_string();
        let text = strip_order_keyword(self.body.trim());

        let split = text.to_ascii_lowercase().rfind(" to ");
        let (items, address) = match split {
            Some(at) => (text[..at].trim(), text[at + 4..].trim()),
            None => {
                return Err(ChannelError::MalformedRequest(
                    "order text needs \"<items> to <address>\"".to_string(),
                ))
            }
        };
        if items.is_empty() || address.is_empty() {
            return Err(ChannelError::MalformedRequest(
                "order text needs both items and an address".to_string(),
            ));
        }

        Ok(OrderRequest {
            name: phone.clone(),
            phone,
            address: address.to_string(),
            items_payload: items.to_string(),
            total: None,
            channel: Channel::Messaging,
            audio_ref: None,
        })
    }
}

/// Reply for an order taken over messaging
pub fn order_received_text(order_id: &OrderId) -> String {
    format!("Order {order_id} received. We will text you once a driver is on the way.")
}

fn strip_order_keyword(text: &str) -> &str {
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) if first.trim_end_matches(':').eq_ignore_ascii_case("order") => {
            rest.trim_start()
        }
        _ => text,
    }
}

/// A driver instruction carried in a text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    Claim { order_id: OrderId },
    Delivered { order_id: OrderId, note: Option<String> },
}

/// Parse `claim <id>` or `delivered|deliver|done <id> [note...]`.
///
/// The keyword is case-insensitive. A leading `#` on the id is dropped so
/// drivers can paste ids the way broadcasts print them.
pub fn parse_command(body: &str) -> Result<DriverCommand, ChannelError> {
    let mut words = body.split_whitespace();
    let keyword = words
        .next()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ChannelError::UnknownCommand(String::new()))?;

    let order_id = words
        .next()
        .map(|id| id.trim_start_matches('#'))
        .filter(|id| !id.is_empty())
        .map(OrderId::from);

    let command = match (keyword.as_str(), order_id) {
        ("claim", Some(order_id)) => DriverCommand::Claim { order_id },
        ("delivered" | "deliver" | "done", Some(order_id)) => {
            let note = words.collect::<Vec<_>>().join(" ");
            DriverCommand::Delivered {
                order_id,
                note: (!note.is_empty()).then_some(note),
            }
        }
        ("claim" | "delivered" | "deliver" | "done", None) => {
            return Err(ChannelError::MalformedRequest(format!(
                "{keyword} needs an order id"
            )))
        }
        _ => return Err(ChannelError::UnknownCommand(body.trim().to_string())),
    };

    debug!(?command, "parsed driver command");
    Ok(command)
}
