//! Channel adapters.
//!
//! Each intake channel speaks its own payload shape. The adapters here turn
//! them into one [`OrderRequest`](order_dispatch_types::OrderRequest) and
//! parse the driver commands that share the messaging channel with orders.
//! No I/O happens here.

pub mod error;
pub mod messaging;
pub mod voice;
pub mod web;

pub use error::ChannelError;
pub use messaging::{
    order_received_text, parse_command, DriverCommand, MessagingWebhook, HELP_TEXT,
};
pub use voice::{VoiceWebhook, VOICE_ACK_XML};
pub use web::{WebOrderForm, WebOrderReceipt};
