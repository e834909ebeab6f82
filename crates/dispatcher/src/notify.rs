use async_trait::async_trait;
use order_dispatch_types::NotifyRequest;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected by gateway with status {status}")]
    Rejected { status: u16 },

    #[error("recipient {0} refused")]
    Refused(String),
}

/// Outbound text channel to customers and drivers.
///
/// Delivery is best effort: callers log failures and carry on.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, request: &NotifyRequest) -> Result<(), NotifyError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// LOG SENDER
// ═══════════════════════════════════════════════════════════════════════════

/// Writes notifications to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, request: &NotifyRequest) -> Result<(), NotifyError> {
        info!(to = %request.to_phone, text = %request.text, "notification");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// WEBHOOK SENDER
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    text: &'a str,
}

/// Posts `{"to": .., "text": ..}` as JSON to a messaging gateway
pub struct WebhookSender {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookSender {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, request: &NotifyRequest) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&WebhookPayload {
                to: &request.to_phone,
                text: &request.text,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RECORDING SENDER
// ═══════════════════════════════════════════════════════════════════════════

/// Keeps every notification in memory (for testing).
///
/// Phones registered with [`RecordingSender::refuse`] fail instead.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<NotifyRequest>>,
    refused: Mutex<HashSet<String>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse(&self, phone: impl Into<String>) {
        self.refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(phone.into());
    }

    pub fn sent(&self) -> Vec<NotifyRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_to(&self, phone: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|n| n.to_phone == phone)
            .map(|n| n.text)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, request: &NotifyRequest) -> Result<(), NotifyError> {
        let refused = self
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&request.to_phone);
        if refused {
            return Err(NotifyError::Refused(request.to_phone.clone()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }
}
