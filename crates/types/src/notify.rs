use serde::{Deserialize, Serialize};

/// Outbound text notification addressed to a phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub to_phone: String,
    pub text: String,
}

impl NotifyRequest {
    pub fn new(to_phone: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to_phone: to_phone.into(),
            text: text.into(),
        }
    }
}
