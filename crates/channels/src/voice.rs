use order_dispatch_types::{Channel, OrderRequest};
use serde::Deserialize;

/// Acknowledgement returned to the voice provider once the order is stored
pub const VOICE_ACK_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<Response><Say>Your order has been received. We will contact you shortly.</Say></Response>";

const UNKNOWN_CALLER: &str = "Unknown";
const VOICE_ITEMS: &str = "Voice order";

/// Recording callback posted by the voice provider (form encoded)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceWebhook {
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "RecordingDuration", default)]
    pub recording_duration: Option<String>,
}

impl VoiceWebhook {
    /// A voice order carries no address or item list; staff work from the
    /// recording. The caller id doubles as the customer name.
    pub fn into_request(self) -> OrderRequest {
        let caller = self
            .from
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        OrderRequest {
            name: caller.clone().unwrap_or_else(|| UNKNOWN_CALLER.to_string()),
            phone: caller.unwrap_or_default(),
            address: String::new(),
            items_payload: VOICE_ITEMS.to_string(),
            total: None,
            channel: Channel::Voice,
            audio_ref: self.recording_url,
        }
    }
}
