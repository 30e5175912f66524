use {anyhow::Result, async_trait::async_trait, serde::Serialize};

/// Normalized inbound message handed to the conversation backend.
#[derive(Debug, Clone, Serialize)]
pub struct InboundEvent {
    pub message_id: String,
    /// Sender phone number (wa_id).
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub text: String,
    /// Public URL of a retrieved attachment, when the message carried one
    /// and retrieval succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Transport seam between webhook processing and the conversation backend.
///
/// The gateway provides the HTTP implementation; tests substitute
/// recording sinks.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &InboundEvent) -> Result<()>;
}
