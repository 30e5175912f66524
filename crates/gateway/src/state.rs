use std::sync::Arc;

use {
    waypost_config::{ChannelConfig, StorageConfig},
    waypost_whatsapp::{DispatchSequencer, EventSink, MediaStore, Transcript, WebhookContext},
};

/// Shared state handed to every route handler.
///
/// Everything inside is `Arc`-wrapped so the state itself clones cheaply
/// per request.
#[derive(Clone)]
pub struct AppState {
    pub sequencer: Arc<DispatchSequencer>,
    pub media: Arc<MediaStore>,
    pub transcript: Arc<Transcript>,
    pub sink: Arc<dyn EventSink>,
    pub channel: Arc<ChannelConfig>,
    pub storage: Arc<StorageConfig>,
    pub version: String,
}

impl AppState {
    /// Bundle the pieces webhook processing needs.
    pub fn webhook_context(&self) -> WebhookContext {
        WebhookContext {
            phone_number_id: self.channel.phone_number_id.clone(),
            allowed_senders: self.channel.allowed_senders.clone(),
            media: Arc::clone(&self.media),
            transcript: Arc::clone(&self.transcript),
            sink: Arc::clone(&self.sink),
        }
    }
}
