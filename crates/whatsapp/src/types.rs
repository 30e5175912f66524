//! Graph API wire types for the WhatsApp Business webhook and send paths.

use serde::{Deserialize, Serialize};

/// Top-level webhook payload POSTed by the Graph API.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<ValueMetadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<DeliveryStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueMetadata {
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    pub name: String,
}

/// One inbound message inside a webhook change.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextContent>,
    pub image: Option<MediaContent>,
    pub audio: Option<MediaContent>,
    pub video: Option<MediaContent>,
    pub document: Option<MediaContent>,
    pub sticker: Option<MediaContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub body: String,
}

/// Media descriptor carried by image/audio/video/document/sticker messages.
/// The `id` is resolved to a signed download URL via the media endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaContent {
    pub id: String,
    pub mime_type: Option<String>,
    pub sha256: Option<String>,
    pub caption: Option<String>,
    pub filename: Option<String>,
}

/// Delivery status callback (sent/delivered/read/failed).
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryStatus {
    pub id: String,
    pub status: String,
    pub timestamp: Option<String>,
    pub recipient_id: Option<String>,
}

impl InboundMessage {
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.body.as_str())
    }

    /// The media descriptor for this message, if it carries one.
    pub fn media(&self) -> Option<&MediaContent> {
        self.image
            .as_ref()
            .or(self.audio.as_ref())
            .or(self.video.as_ref())
            .or(self.document.as_ref())
            .or(self.sticker.as_ref())
    }

    pub fn has_media(&self) -> bool {
        self.media().is_some()
    }

    /// Caption of the attached media, if any.
    pub fn caption(&self) -> Option<&str> {
        self.media().and_then(|m| m.caption.as_deref())
    }
}

/// Metadata returned by the media endpoint; `url` is a short-lived
/// signed download URL.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMetadata {
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub id: Option<String>,
}

/// One outbound message bound for a single recipient.
///
/// The dispatch sequencer treats this as opaque; only the client
/// serializes it into the Graph API shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundPayload {
    /// Recipient phone number in international format, no plus sign.
    pub to: String,
    /// Message body, or the caption when `media` is set. May be empty for
    /// caption-less media.
    #[serde(default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<OutboundMedia>,
}

/// Link-based outbound media attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMedia {
    pub url: String,
    pub mime_type: Option<String>,
}

impl OutboundPayload {
    #[must_use]
    pub fn text(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            text: text.into(),
            media: None,
        }
    }
}
