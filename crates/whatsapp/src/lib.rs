//! WhatsApp Business (Cloud API) channel core.
//!
//! Everything between the HTTP surface and the Graph API lives here: the
//! outbound dispatch sequencer, the media retrieval pipeline, webhook
//! verification and processing, and the in-memory conversation transcript.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod media;
pub mod transcript;
pub mod types;
pub mod webhook;

pub use {
    client::ChannelClient,
    dispatch::{DispatchError, DispatchSequencer, Outbound},
    error::{Error, Result},
    event::{EventSink, InboundEvent},
    media::{MediaStore, StoredMedia},
    transcript::{Sender, Transcript, TranscriptEntry},
    types::{OutboundMedia, OutboundPayload, WebhookPayload},
    webhook::WebhookContext,
};
