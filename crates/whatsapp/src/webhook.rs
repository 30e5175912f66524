//! Webhook verification and inbound message processing.

use std::{collections::HashMap, sync::Arc};

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::{debug, warn},
};

use crate::{
    event::{EventSink, InboundEvent},
    media::MediaStore,
    transcript::{Sender, Transcript},
    types::WebhookPayload,
};

type HmacSha256 = Hmac<Sha256>;

/// Verify the webhook signature from the Graph API.
///
/// The signature is sent in the `X-Hub-Signature-256` header as
/// `sha256=<hex>`, HMAC-SHA256 over the raw request body.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let expected = match signature_header.strip_prefix("sha256=") {
        Some(hex) => hex,
        None => {
            warn!("invalid signature header format (missing sha256= prefix)");
            return false;
        },
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        },
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks.
    constant_time_eq(&computed, expected)
}

/// Produce an `X-Hub-Signature-256` value for a payload forwarded to the
/// conversation backend. Inverse of [`verify_signature`].
pub fn sign_payload(body: &[u8], secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC for payload signing");
            return String::new();
        },
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Verify a webhook subscription handshake (GET request).
///
/// The Graph API sends:
/// - `hub.mode=subscribe`
/// - `hub.verify_token=<configured token>`
/// - `hub.challenge=<random string>`
///
/// Returns `Some(challenge)` when verification succeeds; the caller echoes
/// it back with a 200.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == "subscribe" && token == verify_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

/// Whether a sender may talk to the bridge.
///
/// An empty list allows everyone; `"*"` is a wildcard entry.
pub fn sender_allowed(allowed: &[String], wa_id: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|entry| entry == "*" || entry == wa_id)
}

/// Everything inbound processing needs besides the payload itself.
pub struct WebhookContext {
    pub phone_number_id: String,
    pub allowed_senders: Vec<String>,
    pub media: Arc<MediaStore>,
    pub transcript: Arc<Transcript>,
    pub sink: Arc<dyn EventSink>,
}

/// Process a webhook payload: retrieve attachments, record the transcript,
/// and forward normalized events to the conversation backend.
///
/// Infallible by design; every per-message failure is logged and skipped so
/// the webhook endpoint can always acknowledge receipt.
pub async fn process_webhook(payload: WebhookPayload, ctx: &WebhookContext) {
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring non-message webhook change");
                continue;
            }

            let value = change.value;

            if let Some(ref metadata) = value.metadata
                && metadata.phone_number_id != ctx.phone_number_id
            {
                warn!(
                    expected = %ctx.phone_number_id,
                    received = %metadata.phone_number_id,
                    "phone number ID mismatch"
                );
                continue;
            }

            // Delivery receipts are observability only; the dispatch queue
            // advances on send outcomes, not on status callbacks.
            for status in &value.statuses {
                debug!(message_id = %status.id, status = %status.status, "delivery status");
            }

            // Build a contact lookup map.
            let contacts: HashMap<String, String> = value
                .contacts
                .iter()
                .filter_map(|c| {
                    c.profile
                        .as_ref()
                        .map(|p| (c.wa_id.clone(), p.name.clone()))
                })
                .collect();

            for msg in value.messages {
                if !sender_allowed(&ctx.allowed_senders, &msg.from) {
                    warn!(from = %msg.from, "sender not allowed, dropping message");
                    continue;
                }

                let media_url = match msg.media() {
                    Some(media) => ctx
                        .media
                        .retrieve(media)
                        .await
                        .map(|stored| stored.public_url),
                    None => None,
                };

                let text = msg
                    .text_body()
                    .or_else(|| msg.caption())
                    .unwrap_or_default()
                    .to_string();
                if text.is_empty() && media_url.is_none() {
                    debug!(msg_type = %msg.message_type, "ignoring unsupported message");
                    continue;
                }

                let transcript_line = if text.is_empty() {
                    media_url.clone().unwrap_or_default()
                } else {
                    text.clone()
                };
                ctx.transcript.append(Sender::User, transcript_line);

                let event = InboundEvent {
                    message_id: msg.id.clone(),
                    from: msg.from.clone(),
                    sender_name: contacts.get(&msg.from).cloned(),
                    text,
                    media_url,
                    timestamp: msg.timestamp.clone(),
                };
                if let Err(error) = ctx.sink.deliver(&event).await {
                    warn!(
                        message_id = %event.message_id,
                        error = %error,
                        "failed to forward inbound event"
                    );
                }
            }
        }
    }
}
