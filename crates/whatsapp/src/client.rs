//! HTTP client for the Graph API send and media endpoints.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use waypost_config::ChannelConfig;

use crate::{
    dispatch::Outbound,
    error::{Error, Result},
    types::{MediaMetadata, OutboundPayload},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one Business phone number.
///
/// A hung upstream must resolve to a failure outcome rather than wedge the
/// dispatcher, so both connect and overall request timeouts are set.
#[derive(Clone)]
pub struct ChannelClient {
    http: reqwest::Client,
    api_url: String,
    api_version: String,
    phone_number_id: String,
    send_endpoint: String,
    access_token: Secret<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl ChannelClient {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            phone_number_id: config.phone_number_id.clone(),
            send_endpoint: config.send_endpoint.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// POST one payload to the send endpoint and return the assigned
    /// message ID (`messages[0].id`).
    pub async fn send_message(&self, payload: &OutboundPayload) -> Result<String> {
        let url = format!(
            "{}/{}/{}/{}",
            self.api_url, self.api_version, self.phone_number_id, self.send_endpoint
        );
        debug!(to = %payload.to, "channel send start");

        let resp = self
            .http
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&send_body(payload))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), body));
        }

        let parsed: SendResponse = resp.json().await?;
        parsed
            .messages
            .first()
            .map(|m| m.id.clone())
            .ok_or_else(|| Error::message("send response missing messages[0].id"))
    }

    /// Resolve a media ID to its metadata (phase one of retrieval).
    pub async fn media_metadata(&self, media_id: &str) -> Result<MediaMetadata> {
        let url = format!("{}/{}/{}", self.api_url, self.api_version, media_id);
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), body));
        }
        Ok(resp.json().await?)
    }

    /// Fetch the binary body behind a signed download URL (phase two).
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), body));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Build the Graph API request body for one payload.
///
/// Text goes out as a `text` object; media goes out by link with the text
/// carried as a caption where the media kind supports one.
fn send_body(payload: &OutboundPayload) -> serde_json::Value {
    let Some(media) = &payload.media else {
        return serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": payload.to,
            "type": "text",
            "text": { "body": payload.text },
        });
    };

    let kind = media_kind(media.mime_type.as_deref());
    let mut object = serde_json::json!({ "link": media.url });
    // Audio messages have no caption field.
    if kind != "audio"
        && !payload.text.is_empty()
        && let Some(obj) = object.as_object_mut()
    {
        obj.insert("caption".into(), serde_json::Value::String(payload.text.clone()));
    }

    serde_json::json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": payload.to,
        "type": kind,
        kind: object,
    })
}

fn media_kind(mime_type: Option<&str>) -> &'static str {
    match mime_type
        .map(|m| m.split('/').next().unwrap_or(""))
        .unwrap_or("")
    {
        "image" => "image",
        "audio" => "audio",
        "video" => "video",
        _ => "document",
    }
}

#[async_trait]
impl Outbound for ChannelClient {
    async fn send(&self, payload: &OutboundPayload) -> Result<String> {
        self.send_message(payload).await
    }
}
