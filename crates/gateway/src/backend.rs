//! Forwarding inbound events to the conversation backend.

use std::time::Duration;

use {
    anyhow::Context as _,
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
    waypost_whatsapp::{EventSink, InboundEvent, webhook},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// POSTs each inbound event to the configured backend webhook as JSON,
/// signing the body with `X-Hub-Signature-256` when a shared secret is
/// configured. The backend can verify it the same way this gateway
/// verifies WhatsApp's signatures.
pub struct HttpBackend {
    http: reqwest::Client,
    url: String,
    secret: Option<Secret<String>>,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>, secret: Option<Secret<String>>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build backend HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
            secret,
        })
    }
}

#[async_trait]
impl EventSink for HttpBackend {
    async fn deliver(&self, event: &InboundEvent) -> anyhow::Result<()> {
        let body = serde_json::to_vec(event).context("failed to serialize inbound event")?;
        let signature = self
            .secret
            .as_ref()
            .map(|secret| webhook::sign_payload(&body, secret.expose_secret()));

        let mut request = self
            .http
            .post(&self.url)
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("x-hub-signature-256", signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .context("failed to reach backend webhook")?;
        if !response.status().is_success() {
            anyhow::bail!("backend webhook returned {}", response.status());
        }

        debug!(message_id = %event.message_id, "inbound event forwarded to backend");
        Ok(())
    }
}

/// Sink used when no backend webhook is configured: log and drop. The
/// transcript still records the message, so nothing is silently lost.
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn deliver(&self, event: &InboundEvent) -> anyhow::Result<()> {
        info!(message_id = %event.message_id, from = %event.from, "no backend configured, event not forwarded");
        Ok(())
    }
}
