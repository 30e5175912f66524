//! Config schema types (server, channel, backend, storage, dispatch).

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypostConfig {
    pub server: ServerConfig,
    pub channel: ChannelConfig,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// WhatsApp Business (Cloud API) account configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Graph API base URL.
    pub api_url: String,

    /// Graph API version path segment (e.g. "v20.0").
    pub api_version: String,

    /// Business phone number ID the bridge sends from.
    pub phone_number_id: String,

    /// Access token for the Business account.
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,

    /// Token echoed back during webhook subscription verification.
    #[serde(serialize_with = "serialize_secret")]
    pub verify_token: Secret<String>,

    /// Meta app secret used to verify webhook signatures.
    /// When unset, signature verification is skipped.
    #[serde(
        serialize_with = "serialize_opt_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_secret: Option<Secret<String>>,

    /// Send endpoint under the phone number node.
    pub send_endpoint: String,

    /// Phone numbers allowed to talk to the bridge. Empty allows everyone.
    pub allowed_senders: Vec<String>,
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"[REDACTED]")
            .field("verify_token", &"[REDACTED]")
            .field("send_endpoint", &self.send_endpoint)
            .field("allowed_senders", &self.allowed_senders)
            .finish_non_exhaustive()
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com".into(),
            api_version: "v20.0".into(),
            phone_number_id: String::new(),
            access_token: Secret::new(String::new()),
            verify_token: Secret::new(String::new()),
            app_secret: None,
            send_endpoint: "messages".into(),
            allowed_senders: Vec::new(),
        }
    }
}

/// Conversation backend the bridge forwards inbound messages to.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Webhook URL inbound events are POSTed to.
    /// When unset, inbound events are logged and discarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Shared secret used to sign forwarded payloads.
    #[serde(
        serialize_with = "serialize_opt_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub secret: Option<Secret<String>>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("webhook_url", &self.webhook_url)
            .field(
                "secret",
                &self.secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Local storage for retrieved attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory retrieved attachments are written to.
    /// Created on first use if absent.
    pub uploads_dir: PathBuf,
    /// Public base URL attachment links are built from.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("public/uploads"),
            public_base_url: "http://localhost:3000".into(),
        }
    }
}

/// Outbound dispatch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of queued outbound payloads, in-flight included.
    /// Enqueues beyond this are rejected.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_opt_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
