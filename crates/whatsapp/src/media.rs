//! Two-phase attachment retrieval and local persistence.
//!
//! Inbound media arrives as an opaque ID. Retrieval resolves the ID to a
//! short-lived signed URL via the media endpoint, downloads the binary,
//! writes it under the uploads directory, and hands back a public URL the
//! conversation backend can embed.

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, warn};

use waypost_config::StorageConfig;

use crate::{
    client::ChannelClient,
    error::{Error, Result},
    types::MediaContent,
};

/// A retrieved attachment persisted under the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub file_name: String,
    pub path: PathBuf,
    pub public_url: String,
}

/// Fetches Business API media and persists it for public serving.
pub struct MediaStore {
    client: ChannelClient,
    uploads_dir: PathBuf,
    public_base_url: String,
}

impl MediaStore {
    pub fn new(client: ChannelClient, storage: &StorageConfig) -> Self {
        Self {
            client,
            uploads_dir: storage.uploads_dir.clone(),
            public_base_url: storage.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Retrieve one attachment: resolve metadata, download, persist.
    ///
    /// Every failure path is caught and logged; callers get `None` and
    /// treat the message as carrying no attachment. No retries.
    pub async fn retrieve(&self, media: &MediaContent) -> Option<StoredMedia> {
        match self.try_retrieve(media).await {
            Ok(stored) => Some(stored),
            Err(error) => {
                warn!(media_id = %media.id, error = %error, "attachment retrieval failed");
                None
            },
        }
    }

    async fn try_retrieve(&self, media: &MediaContent) -> Result<StoredMedia> {
        let metadata = self.client.media_metadata(&media.id).await?;
        let url = metadata
            .url
            .ok_or_else(|| Error::message("media metadata missing url"))?;
        let bytes = self.client.download(&url).await?;

        // The webhook's mime_type wins; the metadata one fills in when the
        // webhook omitted it.
        let mime_type = media.mime_type.as_deref().or(metadata.mime_type.as_deref());
        let file_name = build_file_name(mime_type, unix_millis());

        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| Error::external("create uploads dir", e))?;
        let path = self.uploads_dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::external("write attachment", e))?;
        debug!(file = %file_name, bytes = bytes.len(), "attachment stored");

        let public_url = format!("{}/uploads/{}", self.public_base_url, file_name);
        Ok(StoredMedia {
            file_name,
            path,
            public_url,
        })
    }
}

/// `whatsapp_{unix_millis}.{extension}`.
///
/// Names collide within one millisecond; accepted for a single-number
/// bridge's traffic.
fn build_file_name(mime_type: Option<&str>, millis: u128) -> String {
    format!("whatsapp_{millis}.{}", extension_for_mime(mime_type))
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Map a MIME type to a file extension for stored attachments.
pub fn extension_for_mime(mime_type: Option<&str>) -> &'static str {
    // Strip parameters like "; charset=binary".
    let essence = mime_type
        .map(|m| m.split(';').next().unwrap_or("").trim())
        .unwrap_or("");

    match essence {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/aac" => "aac",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/amr" => "amr",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        _ => "bin",
    }
}
