//! Public serving of stored attachments.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tracing::debug,
};

use crate::state::AppState;

/// `GET /uploads/{file_name}` serves one stored attachment.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Response {
    // Stored names are flat `whatsapp_<millis>.<ext>`; anything that could
    // escape the uploads dir is rejected before touching the filesystem.
    if !valid_upload_name(&file_name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid file name" })),
        )
            .into_response();
    }

    let path = state.storage.uploads_dir.join(&file_name);
    match tokio::fs::read(&path).await {
        Ok(body) => {
            debug!(file = %file_name, bytes = body.len(), "serving upload");
            (
                StatusCode::OK,
                [("content-type", mime_for_extension(&file_name))],
                body,
            )
                .into_response()
        },
        Err(_) => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

fn valid_upload_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Content type by file extension, mirroring the extensions the media
/// store hands out.
fn mime_for_extension(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "amr" => "audio/amr",
        "ogg" => "audio/ogg",
        "opus" => "audio/opus",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}
