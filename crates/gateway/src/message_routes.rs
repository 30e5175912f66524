//! Backend-facing message intake and transcript routes.

use {
    axum::{
        Json,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tracing::warn,
    waypost_whatsapp::{DispatchError, OutboundPayload},
};

use crate::state::AppState;

/// `POST /messages` enqueues one outbound payload.
///
/// 202 means queued, not delivered. Delivery happens asynchronously in
/// enqueue order, one send at a time. A full queue surfaces as 429 so the
/// backend can apply its own backpressure.
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<OutboundPayload>,
) -> Response {
    if payload.to.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing recipient" })),
        )
            .into_response();
    }
    if payload.text.is_empty() && payload.media.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "payload needs text or media" })),
        )
            .into_response();
    }

    match state.sequencer.enqueue(payload) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "queued",
                "queued": state.sequencer.queued_len(),
            })),
        )
            .into_response(),
        Err(DispatchError::QueueFull { capacity }) => {
            warn!(capacity, "outbound queue full, rejecting payload");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "outbound queue full",
                    "capacity": capacity,
                })),
            )
                .into_response()
        },
    }
}

/// `GET /transcript` returns the conversation so far, oldest first.
pub async fn transcript(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "conversation": state.transcript.entries() }))
}
