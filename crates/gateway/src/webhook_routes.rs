//! Channel-side webhook endpoints.

use std::collections::HashMap;

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    tracing::{debug, warn},
    waypost_whatsapp::{WebhookPayload, webhook},
};

use crate::state::AppState;

/// `GET /webhook` handles the Graph API subscription handshake: echo the
/// challenge when the verify token matches, 403 otherwise.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let challenge = webhook::verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        state.channel.verify_token.expose_secret(),
    );

    match challenge {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => {
            warn!("webhook subscription verification failed");
            (StatusCode::FORBIDDEN, "verification failed").into_response()
        },
    }
}

/// `POST /webhook` receives inbound messages and status callbacks.
///
/// Once a payload is authenticated and parsed the response is always 200,
/// so the Graph API does not re-deliver it. Per-message failures are
/// logged inside processing instead.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref app_secret) = state.channel.app_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !webhook::verify_signature(&body, signature, app_secret.expose_secret()) {
            warn!("webhook signature verification failed");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid signature" })),
            )
                .into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%error, "malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "malformed payload" })),
            )
                .into_response();
        },
    };

    debug!(entries = payload.entry.len(), "webhook payload accepted");
    webhook::process_webhook(payload, &state.webhook_context()).await;

    Json(serde_json::json!({ "status": "received" })).into_response()
}
