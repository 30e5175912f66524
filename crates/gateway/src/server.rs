//! Router construction and server startup.

use std::net::SocketAddr;

use {
    axum::{
        Json, Router,
        extract::State,
        response::IntoResponse,
        routing::{get, post},
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use crate::{
    message_routes::{send_message, transcript},
    state::AppState,
    upload_routes::serve_upload,
    webhook_routes::{receive_webhook, verify_webhook},
};

/// Build the gateway router. Shared between production startup and the
/// integration tests, which mount it on an ephemeral port.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/messages", post(send_message))
        .route("/transcript", get(transcript))
        .route("/uploads/{file_name}", get(serve_upload))
        .layer(cors)
        .with_state(state)
}

/// Bind the listener and serve until the process is stopped.
pub async fn start_gateway(state: AppState, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let app = build_app(state.clone());

    print_banner(&state, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn print_banner(state: &AppState, addr: SocketAddr) {
    let lines = vec![
        format!("waypost gateway v{}", state.version),
        format!("listening on http://{addr}"),
        format!("phone number id {}", state.channel.phone_number_id),
        format!("uploads dir {}", state.storage.uploads_dir.display()),
    ];
    let width = lines.iter().map(String::len).max().unwrap_or(0) + 4;

    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "waypost",
        "status": "ok",
        "version": state.version,
        "queued": state.sequencer.queued_len(),
        "transcript_len": state.transcript.len(),
    }))
}
