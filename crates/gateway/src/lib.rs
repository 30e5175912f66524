//! HTTP surface of the bridge.
//!
//! One axum router carries both sides of the conversation: the WhatsApp
//! webhook endpoints (subscription verification and inbound delivery), the
//! backend-facing message intake and transcript, and public serving of
//! stored attachments.

pub mod backend;
pub mod message_routes;
pub mod server;
pub mod state;
pub mod upload_routes;
pub mod webhook_routes;

pub use {
    backend::{HttpBackend, NoopSink},
    server::{build_app, start_gateway},
    state::AppState,
};
