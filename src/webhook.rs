//! HTTP callback endpoint GroupMe calls for every message in a bot's group.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{error, info};

use crate::groupme::InboundMessage;
use crate::responder::Responder;

pub fn router(responder: Arc<Responder>) -> Router {
    Router::new()
        .route("/callback", post(missing_bot_id))
        .route("/callback/{bot_id}", post(handle_callback))
        .route("/health", get(health))
        .with_state(responder)
}

/// Serve the webhook until the process is stopped.
pub async fn serve(listen_address: &str, responder: Arc<Responder>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("Failed to bind to {listen_address}"))?;

    info!("Webhook listening on {}", listen_address);

    axum::serve(listener, router(responder))
        .await
        .context("Webhook server error")?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn missing_bot_id() -> (StatusCode, &'static str) {
    error!("No botId");
    (StatusCode::BAD_REQUEST, "No BotId present")
}

async fn handle_callback(
    State(responder): State<Arc<Responder>>,
    Path(bot_id): Path<String>,
    body: String,
) -> (StatusCode, &'static str) {
    info!("Got message callback");
    if bot_id.trim().is_empty() {
        return missing_bot_id().await;
    }

    let message = match serde_json::from_str::<InboundMessage>(&body) {
        Ok(message) if message.text.is_some() => message,
        Ok(_) | Err(_) => {
            info!("No message found in payload");
            return (StatusCode::BAD_REQUEST, "No message in payload");
        }
    };

    if responder.respond(&bot_id, &message).await.posted() {
        (StatusCode::CREATED, "")
    } else {
        (StatusCode::OK, "")
    }
}
