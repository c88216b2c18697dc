use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::BotPostRequest;

/// Sends messages on behalf of a bot.
///
/// Posting never fails outright: a transport failure is reported as
/// `503 Service Unavailable` so callers only ever branch on a status.
#[async_trait]
pub trait BotPoster: Send + Sync {
    async fn post(&self, request: &BotPostRequest) -> StatusCode;
}

pub struct HttpBotPoster {
    client: reqwest::Client,
    post_url: String,
}

impl HttpBotPoster {
    pub fn new(client: reqwest::Client, post_url: impl Into<String>) -> Self {
        Self {
            client,
            post_url: post_url.into(),
        }
    }
}

#[async_trait]
impl BotPoster for HttpBotPoster {
    async fn post(&self, request: &BotPostRequest) -> StatusCode {
        debug!(
            "Posting as bot {} ({} attachment(s))",
            request.bot_id,
            request.attachments.len()
        );

        match self.client.post(&self.post_url).json(request).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    warn!("Bot post rejected ({}): {}", status, body);
                }
                status
            }
            Err(e) => {
                warn!("Bot post failed: {}", e);
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}
