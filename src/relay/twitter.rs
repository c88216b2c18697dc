use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::feed::{FeedItem, FeedSource};
use crate::config::TwitterConfig;
use crate::error::ApiError;

const SERVICE: &str = "twitter";
const USER_AGENT: &str = "GroupMeTwitterBot";
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
const SEARCH_PAGE_SIZE: &str = "100";

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token_type: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<Status>,
}

#[derive(Deserialize)]
struct Status {
    id_str: Option<String>,
    text: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    retweet_count: u32,
    user: Option<StatusUser>,
    retweeted_status: Option<Box<Status>>,
}

#[derive(Deserialize)]
struct StatusUser {
    screen_name: Option<String>,
}

impl Status {
    /// Statuses without an id or author handle cannot be linked and are dropped.
    fn into_item(self) -> Option<FeedItem> {
        let id = self.id_str?;
        let author_handle = self.user?.screen_name?;
        Some(FeedItem {
            id,
            text: self.text,
            author_handle,
            created_at: parse_created_at(self.created_at.as_deref()),
            retweet_count: self.retweet_count,
            retweeted_original: self
                .retweeted_status
                .map(|original| parse_created_at(original.created_at.as_deref())),
        })
    }
}

/// Unparseable timestamps sort before everything else.
fn parse_created_at(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| DateTime::parse_from_str(v, CREATED_AT_FORMAT).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Application-only client for the Twitter v1.1 search API.
pub struct TwitterClient {
    client: reqwest::Client,
    app_key: String,
    app_secret: String,
    token_url: String,
    search_url: String,
}

impl TwitterClient {
    pub fn new(client: reqwest::Client, config: &TwitterConfig) -> Self {
        Self {
            client,
            app_key: config.app_key.clone(),
            app_secret: config.app_secret.clone(),
            token_url: config.token_url.clone(),
            search_url: config.search_url.clone(),
        }
    }
}

#[async_trait]
impl FeedSource for TwitterClient {
    async fn authenticate(&self) -> Result<String, ApiError> {
        let key = urlencoding::encode(&self.app_key);
        let secret = urlencoding::encode(&self.app_secret);

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(key, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(ApiError::transport(SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(SERVICE, status));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(ApiError::transport(SERVICE))?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            warn!("Unexpected token type: {}", token.token_type);
        }
        token.access_token.ok_or_else(|| ApiError::Malformed {
            service: SERVICE,
            message: "access token missing from response".to_string(),
        })
    }

    async fn search(
        &self,
        token: &str,
        term: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<FeedItem>, ApiError> {
        let mut query = vec![
            ("q", term),
            ("result_type", "recent"),
            ("count", SEARCH_PAGE_SIZE),
        ];
        if let Some(since_id) = since_id.filter(|s| !s.trim().is_empty()) {
            query.push(("since_id", since_id));
        }

        let response = self
            .client
            .get(&self.search_url)
            .query(&query)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(ApiError::transport(SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(SERVICE, status));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(ApiError::transport(SERVICE))?;
        let items: Vec<FeedItem> = body
            .statuses
            .into_iter()
            .filter_map(Status::into_item)
            .collect();

        debug!("Search for '{}' returned {} items", term, items.len());
        Ok(items)
    }
}
