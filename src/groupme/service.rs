use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

const SERVICE: &str = "groupme";
const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";
const USER_AGENT: &str = "dinobot";
const GROUPS_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedBot {
    pub bot_id: String,
    #[serde(default)]
    pub name: String,
}

/// GroupMe wraps every payload as `{"meta": {...}, "response": ...}`.
#[derive(Deserialize)]
struct Envelope<T> {
    response: Option<T>,
}

#[derive(Deserialize)]
struct CreatedBotResponse {
    bot: CreatedBot,
}

#[derive(Serialize)]
struct CreateBotRequest<'a> {
    bot: NewBot<'a>,
}

#[derive(Serialize)]
struct NewBot<'a> {
    name: &'a str,
    group_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

/// The slice of the GroupMe API used to manage feed bots on a user's behalf.
#[async_trait]
pub trait GroupMeApi: Send + Sync {
    async fn current_user(&self, access_token: &str) -> Result<User, ApiError>;

    async fn groups(&self, access_token: &str) -> Result<Vec<Group>, ApiError>;

    async fn create_bot(
        &self,
        access_token: &str,
        group_id: &str,
        name: &str,
        avatar_url: Option<&str>,
        callback_url: Option<&str>,
    ) -> Result<CreatedBot, ApiError>;
}

/// Authenticated calls against the GroupMe v3 API using a user access token.
pub struct GroupMeClient {
    client: reqwest::Client,
    base_url: String,
}

impl GroupMeClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GroupMeApi for GroupMeClient {
    async fn current_user(&self, access_token: &str) -> Result<User, ApiError> {
        let url = format!("{}/users/me", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(ApiError::transport(SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(SERVICE, status));
        }

        let envelope: Envelope<User> = response
            .json()
            .await
            .map_err(ApiError::transport(SERVICE))?;
        envelope.response.ok_or_else(|| ApiError::Malformed {
            service: SERVICE,
            message: "user profile missing from response".to_string(),
        })
    }

    /// Every group the user belongs to, fetched page by page until an empty page.
    async fn groups(&self, access_token: &str) -> Result<Vec<Group>, ApiError> {
        let url = format!("{}/groups", self.base_url);
        let mut groups = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[("page", page), ("per_page", GROUPS_PER_PAGE)])
                .header(ACCESS_TOKEN_HEADER, access_token)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .send()
                .await
                .map_err(ApiError::transport(SERVICE))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::from_status(SERVICE, status));
            }

            let envelope: Envelope<Vec<Group>> = response
                .json()
                .await
                .map_err(ApiError::transport(SERVICE))?;
            let batch = envelope.response.unwrap_or_default();
            if batch.is_empty() {
                break;
            }

            debug!("Fetched {} groups from page {}", batch.len(), page);
            groups.extend(batch);
            page += 1;
        }

        Ok(groups)
    }

    async fn create_bot(
        &self,
        access_token: &str,
        group_id: &str,
        name: &str,
        avatar_url: Option<&str>,
        callback_url: Option<&str>,
    ) -> Result<CreatedBot, ApiError> {
        let url = format!("{}/bots", self.base_url);
        let request = CreateBotRequest {
            bot: NewBot {
                name,
                group_id,
                avatar_url,
                callback_url,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("token", access_token)])
            .json(&request)
            .send()
            .await
            .map_err(ApiError::transport(SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(SERVICE, status));
        }

        let envelope: Envelope<CreatedBotResponse> = response
            .json()
            .await
            .map_err(ApiError::transport(SERVICE))?;
        envelope
            .response
            .map(|r| r.bot)
            .ok_or_else(|| ApiError::Malformed {
                service: SERVICE,
                message: "created bot missing from response".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_bot_request_shape() {
        let request = CreateBotRequest {
            bot: NewBot {
                name: "TwitterBot rust",
                group_id: "g1",
                avatar_url: None,
                callback_url: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"bot": {"name": "TwitterBot rust", "group_id": "g1"}})
        );
    }

    #[test]
    fn test_envelope_parsing() {
        let envelope: Envelope<CreatedBotResponse> = serde_json::from_value(json!({
            "meta": {"code": 201},
            "response": {"bot": {"bot_id": "b42", "name": "TwitterBot rust", "group_id": "g1"}}
        }))
        .unwrap();
        assert_eq!(envelope.response.unwrap().bot.bot_id, "b42");

        let groups: Envelope<Vec<Group>> =
            serde_json::from_value(json!({"meta": {"code": 200}, "response": []})).unwrap();
        assert!(groups.response.unwrap().is_empty());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = GroupMeClient::new(reqwest::Client::new(), "https://api.groupme.com/v3/");
        assert_eq!(client.base_url, "https://api.groupme.com/v3");
    }
}
