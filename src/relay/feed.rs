use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;

/// One search hit from the feed service.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub id: String,
    /// Absent text is treated like spam and never relayed.
    pub text: Option<String>,
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub retweet_count: u32,
    /// Creation time of the original item when this one is a retweet.
    pub retweeted_original: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Canonical link, which is what gets posted to the group.
    pub fn url(&self) -> String {
        format!("https://twitter.com/{}/status/{}", self.author_handle, self.id)
    }
}

/// A searchable feed behind an app-level bearer token.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn authenticate(&self) -> Result<String, ApiError>;

    async fn search(
        &self,
        token: &str,
        term: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<FeedItem>, ApiError>;
}
