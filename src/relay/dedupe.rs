use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::feed::FeedItem;

#[derive(Debug, Clone)]
pub struct DedupeRules {
    /// Items whose text contains any of these are dropped.
    pub spam_markers: Vec<String>,
    /// Retweets of originals older than this were relayed already.
    pub retweet_window: Duration,
}

impl DedupeRules {
    pub fn new(spam_markers: Vec<String>, retweet_window: Duration) -> Self {
        Self {
            spam_markers,
            retweet_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deduped {
    pub kept: Vec<FeedItem>,
    /// Cursor for the next search: newest kept item, or the incoming cursor.
    pub newest_id: Option<String>,
}

/// Drop spam and stale retweets, keeping arrival order.
///
/// A retweet of an original younger than the window still gets through, so
/// an item retweeted within minutes of posting can be relayed twice.
pub fn dedupe(
    items: Vec<FeedItem>,
    since_id: Option<&str>,
    rules: &DedupeRules,
    now: DateTime<Utc>,
) -> Deduped {
    let horizon = now - rules.retweet_window;
    let mut kept: Vec<FeedItem> = Vec::with_capacity(items.len());

    for item in items {
        if is_spam(&item, rules) {
            debug!("Skipping spam {}", item.id);
            continue;
        }

        if item.retweet_count > 0 && item.retweeted_original.is_some_and(|t| t < horizon) {
            debug!("Skipping retweet {}", item.id);
            continue;
        }

        kept.push(item);
    }

    let newest_id = newest_id(&kept).or_else(|| since_id.map(str::to_owned));
    Deduped { kept, newest_id }
}

/// Id of the most recently created item; the earliest position wins ties.
pub fn newest_id(items: &[FeedItem]) -> Option<String> {
    items
        .iter()
        .reduce(|newest, item| {
            if item.created_at > newest.created_at {
                item
            } else {
                newest
            }
        })
        .map(|item| item.id.clone())
}

fn is_spam(item: &FeedItem, rules: &DedupeRules) -> bool {
    match item.text.as_deref() {
        Some(text) => rules.spam_markers.iter().any(|m| text.contains(m.as_str())),
        None => true,
    }
}
