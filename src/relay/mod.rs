//! Periodic relay of feed search results into GroupMe groups.

pub mod dedupe;
pub mod feed;
pub mod registrar;
pub mod twitter;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::groupme::poster::BotPoster;
use crate::groupme::BotPostRequest;
use crate::storage::{BotRegistration, RegistrationStore};
use dedupe::{dedupe, DedupeRules};
use feed::FeedSource;

/// Outcome of one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub registrations: usize,
    /// Items posted successfully across all registrations.
    pub relayed: usize,
    /// Registrations that hit an error or a rejected post.
    pub failed: usize,
}

/// Posted count for one registration, and whether it stopped early.
struct Progress {
    posted: usize,
    rejected: bool,
}

pub struct RelayJob {
    store: RegistrationStore,
    feed: Arc<dyn FeedSource>,
    poster: Arc<dyn BotPoster>,
    rules: DedupeRules,
}

impl RelayJob {
    pub fn new(
        store: RegistrationStore,
        feed: Arc<dyn FeedSource>,
        poster: Arc<dyn BotPoster>,
        rules: DedupeRules,
    ) -> Self {
        Self {
            store,
            feed,
            poster,
            rules,
        }
    }

    /// Search, filter and post for every registration, one at a time.
    ///
    /// A failure on one registration is logged and the pass moves on, except
    /// when the feed rejects the shared token: the pass stops and returns it.
    pub async fn run_once(&self) -> Result<RelaySummary> {
        let registrations = self.store.list_all().await?;
        let mut summary = RelaySummary {
            registrations: registrations.len(),
            ..RelaySummary::default()
        };

        if registrations.is_empty() {
            info!("No bots to process");
            return Ok(summary);
        }

        let token = self
            .feed
            .authenticate()
            .await
            .context("Failed to authenticate with the feed service")?;

        for registration in &registrations {
            info!(
                "Processing bot {} - searching \"{}\"",
                registration.bot_id, registration.search_term
            );

            match self.relay_registration(&token, registration).await {
                Ok(progress) => {
                    summary.relayed += progress.posted;
                    if progress.rejected {
                        summary.failed += 1;
                    }
                }
                Err(e) if is_unauthorized(&e) => {
                    error!("Feed rejected the token, aborting pass: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Relay failed for bot {}: {:#}", registration.bot_id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Relay pass done: {} relayed, {} failed, {} bots",
            summary.relayed, summary.failed, summary.registrations
        );
        Ok(summary)
    }

    async fn relay_registration(
        &self,
        token: &str,
        registration: &BotRegistration,
    ) -> Result<Progress> {
        let cursor = registration.most_recent_id.as_deref();
        let items = self
            .feed
            .search(token, &registration.search_term, cursor)
            .await?;

        let deduped = dedupe(items, cursor, &self.rules, Utc::now());
        if deduped.kept.is_empty() {
            info!("Nothing new for bot {}", registration.bot_id);
            return Ok(Progress {
                posted: 0,
                rejected: false,
            });
        }

        info!(
            "Found {} item(s), posting to GroupMe",
            deduped.kept.len()
        );
        let mut posted = 0;
        for item in &deduped.kept {
            let request = BotPostRequest::text(&registration.bot_id, item.url());
            let status = self.poster.post(&request).await;
            if !status.is_success() {
                warn!("Failure posting item {} ({}), stopping", item.id, status);
                break;
            }
            posted += 1;
        }

        let rejected = posted < deduped.kept.len();
        let newest = if rejected {
            dedupe::newest_id(&deduped.kept[..posted])
        } else {
            deduped.newest_id
        };

        if let Some(newest) = newest.filter(|id| Some(id.as_str()) != cursor) {
            info!("Updating latest item to {}", newest);
            self.store
                .update_cursor(&registration.bot_id, &newest)
                .await?;
        }

        Ok(Progress { posted, rejected })
    }
}

fn is_unauthorized(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_unauthorized)
}
