use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::groupme::poster::BotPoster;
use crate::groupme::service::{GroupMeApi, Group, User};
use crate::groupme::BotPostRequest;
use crate::storage::{BotRegistration, RegistrationStore};

fn welcome_text(search_term: &str) -> String {
    format!(
        "Hello! I'm TwitterBot. I'll be searching Twitter every five minutes for references of '{}'. If I find anything, I'll post it here!",
        search_term
    )
}

/// A registration joined with the name of the group it posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotDetails {
    pub bot_id: String,
    pub group_id: String,
    /// None when the user no longer belongs to the group.
    pub group_name: Option<String>,
    pub search_term: String,
    pub most_recent_id: Option<String>,
}

impl BotDetails {
    pub fn join(registrations: Vec<BotRegistration>, groups: &[Group]) -> Vec<Self> {
        let names: HashMap<&str, &str> = groups
            .iter()
            .map(|g| (g.id.as_str(), g.name.as_str()))
            .collect();

        registrations
            .into_iter()
            .map(|r| BotDetails {
                group_name: names.get(r.group_id.as_str()).map(|n| n.to_string()),
                bot_id: r.bot_id,
                group_id: r.group_id,
                search_term: r.search_term,
                most_recent_id: r.most_recent_id,
            })
            .collect()
    }
}

/// What a user sees when managing their feed bots.
#[derive(Debug, Clone)]
pub struct Overview {
    pub user: User,
    /// Most recently active first.
    pub groups: Vec<Group>,
    pub bots: Vec<BotDetails>,
}

/// Creates feed bots in a user's groups and records them for the relay job.
pub struct Registrar {
    groupme: Arc<dyn GroupMeApi>,
    poster: Arc<dyn BotPoster>,
    store: RegistrationStore,
    bot_name: String,
    avatar_url: Option<String>,
}

impl Registrar {
    pub fn new(
        groupme: Arc<dyn GroupMeApi>,
        poster: Arc<dyn BotPoster>,
        store: RegistrationStore,
        config: &RelayConfig,
    ) -> Self {
        Self {
            groupme,
            poster,
            store,
            bot_name: config.bot_name.clone(),
            avatar_url: config.avatar_url.clone(),
        }
    }

    /// Create a bot named after the search term, greet the group and store it.
    pub async fn register(
        &self,
        access_token: &str,
        group_id: &str,
        search_term: &str,
    ) -> Result<BotRegistration> {
        let search_term = search_term.trim();
        if access_token.trim().is_empty() {
            bail!("No user token");
        }
        if group_id.trim().is_empty() {
            bail!("No group id");
        }
        if search_term.is_empty() {
            bail!("No search term");
        }

        let user = self.groupme.current_user(access_token).await?;
        let name = format!("{} {}", self.bot_name, search_term);
        let bot = self
            .groupme
            .create_bot(
                access_token,
                group_id,
                &name,
                self.avatar_url.as_deref(),
                None,
            )
            .await?;
        info!("New bot created: {} in group {}", bot.bot_id, group_id);

        let status = self
            .poster
            .post(&BotPostRequest::text(&bot.bot_id, welcome_text(search_term)))
            .await;
        if !status.is_success() {
            warn!("Welcome message for bot {} was rejected ({})", bot.bot_id, status);
        }

        let registration = BotRegistration::new(&bot.bot_id, &user.id, group_id, search_term);
        self.store
            .upsert(&registration)
            .await
            .context("Bot created but storing it failed")?;
        info!("Bot {} stored", registration.bot_id);

        Ok(registration)
    }

    pub async fn overview(&self, access_token: &str) -> Result<Overview> {
        let user = self.groupme.current_user(access_token).await?;
        let mut groups = self.groupme.groups(access_token).await?;
        groups.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let registrations = self.store.list_for_user(&user.id).await?;
        let bots = BotDetails::join(registrations, &groups);

        Ok(Overview { user, groups, bots })
    }
}
