pub mod classifier;
pub mod composer;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::config::{parse_list_override, ResponderConfig, ALLOWED_USERS_ENV, TRIGGER_PHRASES_ENV};
use crate::groupme::poster::BotPoster;
use crate::groupme::InboundMessage;

use self::classifier::{classify, Trigger};
use self::composer::{compose_after_delay, ReplyDirective, DINO, RANDY};

/// Reads one environment key. Injected so tests never touch the process environment.
pub type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Rule inputs for a single invocation.
#[derive(Debug, Clone)]
pub struct ResponderSettings {
    pub allowed_user_ids: HashSet<String>,
    /// Lower-cased, since they are matched against lower-cased text.
    pub trigger_phrases: Vec<String>,
    pub question_weight: f64,
    pub max_emoji: u32,
    pub post_delay: Duration,
}

impl ResponderSettings {
    /// Config values, with the allow-list and trigger phrases replaced by any
    /// non-empty environment override.
    pub fn resolve(config: &ResponderConfig, env: &EnvLookup) -> Self {
        let allowed = override_or(ALLOWED_USERS_ENV, &config.allowed_user_ids, env);
        let phrases = override_or(TRIGGER_PHRASES_ENV, &config.trigger_phrases, env);

        Self {
            allowed_user_ids: allowed.into_iter().collect(),
            trigger_phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
            question_weight: config.question_reply_weight,
            max_emoji: config.max_emoji,
            post_delay: Duration::from_millis(config.post_delay_ms),
        }
    }
}

fn override_or(key: &str, default: &[String], env: &EnvLookup) -> Vec<String> {
    match env(key).as_deref().and_then(parse_list_override) {
        Some(values) => {
            debug!("Using {}: {:?}", key, values);
            values
        }
        None => {
            debug!("Using default {}", key);
            default.to_vec()
        }
    }
}

impl Trigger {
    /// What to post for this trigger, threaded relative to `message`.
    pub fn directive(self, message: &InboundMessage, settings: &ResponderSettings) -> ReplyDirective {
        let existing = message.existing_reply();
        let (emoji, count, reply_to, base_reply_id) = match self {
            Trigger::CountRequest(n) => (
                DINO,
                n,
                existing.map(|r| r.reply_id.clone()),
                existing.and_then(|r| r.base_reply_id.clone()),
            ),
            Trigger::DirectAddress => (
                DINO,
                1,
                existing.map(|r| r.reply_id.clone()),
                existing.and_then(|r| r.base_reply_id.clone()),
            ),
            Trigger::FixedPhrase => (RANDY, 1, None, None),
            Trigger::Question => (
                DINO,
                1,
                message.id.clone(),
                existing.and_then(|r| r.base_reply_id.clone()),
            ),
        };

        ReplyDirective {
            emoji,
            count,
            delay: settings.post_delay,
            reply_to,
            base_reply_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a group message, or no text.
    Ignored,
    /// No rule fired.
    NoAction,
    /// The platform accepted the reply.
    Posted(Trigger),
    /// A rule fired but the platform did not accept the reply.
    Rejected(Trigger, StatusCode),
}

impl Outcome {
    pub fn posted(&self) -> bool {
        matches!(self, Outcome::Posted(_))
    }
}

/// Runs one inbound message through classify → compose → post.
pub struct Responder {
    poster: Arc<dyn BotPoster>,
    config: ResponderConfig,
    env: Box<EnvLookup>,
    rng: Mutex<StdRng>,
}

impl Responder {
    pub fn new(poster: Arc<dyn BotPoster>, config: ResponderConfig) -> Self {
        Self::with_parts(
            poster,
            config,
            Box::new(|key: &str| std::env::var(key).ok()),
            StdRng::from_entropy(),
        )
    }

    pub fn with_parts(
        poster: Arc<dyn BotPoster>,
        config: ResponderConfig,
        env: Box<EnvLookup>,
        rng: StdRng,
    ) -> Self {
        Self {
            poster,
            config,
            env,
            rng: Mutex::new(rng),
        }
    }

    pub async fn respond(&self, bot_id: &str, message: &InboundMessage) -> Outcome {
        info!(
            "Parsed message for group {}",
            message.group_id.as_deref().unwrap_or("<none>")
        );
        if !message.is_group_message() {
            info!("Not a group message, ignoring");
            return Outcome::Ignored;
        }
        if !message.is_actionable() {
            return Outcome::Ignored;
        }

        let settings = ResponderSettings::resolve(&self.config, &*self.env);
        let text = message.text.as_deref().unwrap_or_default();
        let user_id = message.user_id.as_deref().unwrap_or_default();

        let trigger = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            classify(text, user_id, &settings, &mut *rng)
        };
        let Some(trigger) = trigger else {
            info!("No rule matched");
            return Outcome::NoAction;
        };

        let directive = trigger.directive(message, &settings);
        info!("Replying with {:?} ({} emoji)", trigger, directive.count);

        let post = compose_after_delay(&directive).await;
        let status = self.poster.post(&post.into_request(bot_id)).await;
        if status == StatusCode::ACCEPTED {
            info!("Reply accepted");
            Outcome::Posted(trigger)
        } else {
            warn!("Reply for {:?} not accepted: {}", trigger, status);
            Outcome::Rejected(trigger, status)
        }
    }
}
