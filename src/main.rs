mod cli;
mod config;
mod error;
mod groupme;
mod relay;
mod responder;
mod scheduler;
mod storage;
#[cfg(test)]
mod testing;
mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::error::ApiError;
use crate::groupme::poster::{BotPoster, HttpBotPoster};
use crate::groupme::service::GroupMeClient;
use crate::relay::dedupe::DedupeRules;
use crate::relay::registrar::Registrar;
use crate::relay::twitter::TwitterClient;
use crate::relay::RelayJob;
use crate::responder::Responder;
use crate::scheduler::Scheduler;
use crate::storage::RegistrationStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dinobot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from: {}", cli.config.display());
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let result = run(cli.command, config).await;
    let unauthorized = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<ApiError>())
        .is_some_and(ApiError::is_unauthorized);
    if unauthorized {
        eprintln!("Credentials were rejected. Log in again for a fresh access token, or check the Twitter app key and secret.");
    }
    result
}

async fn run(command: Command, config: Config) -> Result<()> {
    let http = config.http_client()?;
    let poster: Arc<dyn BotPoster> = Arc::new(HttpBotPoster::new(
        http.clone(),
        config.groupme.bot_post_url.clone(),
    ));

    match command {
        Command::Serve => {
            let responder = Arc::new(Responder::new(poster, config.responder.clone()));
            webhook::serve(&config.webhook.listen_address, responder).await
        }
        Command::Relay => {
            let job = relay_job(&config, http, poster)?;
            let summary = job.run_once().await?;
            println!(
                "Relayed {} item(s) for {} bot(s), {} failed",
                summary.relayed, summary.registrations, summary.failed
            );
            Ok(())
        }
        Command::Run => {
            let job = Arc::new(relay_job(&config, http, poster.clone())?);
            let mut scheduler = Scheduler::new().await?;
            scheduler::tasks::register_relay_job(&scheduler, &config.relay.schedule, job).await?;
            scheduler.start().await?;

            let responder = Arc::new(Responder::new(poster, config.responder.clone()));
            let served = tokio::select! {
                served = webhook::serve(&config.webhook.listen_address, responder) => served,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    Ok(())
                }
            };
            scheduler.shutdown().await?;
            served
        }
        Command::Register {
            access_token,
            group_id,
            search_term,
        } => {
            let registrar = registrar(&config, http, poster)?;
            let registration = registrar
                .register(&access_token, &group_id, &search_term.join(" "))
                .await?;
            println!(
                "Bot {} created in group {}, searching \"{}\"",
                registration.bot_id, registration.group_id, registration.search_term
            );
            Ok(())
        }
        Command::Bots { access_token } => {
            let overview = registrar(&config, http, poster)?
                .overview(&access_token)
                .await?;
            println!("Hello, {}!", overview.user.name);

            println!("\nGroups:");
            for group in &overview.groups {
                println!("  {}  {}", group.id, group.name);
            }

            println!("\nFeed bots:");
            if overview.bots.is_empty() {
                println!("  (none)");
            }
            for bot in &overview.bots {
                println!(
                    "  {}  {} ({})  \"{}\"  last: {}",
                    bot.bot_id,
                    bot.group_name.as_deref().unwrap_or("unknown group"),
                    bot.group_id,
                    bot.search_term,
                    bot.most_recent_id.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

fn relay_job(config: &Config, http: reqwest::Client, poster: Arc<dyn BotPoster>) -> Result<RelayJob> {
    let store = RegistrationStore::open(&config.storage.database_path)?;
    let feed = TwitterClient::new(http, &config.twitter);
    let rules = DedupeRules::new(
        config.twitter.spam_markers.clone(),
        chrono::Duration::seconds(config.twitter.retweet_window_secs),
    );
    Ok(RelayJob::new(store, Arc::new(feed), poster, rules))
}

fn registrar(config: &Config, http: reqwest::Client, poster: Arc<dyn BotPoster>) -> Result<Registrar> {
    let store = RegistrationStore::open(&config.storage.database_path)?;
    let groupme = GroupMeClient::new(http, config.groupme.api_base_url.clone());
    Ok(Registrar::new(Arc::new(groupme), poster, store, &config.relay))
}
