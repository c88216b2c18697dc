use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment key holding the comma-separated user ids allowed to address the bot.
pub const ALLOWED_USERS_ENV: &str = "CanAddressDino";
/// Environment key holding the comma-separated trigger phrases.
pub const TRIGGER_PHRASES_ENV: &str = "DinoAddressTrigger";
pub const TWITTER_APP_KEY_ENV: &str = "TwitterAppKey";
pub const TWITTER_APP_SECRET_ENV: &str = "TwitterAppSecret";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub groupme: GroupMeConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupMeConfig {
    #[serde(default = "default_bot_post_url")]
    pub bot_post_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResponderConfig {
    /// Users allowed to address the bot directly. Empty means anyone.
    #[serde(default)]
    pub allowed_user_ids: Vec<String>,
    #[serde(default = "default_trigger_phrases")]
    pub trigger_phrases: Vec<String>,
    /// Probability of answering a message that contains a question mark.
    #[serde(default = "default_question_reply_weight")]
    pub question_reply_weight: f64,
    #[serde(default = "default_max_emoji")]
    pub max_emoji: u32,
    /// Pause before each emoji post, so a reply lands after the message it references.
    #[serde(default = "default_post_delay_ms")]
    pub post_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_spam_markers")]
    pub spam_markers: Vec<String>,
    #[serde(default = "default_retweet_window_secs")]
    pub retweet_window_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Cron expression (with seconds) for the scheduled relay pass.
    #[serde(default = "default_relay_schedule")]
    pub schedule: String,
    #[serde(default = "default_relay_bot_name")]
    pub bot_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_bot_post_url() -> String {
    "https://api.groupme.com/v3/bots/post".to_string()
}

fn default_api_base_url() -> String {
    "https://api.groupme.com/v3".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_trigger_phrases() -> Vec<String> {
    vec!["hey dinobot".to_string()]
}

fn default_question_reply_weight() -> f64 {
    0.075
}

fn default_max_emoji() -> u32 {
    100
}

fn default_post_delay_ms() -> u64 {
    500
}

fn default_token_url() -> String {
    "https://api.twitter.com/oauth2/token".to_string()
}

fn default_search_url() -> String {
    "https://api.twitter.com/1.1/search/tweets.json".to_string()
}

fn default_spam_markers() -> Vec<String> {
    vec!["GroupMe by Cat Eyes".to_string()]
}

fn default_retweet_window_secs() -> i64 {
    300
}

fn default_relay_schedule() -> String {
    "0 */5 * * * *".to_string()
}

fn default_relay_bot_name() -> String {
    "TwitterBot".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("dinobot.db")
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GroupMeConfig {
    fn default() -> Self {
        Self {
            bot_post_url: default_bot_post_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            allowed_user_ids: Vec::new(),
            trigger_phrases: default_trigger_phrases(),
            question_reply_weight: default_question_reply_weight(),
            max_emoji: default_max_emoji(),
            post_delay_ms: default_post_delay_ms(),
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            token_url: default_token_url(),
            search_url: default_search_url(),
            spam_markers: default_spam_markers(),
            retweet_window_secs: default_retweet_window_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            schedule: default_relay_schedule(),
            bot_name: default_relay_bot_name(),
            avatar_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill Twitter credentials from the environment when the file leaves them empty.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.twitter.app_key.is_empty() {
            if let Some(key) = lookup(TWITTER_APP_KEY_ENV) {
                self.twitter.app_key = key;
            }
        }
        if self.twitter.app_secret.is_empty() {
            if let Some(secret) = lookup(TWITTER_APP_SECRET_ENV) {
                self.twitter.app_secret = secret;
            }
        }
    }

    /// Shared HTTP client; every outbound call is bounded by the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }
}

/// Split a comma-separated override value. Returns `None` when the value
/// holds no usable entries, so the caller keeps its defaults.
pub fn parse_list_override(value: &str) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.responder.trigger_phrases, vec!["hey dinobot"]);
        assert!(config.responder.allowed_user_ids.is_empty());
        assert_eq!(config.responder.max_emoji, 100);
        assert_eq!(config.responder.post_delay_ms, 500);
        assert!((config.responder.question_reply_weight - 0.075).abs() < f64::EPSILON);
        assert_eq!(config.twitter.retweet_window_secs, 300);
        assert_eq!(config.relay.schedule, "0 */5 * * * *");
        assert_eq!(config.storage.database_path, PathBuf::from("dinobot.db"));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [responder]
            allowed_user_ids = ["111", "222"]
            max_emoji = 10

            [webhook]
            listen_address = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.responder.allowed_user_ids, vec!["111", "222"]);
        assert_eq!(config.responder.max_emoji, 10);
        assert_eq!(config.responder.trigger_phrases, vec!["hey dinobot"]);
        assert_eq!(config.webhook.listen_address, "127.0.0.1:9000");
        assert_eq!(
            config.groupme.bot_post_url,
            "https://api.groupme.com/v3/bots/post"
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[twitter]\napp_key = \"key\"\napp_secret = \"secret\"\n\n[storage]\ndatabase_path = \"bots.db\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.twitter.app_key, "key");
        assert_eq!(config.twitter.app_secret, "secret");
        assert_eq!(config.storage.database_path, PathBuf::from("bots.db"));
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.relay.bot_name, "TwitterBot");
        assert_eq!(config.relay.avatar_url, None);
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.twitter.spam_markers, vec!["GroupMe by Cat Eyes"]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Config::load(Path::new("/nonexistent/dinobot.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_env_fills_empty_twitter_credentials_only() {
        let mut config = Config::default();
        config.twitter.app_secret = "from-file".to_string();
        config.apply_env(|key| match key {
            TWITTER_APP_KEY_ENV => Some("env-key".to_string()),
            TWITTER_APP_SECRET_ENV => Some("env-secret".to_string()),
            _ => None,
        });
        assert_eq!(config.twitter.app_key, "env-key");
        assert_eq!(config.twitter.app_secret, "from-file");
    }

    #[test]
    fn test_parse_list_override() {
        assert_eq!(
            parse_list_override("hey dinobot, yo dino ,,"),
            Some(vec!["hey dinobot".to_string(), "yo dino".to_string()])
        );
        assert_eq!(parse_list_override(" , "), None);
        assert_eq!(parse_list_override(""), None);
    }
}
