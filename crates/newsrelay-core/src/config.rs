use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::{Error, Result};

const ENV_PREFIX: &str = "NEWSRELAY_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (holds the dedup database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level, used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather
    #[serde(default)]
    pub bot_token: String,
    /// Destination channel (numeric id or @channelname)
    #[serde(default)]
    pub channel_id: String,
    /// Italic caption appended to every post
    #[serde(default)]
    pub caption: String,
    /// Bot API base URL
    #[serde(default = "default_telegram_api")]
    pub api_base_url: String,
    /// Per-attempt timeout for sendMessage
    #[serde(default = "default_telegram_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: String::new(),
            caption: String::new(),
            api_base_url: default_telegram_api(),
            request_timeout_secs: default_telegram_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// RSS/Atom feed URL
    #[serde(default)]
    pub rss_url: String,
    /// Web page to scrape for headlines
    #[serde(default)]
    pub scrape_url: String,
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,
    /// HTTP proxy URL for fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub scrape: ScrapeSelector,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            rss_url: String::new(),
            scrape_url: String::new(),
            feed_timeout_secs: default_feed_timeout(),
            scrape_timeout_secs: default_scrape_timeout(),
            proxy_url: None,
            scrape: ScrapeSelector::default(),
        }
    }
}

/// Which elements of the scraped page count as headlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSelector {
    /// Tag name, e.g. "a"
    #[serde(default = "default_scrape_element")]
    pub element: String,
    /// Attributes every matched element must carry, e.g. { class = "headline" }
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Maximum number of matched elements to consider
    #[serde(default = "default_scrape_limit")]
    pub limit: usize,
}

impl Default for ScrapeSelector {
    fn default() -> Self {
        Self {
            element: default_scrape_element(),
            attrs: BTreeMap::new(),
            limit: default_scrape_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between news cycles
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Pause after each successful post
    #[serde(default = "default_post_delay")]
    pub post_delay_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            post_delay_secs: default_post_delay(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsrelay")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout() -> u64 {
    20
}

fn default_feed_timeout() -> u64 {
    10
}

fn default_scrape_timeout() -> u64 {
    15
}

fn default_scrape_element() -> String {
    "a".to_string()
}

fn default_scrape_limit() -> usize {
    10
}

fn default_cycle_interval() -> u64 {
    3600 // 1 hour
}

fn default_post_delay() -> u64 {
    5
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default path, or return defaults if it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific TOML file (missing file = defaults)
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Overlay `NEWSRELAY_*` process environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay settings from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = var("BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = var("CHANNEL_ID") {
            self.telegram.channel_id = v;
        }
        if let Some(v) = var("CAPTION") {
            self.telegram.caption = v;
        }
        if let Some(v) = var("RSS_URL") {
            self.sources.rss_url = v;
        }
        if let Some(v) = var("SCRAPE_URL") {
            self.sources.scrape_url = v;
        }
        if let Some(v) = var("SCRAPE_ELEMENT") {
            self.sources.scrape.element = v;
        }
        if let (Some(key), Some(value)) = (var("SCRAPE_ATTR_KEY"), var("SCRAPE_ATTR_VALUE")) {
            self.sources.scrape.attrs.insert(key, value);
        }
        if let Some(v) = var("SCHEDULE_MINUTES") {
            let minutes: u64 = v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_PREFIX}SCHEDULE_MINUTES is not a number: {v}")))?;
            self.sync.cycle_interval_secs = minutes.checked_mul(60).ok_or_else(|| {
                Error::Config(format!("{ENV_PREFIX}SCHEDULE_MINUTES is too large: {v}"))
            })?;
        }
        if let Some(v) = var("DATA_DIR") {
            self.general.data_dir = PathBuf::from(v);
        }

        Ok(())
    }

    /// Check that every setting a cycle depends on is present and well formed
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.trim().is_empty() {
            missing.push("telegram.bot_token");
        }
        if self.telegram.channel_id.trim().is_empty() {
            missing.push("telegram.channel_id");
        }
        if self.telegram.caption.trim().is_empty() {
            missing.push("telegram.caption");
        }
        if self.sources.rss_url.trim().is_empty() {
            missing.push("sources.rss_url");
        }
        if self.sources.scrape_url.trim().is_empty() {
            missing.push("sources.scrape_url");
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        for (name, value) in [
            ("sources.rss_url", &self.sources.rss_url),
            ("sources.scrape_url", &self.sources.scrape_url),
            ("telegram.api_base_url", &self.telegram.api_base_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} is not a valid URL ({e}): {value}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!("{name} must be an http(s) URL: {value}")));
            }
        }

        if self.sources.scrape.element.trim().is_empty() {
            return Err(Error::Config("sources.scrape.element must not be empty".into()));
        }
        if self.sync.cycle_interval_secs == 0 {
            return Err(Error::Config("sync.cycle_interval_secs must be greater than 0".into()));
        }

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newsrelay/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newsrelay")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("newsrelay.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
