mod feed;
pub(crate) mod http;
mod scrape;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::Result;

pub use feed::{parse_feed_items, FeedSource};
pub use scrape::{extract_items, resolve_link, ScrapeSource};

/// One candidate news entry; `link` is its identity for deduplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub link: String,
}

impl Item {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// A place news items come from
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch the current items, retrying transient failures internally
    async fn fetch(&self) -> Result<Vec<Item>>;
}

/// The feed and scrape sources described by `config`, in merge order
///
/// Both share one HTTP client, routed through `sources.proxy_url` when set.
pub fn configured_sources(config: &AppConfig) -> Result<Vec<Arc<dyn NewsSource>>> {
    let client = http::build_client(&config.sources.proxy_url)?;
    let feed = FeedSource::new(config, client.clone());
    let scrape = ScrapeSource::new(config, client)?;
    let sources: Vec<Arc<dyn NewsSource>> = vec![Arc::new(feed), Arc::new(scrape)];
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_sources_order() {
        let mut config = AppConfig::default();
        config.sources.rss_url = "https://news.example/feed.xml".into();
        config.sources.scrape_url = "https://news.example/".into();

        let sources = configured_sources(&config).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["feed", "scrape"]);
    }

    #[test]
    fn test_configured_sources_rejects_bad_proxy() {
        let mut config = AppConfig::default();
        config.sources.scrape_url = "https://news.example/".into();
        config.sources.proxy_url = Some("not a proxy url".into());

        assert!(configured_sources(&config).is_err());
    }
}
