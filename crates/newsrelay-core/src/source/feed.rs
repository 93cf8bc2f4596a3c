use async_trait::async_trait;
use feed_rs::model::Link;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;

use super::http::{build_headers, get_bytes, FEED_ACCEPT};
use super::{Item, NewsSource};
use crate::config::AppConfig;
use crate::retry::{with_retry, RetryPolicy};
use crate::{Error, Result};

const FEED_USER_AGENT: &str = concat!("newsrelay/", env!("CARGO_PKG_VERSION"));

/// RSS/Atom/JSON feed source
pub struct FeedSource {
    client: Client,
    url: String,
    timeout: Duration,
    policy: RetryPolicy,
}

impl FeedSource {
    pub fn new(config: &AppConfig, client: Client) -> Self {
        Self {
            client,
            url: config.sources.rss_url.clone(),
            timeout: Duration::from_secs(config.sources.feed_timeout_secs),
            policy: RetryPolicy::fetch(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch_once(&self) -> Result<Vec<Item>> {
        let headers = build_headers(FEED_ACCEPT, FEED_USER_AGENT);
        let content = get_bytes(&self.client, &self.url, self.timeout, headers).await?;
        parse_feed_items(&content)
    }
}

#[async_trait]
impl NewsSource for FeedSource {
    fn name(&self) -> &str {
        "feed"
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        tracing::info!(url = %self.url, "Fetching feed");

        let items = with_retry(&self.policy, "feed fetch", move || self.fetch_once()).await?;

        tracing::info!(url = %self.url, count = items.len(), "Found entries in feed");
        Ok(items)
    }
}

/// Map every feed entry that has a link to an [`Item`], in document order
pub fn parse_feed_items(content: &[u8]) -> Result<Vec<Item>> {
    let feed = parser::parse(content)
        .map_err(|e| Error::FeedParse(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(link) = entry_link(entry.links) else {
                tracing::debug!(id = %entry.id, "Skipping feed entry without a link");
                return None;
            };

            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            Some(Item { title, link })
        })
        .collect();

    Ok(items)
}

/// The entry's article link: the first `alternate` (or rel-less) link,
/// otherwise whatever link comes first
fn entry_link(links: Vec<Link>) -> Option<String> {
    let alternate = links
        .iter()
        .position(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"));
    links
        .into_iter()
        .nth(alternate.unwrap_or(0))
        .map(|l| l.href)
}
