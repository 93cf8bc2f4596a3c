use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

use super::http::{build_headers, get_text, next_browser_user_agent, HTML_ACCEPT};
use super::{Item, NewsSource};
use crate::config::{AppConfig, ScrapeSelector};
use crate::retry::{with_retry, RetryPolicy};
use crate::{Error, Result};

/// Headlines scraped from an HTML page
pub struct ScrapeSource {
    client: Client,
    url: String,
    base: Url,
    selector: ScrapeSelector,
    timeout: Duration,
    policy: RetryPolicy,
}

impl ScrapeSource {
    /// Fails if the scrape URL or element selector cannot be parsed
    pub fn new(config: &AppConfig, client: Client) -> Result<Self> {
        let url = config.sources.scrape_url.clone();
        let base = Url::parse(&url)?;
        let selector = config.sources.scrape.clone();
        element_selector(&selector.element)?;

        Ok(Self {
            client,
            url,
            base,
            selector,
            timeout: Duration::from_secs(config.sources.scrape_timeout_secs),
            policy: RetryPolicy::fetch(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch_once(&self) -> Result<Vec<Item>> {
        let headers = build_headers(HTML_ACCEPT, next_browser_user_agent());
        let html = get_text(&self.client, &self.url, self.timeout, headers).await?;
        extract_items(&html, &self.selector, &self.base)
    }
}

#[async_trait]
impl NewsSource for ScrapeSource {
    fn name(&self) -> &str {
        "scrape"
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        tracing::info!(url = %self.url, "Scraping website");

        let items = with_retry(&self.policy, "scrape fetch", move || self.fetch_once()).await?;

        tracing::info!(url = %self.url, count = items.len(), "Found headlines from scraping");
        Ok(items)
    }
}

fn element_selector(element: &str) -> Result<Selector> {
    Selector::parse(element.trim())
        .map_err(|e| Error::Scrape(format!("invalid element selector '{}': {}", element, e)))
}

fn matches_attrs(element: &ElementRef<'_>, selector: &ScrapeSelector) -> bool {
    let value = element.value();
    selector.attrs.iter().all(|(key, expected)| {
        if key == "class" {
            value.classes().any(|class| class == expected)
        } else {
            value.attr(key) == Some(expected.as_str())
        }
    })
}

fn visible_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn href values into absolute links
///
/// Anything not already `http(s)://` is resolved against the scheme and host
/// of `base`, ignoring its path.
pub fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }

    let mut origin = base.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);

    origin.join(href).ok().map(String::from)
}

/// Pick headline items out of `html`
///
/// Only the first `selector.limit` matching elements are considered; those
/// without visible text or an href are dropped.
pub fn extract_items(html: &str, selector: &ScrapeSelector, base: &Url) -> Result<Vec<Item>> {
    let document = Html::parse_document(html);
    let element_selector = element_selector(&selector.element)?;

    let items = document
        .select(&element_selector)
        .filter(|element| matches_attrs(element, selector))
        .take(selector.limit)
        .filter_map(|element| {
            let title = visible_text(&element);
            let href = element.value().attr("href").map(str::trim).unwrap_or("");
            if title.is_empty() || href.is_empty() {
                return None;
            }
            let link = resolve_link(href, base)?;
            Some(Item { title, link })
        })
        .collect();

    Ok(items)
}
