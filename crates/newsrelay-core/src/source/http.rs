use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Proxy, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{Error, Result};

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

pub const FEED_ACCEPT: &str =
    "application/rss+xml,application/atom+xml,application/feed+json,application/xml;q=0.9,*/*;q=0.8";
pub const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

// Some news sites refuse requests that do not look like a browser
static USER_AGENT_INDEX: AtomicUsize = AtomicUsize::new(0);
const BROWSER_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Get the next browser User-Agent in rotation
pub fn next_browser_user_agent() -> &'static str {
    let index = USER_AGENT_INDEX.fetch_add(1, Ordering::Relaxed) % BROWSER_USER_AGENTS.len();
    BROWSER_USER_AGENTS[index]
}

/// Build the shared HTTP client with optional proxy
///
/// No client-wide timeout is set; each request carries its own.
pub fn build_client(proxy_url: &Option<String>) -> Result<Client> {
    let mut builder = Client::builder()
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(ref proxy) = proxy_url {
        let proxy = Proxy::all(proxy)
            .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
        builder = builder.proxy(proxy);
        tracing::info!("Using HTTP proxy for source fetching");
    }

    builder.build().map_err(Error::Http)
}

pub fn build_headers(accept: &'static str, user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Ok(ua) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, ua);
    }
    headers
}

/// One GET attempt bounded by `timeout`, from connect until the body is read
pub async fn get_bytes(
    client: &Client,
    url: &str,
    timeout: Duration,
    headers: HeaderMap,
) -> Result<Bytes> {
    let response = send_checked(client, url, timeout, headers).await?;
    read_capped(response, url).await
}

/// Like [`get_bytes`], decoded with the charset named in `Content-Type`
///
/// Falls back to UTF-8 when no charset is given or the label is unknown.
/// A byte order mark overrides the declared charset.
pub async fn get_text(
    client: &Client,
    url: &str,
    timeout: Duration,
    headers: HeaderMap,
) -> Result<String> {
    let response = send_checked(client, url, timeout, headers).await?;
    let encoding = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let body = read_capped(response, url).await?;
    let (text, _, _) = encoding.decode(&body);
    Ok(text.into_owned())
}

async fn send_checked(
    client: &Client,
    url: &str,
    timeout: Duration,
    headers: HeaderMap,
) -> Result<Response> {
    let response = client
        .get(url)
        .headers(headers)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    if let Some(len) = response.content_length() {
        ensure_body_size(len as usize, url)?;
    }

    Ok(response)
}

/// Read the body chunk by chunk, stopping as soon as it passes the cap
async fn read_capped(mut response: Response, url: &str) -> Result<Bytes> {
    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        ensure_body_size(body.len() + chunk.len(), url)?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn ensure_body_size(size: usize, url: &str) -> Result<()> {
    if size > MAX_BODY_BYTES {
        return Err(Error::Other(format!(
            "Response too large ({} bytes) for URL: {}",
            size, url
        )));
    }
    Ok(())
}
