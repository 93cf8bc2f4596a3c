use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("Telegram API error {code}: {description}")]
    Telegram { code: u16, description: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("A news cycle is already running")]
    CycleInProgress,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Network-level failures worth another attempt: connection problems,
    /// timeouts, truncated bodies, rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::HttpStatus { status, .. } => is_transient_status(*status),
            Error::Telegram { code, .. } => is_transient_status(*code),
            _ => false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, Error>;
