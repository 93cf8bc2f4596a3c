mod markdown;
mod telegram;

use async_trait::async_trait;

use crate::source::Item;
use crate::Result;

pub use markdown::{escape_markdown, format_message, RESERVED_CHARS};
pub use telegram::TelegramPublisher;

/// Delivers one item to the destination channel
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send `item`, retrying transient failures internally
    async fn post(&self, item: &Item) -> Result<()>;
}
