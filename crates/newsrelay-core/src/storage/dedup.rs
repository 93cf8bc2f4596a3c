use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::storage_policy;
use super::Database;
use crate::retry::with_retry;
use crate::Result;

/// A URL that has been delivered and must never be posted again
#[derive(Debug, Clone, FromRow)]
pub struct PostedRecord {
    pub url: String,
    pub posted_at: DateTime<Utc>,
}

/// Persistent set of already-posted URLs
///
/// The only writer of `posted_articles`. Reads fail closed (a storage error
/// reports the URL as posted) and writes fail open (logged, not returned).
#[derive(Clone)]
pub struct DedupStore {
    db: Database,
}

impl DedupStore {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Whether `url` has been posted. Storage failures answer `true`.
    pub async fn is_posted(&self, url: &str) -> bool {
        match self.try_is_posted(url).await {
            Ok(posted) => posted,
            Err(e) => {
                tracing::error!(%url, error = %e, "Failed to check posted URL, assuming posted");
                true
            }
        }
    }

    /// Record `url` as posted. Already-recorded URLs are left untouched.
    /// Storage failures are logged and swallowed.
    pub async fn mark_posted(&self, url: &str) {
        if let Err(e) = self.try_mark_posted(url).await {
            tracing::error!(%url, error = %e, "Failed to record posted URL");
        }
    }

    async fn try_is_posted(&self, url: &str) -> std::result::Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = with_retry(&storage_policy(), "is_posted", move || {
            sqlx::query_as("SELECT 1 FROM posted_articles WHERE url = ?")
                .bind(url)
                .fetch_optional(self.db.pool())
        })
        .await?;

        Ok(row.is_some())
    }

    async fn try_mark_posted(&self, url: &str) -> std::result::Result<bool, sqlx::Error> {
        let result = with_retry(&storage_policy(), "mark_posted", move || {
            sqlx::query("INSERT OR IGNORE INTO posted_articles (url, posted_at) VALUES (?, ?)")
                .bind(url)
                .bind(Utc::now())
                .execute(self.db.pool())
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of posted URLs
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posted_articles")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Most recently posted URLs, newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<PostedRecord>> {
        let records = sqlx::query_as::<_, PostedRecord>(
            "SELECT url, posted_at FROM posted_articles ORDER BY posted_at DESC, url LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }
}
