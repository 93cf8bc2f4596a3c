use anyhow::Result;

use newsrelay_core::storage::{Database, DedupStore};
use newsrelay_core::AppConfig;

pub async fn run(config: &AppConfig, limit: u32) -> Result<()> {
    let db = Database::new(config).await?;
    let store = DedupStore::new(&db);

    let total = store.count().await?;
    if total == 0 {
        println!("Nothing has been posted yet.");
        return Ok(());
    }

    let records = store.recent(limit).await?;
    println!("Posted links ({} of {}):\n", records.len(), total);

    for record in &records {
        println!("  {}  {}", record.posted_at.format("%Y-%m-%d %H:%M"), record.url);
    }

    Ok(())
}
