use anyhow::Result;

use newsrelay_core::source::{configured_sources, NewsSource};
use newsrelay_core::storage::{Database, DedupStore};
use newsrelay_core::AppConfig;

pub async fn run(config: &AppConfig, fetch: bool) -> Result<()> {
    if let Err(e) = config.validate() {
        println!("Configuration is invalid: {}", e);
        anyhow::bail!("configuration check failed");
    }

    println!("Configuration OK");
    println!("  Feed:     {}", config.sources.rss_url);
    println!("  Scrape:   {} ({})", config.sources.scrape_url, config.sources.scrape.element);
    for (key, value) in &config.sources.scrape.attrs {
        println!("            {}=\"{}\"", key, value);
    }
    println!("  Channel:  {}", config.telegram.channel_id);
    println!("  Interval: {} seconds", config.sync.cycle_interval_secs);
    println!("  Database: {}", config.database_path().display());

    if !fetch {
        return Ok(());
    }

    let db = Database::new(config).await?;
    let store = DedupStore::new(&db);

    for source in configured_sources(config)? {
        println!();
        match source.fetch().await {
            Ok(items) => {
                println!("{}: {} items", source.name(), items.len());
                for item in &items {
                    let marker = if store.is_posted(&item.link).await { " " } else { "+" };
                    println!("  {} {}", marker, item.title);
                    println!("      {}", item.link);
                }
            }
            Err(e) => println!("{}: failed ({})", source.name(), e),
        }
    }

    db.close().await;
    Ok(())
}
