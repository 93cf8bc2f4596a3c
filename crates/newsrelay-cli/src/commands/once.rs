use anyhow::Result;

use newsrelay_core::{storage::Database, AppConfig, NewsCycle};

pub async fn run(config: &AppConfig) -> Result<()> {
    config.validate()?;

    let db = Database::new(config).await?;
    let cycle = NewsCycle::from_config(config, &db)?;

    println!("Running one news cycle...");
    let report = cycle.run_cycle().await?;
    db.close().await;

    println!(
        "Fetched {}, posted {}, already posted {}, failed {}.",
        report.fetched, report.posted, report.duplicates, report.failed
    );
    if !report.failed_sources.is_empty() {
        println!("Sources that failed: {}", report.failed_sources.join(", "));
    }

    Ok(())
}
