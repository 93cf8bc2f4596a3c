use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use newsrelay_core::{storage::Database, AppConfig, NewsCycle, SchedulerService};

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

pub async fn run(config: &AppConfig) -> Result<()> {
    config.validate()?;

    let db = Database::new(config).await?;
    let cycle = Arc::new(NewsCycle::from_config(config, &db)?);
    let interval = Duration::from_secs(config.sync.cycle_interval_secs);
    let scheduler = SchedulerService::new(cycle, interval);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    println!("newsrelay started. Press Ctrl+C to stop.");
    println!("  Channel: {}", config.telegram.channel_id);
    println!("  Cycle interval: {} seconds", config.sync.cycle_interval_secs);

    // Blocks until shutdown
    scheduler.run(shutdown_rx).await;

    db.close().await;
    println!("newsrelay stopped.");

    Ok(())
}
