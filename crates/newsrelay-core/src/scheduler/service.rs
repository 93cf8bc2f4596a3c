use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::cycle::{CycleReport, NewsCycle};
use crate::Result;

/// Runs a news cycle on a fixed interval until told to stop
pub struct SchedulerService {
    cycle: Arc<NewsCycle>,
    interval: Duration,
}

impl SchedulerService {
    pub fn new(cycle: Arc<NewsCycle>, interval: Duration) -> Self {
        Self { cycle, interval }
    }

    /// Run a single cycle
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.cycle.run_cycle().await
    }

    /// Run one cycle now, then one per interval, until `shutdown` is true
    ///
    /// The shutdown signal is observed between cycles; a running cycle is
    /// always allowed to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.cycle.run_cycle().await {
                        error!("Scheduled news cycle failed: {}", e);
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}
