use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::publisher::{Publisher, TelegramPublisher};
use crate::source::http::build_client;
use crate::source::{configured_sources, Item, NewsSource};
use crate::storage::{Database, DedupStore};
use crate::{Error, Result};

/// Where a cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Filtering,
    Posting,
}

/// Outcome of one fetch → dedupe → post cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items returned by all sources combined
    pub fetched: usize,
    /// Items skipped because their link was already posted
    pub duplicates: usize,
    /// Items delivered and recorded
    pub posted: usize,
    /// Items the publisher gave up on
    pub failed: usize,
    /// Names of sources whose fetch failed
    pub failed_sources: Vec<String>,
}

/// Fetches from every source, filters against the dedup store and posts
/// new items one at a time with a pause between consecutive posts
pub struct NewsCycle {
    sources: Vec<Arc<dyn NewsSource>>,
    publisher: Arc<dyn Publisher>,
    store: DedupStore,
    post_delay: Duration,
    running: Mutex<()>,
    state: watch::Sender<CycleState>,
}

impl NewsCycle {
    /// Sources are merged in the order given here
    pub fn new(
        sources: Vec<Arc<dyn NewsSource>>,
        publisher: Arc<dyn Publisher>,
        store: DedupStore,
        post_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            sources,
            publisher,
            store,
            post_delay,
            running: Mutex::new(()),
            state,
        }
    }

    /// Wire up the feed and scrape sources and the Telegram publisher
    pub fn from_config(config: &AppConfig, db: &Database) -> Result<Self> {
        let publisher = TelegramPublisher::new(config, build_client(&None)?);

        Ok(Self::new(
            configured_sources(config)?,
            Arc::new(publisher),
            DedupStore::new(db),
            Duration::from_secs(config.sync.post_delay_secs),
        ))
    }

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: CycleState) {
        self.state.send_replace(state);
    }

    /// Run one full cycle
    ///
    /// Only `Error::CycleInProgress` is returned, when another cycle holds
    /// the guard; every other failure is logged and reflected in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("News cycle already in progress, skipping");
            return Err(Error::CycleInProgress);
        };

        info!("Starting news cycle");
        let mut report = CycleReport::default();

        self.set_state(CycleState::Fetching);
        let items = self.fetch_all(&mut report).await;
        report.fetched = items.len();

        if items.is_empty() {
            info!("No articles found in this cycle");
        } else {
            info!(count = items.len(), "Fetched articles, filtering for new ones");
            self.post_new(&items, &mut report).await;
        }

        self.set_state(CycleState::Idle);
        info!(
            posted = report.posted,
            duplicates = report.duplicates,
            failed = report.failed,
            "News cycle complete"
        );
        Ok(report)
    }

    /// Fetch every source concurrently and concatenate in registration order
    async fn fetch_all(&self, report: &mut CycleReport) -> Vec<Item> {
        let results = join_all(
            self.sources
                .iter()
                .map(|source| async move { (source.name(), source.fetch().await) }),
        )
        .await;

        let mut items = Vec::new();
        for (name, result) in results {
            match result {
                Ok(fetched) => items.extend(fetched),
                Err(e) => {
                    error!(source = name, error = %e, "A source failed");
                    report.failed_sources.push(name.to_string());
                }
            }
        }
        items
    }

    async fn post_new(&self, items: &[Item], report: &mut CycleReport) {
        let mut handled: HashSet<&str> = HashSet::new();
        let mut pace = false;

        for item in items {
            self.set_state(CycleState::Filtering);

            if !handled.insert(item.link.as_str()) || self.store.is_posted(&item.link).await {
                debug!(url = %item.link, "Already posted, skipping");
                report.duplicates += 1;
                continue;
            }

            self.set_state(CycleState::Posting);

            // rate limit between consecutive successful posts
            if pace {
                tokio::time::sleep(self.post_delay).await;
            }

            match self.publisher.post(item).await {
                Ok(()) => {
                    self.store.mark_posted(&item.link).await;
                    report.posted += 1;
                    pace = true;
                }
                Err(e) => {
                    error!(url = %item.link, error = %e, "Failed to post article after all retries");
                    report.failed += 1;
                    pace = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;

    struct FakeSource {
        name: &'static str,
        result: StdMutex<Option<Result<Vec<Item>>>>,
        delay: Duration,
    }

    impl FakeSource {
        fn ok(name: &'static str, items: Vec<Item>) -> Arc<dyn NewsSource> {
            Arc::new(Self {
                name,
                result: StdMutex::new(Some(Ok(items))),
                delay: Duration::ZERO,
            })
        }

        fn failing(name: &'static str) -> Arc<dyn NewsSource> {
            Arc::new(Self {
                name,
                result: StdMutex::new(Some(Err(Error::HttpStatus {
                    status: 503,
                    url: format!("https://{name}.example"),
                }))),
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &'static str, items: Vec<Item>, delay: Duration) -> Arc<dyn NewsSource> {
            Arc::new(Self {
                name,
                result: StdMutex::new(Some(Ok(items))),
                delay,
            })
        }
    }

    #[async_trait]
    impl NewsSource for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<Item>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        fail_links: Vec<String>,
        attempts: StdMutex<Vec<(String, Instant)>>,
    }

    impl FakePublisher {
        fn failing_on(links: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                fail_links: links.iter().map(|l| l.to_string()).collect(),
                ..Default::default()
            })
        }

        fn attempted(&self) -> Vec<String> {
            self.attempts.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
        }

        fn times(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn post(&self, item: &Item) -> Result<()> {
            self.attempts
                .lock()
                .unwrap()
                .push((item.link.clone(), Instant::now()));
            if self.fail_links.contains(&item.link) {
                Err(Error::Telegram { code: 400, description: "Bad Request".into() })
            } else {
                Ok(())
            }
        }
    }

    fn items(prefix: &str, n: usize) -> Vec<Item> {
        (1..=n)
            .map(|i| Item::new(format!("{prefix} {i}"), format!("https://{prefix}/{i}")))
            .collect()
    }

    async fn cycle_with(
        sources: Vec<Arc<dyn NewsSource>>,
        publisher: Arc<FakePublisher>,
        delay: Duration,
    ) -> (NewsCycle, DedupStore) {
        let db = Database::new_in_memory().await.unwrap();
        let store = DedupStore::new(&db);
        let cycle = NewsCycle::new(sources, publisher, store.clone(), delay);
        (cycle, store)
    }

    #[tokio::test]
    async fn test_failed_source_does_not_block_other() {
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, store) = cycle_with(
            vec![FakeSource::failing("feed"), FakeSource::ok("scrape", items("b", 3))],
            publisher.clone(),
            Duration::ZERO,
        )
        .await;

        let report = cycle.run_cycle().await.unwrap();

        assert_eq!(report.posted, 3);
        assert_eq!(report.failed_sources, vec!["feed".to_string()]);
        assert_eq!(publisher.attempted().len(), 3);
        assert!(store.is_posted("https://b/3").await);
    }

    #[tokio::test]
    async fn test_all_sources_failing_posts_nothing() {
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, _) = cycle_with(
            vec![FakeSource::failing("feed"), FakeSource::failing("scrape")],
            publisher.clone(),
            Duration::ZERO,
        )
        .await;

        let report = cycle.run_cycle().await.unwrap();

        assert_eq!(report.posted, 0);
        assert_eq!(report.fetched, 0);
        assert_eq!(report.failed_sources.len(), 2);
        assert!(publisher.attempted().is_empty());
        assert_eq!(cycle.state(), CycleState::Idle);
    }

    #[tokio::test]
    async fn test_already_posted_link_is_not_published() {
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, store) = cycle_with(
            vec![FakeSource::ok("feed", vec![
                Item::new("Old", "https://x/1"),
                Item::new("New", "https://x/2"),
            ])],
            publisher.clone(),
            Duration::ZERO,
        )
        .await;
        store.mark_posted("https://x/1").await;

        let report = cycle.run_cycle().await.unwrap();

        assert_eq!(publisher.attempted(), vec!["https://x/2".to_string()]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.posted, 1);
    }

    #[tokio::test]
    async fn test_same_link_from_both_sources_posted_once() {
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, _) = cycle_with(
            vec![
                FakeSource::ok("feed", vec![Item::new("Story", "https://x/1")]),
                FakeSource::ok("scrape", vec![Item::new("Story (web)", "https://x/1")]),
            ],
            publisher.clone(),
            Duration::ZERO,
        )
        .await;

        let report = cycle.run_cycle().await.unwrap();

        assert_eq!(publisher.attempted().len(), 1);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_merge_order_follows_registration_not_completion() {
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, _) = cycle_with(
            vec![
                FakeSource::slow("feed", items("a", 2), Duration::from_millis(100)),
                FakeSource::ok("scrape", items("b", 2)),
            ],
            publisher.clone(),
            Duration::ZERO,
        )
        .await;

        cycle.run_cycle().await.unwrap();

        assert_eq!(
            publisher.attempted(),
            vec!["https://a/1", "https://a/2", "https://b/1", "https://b/2"]
        );
    }

    #[tokio::test]
    async fn test_delay_between_posts_but_not_after_last() {
        let delay = Duration::from_millis(150);
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, _) = cycle_with(
            vec![FakeSource::ok("feed", items("a", 3))],
            publisher.clone(),
            delay,
        )
        .await;

        let report = cycle.run_cycle().await.unwrap();
        let finished = Instant::now();

        assert_eq!(report.posted, 3);
        let times = publisher.times();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
        // exactly two delays: the cycle returns promptly after the third post
        assert!(finished - times[2] < delay);
    }

    #[tokio::test]
    async fn test_publisher_failure_skips_item_and_delay() {
        let delay = Duration::from_millis(150);
        let publisher = FakePublisher::failing_on(&["https://a/2"]);
        let (cycle, store) = cycle_with(
            vec![FakeSource::ok("feed", items("a", 3))],
            publisher.clone(),
            delay,
        )
        .await;

        let report = cycle.run_cycle().await.unwrap();

        assert_eq!(publisher.attempted(), vec!["https://a/1", "https://a/2", "https://a/3"]);
        assert_eq!(report.posted, 2);
        assert_eq!(report.failed, 1);
        assert!(store.is_posted("https://a/1").await);
        assert!(!store.is_posted("https://a/2").await);
        assert!(store.is_posted("https://a/3").await);

        // one pause after item 1, none after the failed item 2
        let times = publisher.times();
        assert!(times[1] - times[0] >= delay);
        assert!(times[2] - times[1] < delay);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let publisher = Arc::new(FakePublisher::default());
        let (cycle, _) = cycle_with(
            vec![FakeSource::slow("feed", items("a", 1), Duration::from_millis(200))],
            publisher.clone(),
            Duration::ZERO,
        )
        .await;

        let mut state = cycle.subscribe_state();
        let (first, second) = tokio::join!(cycle.run_cycle(), async {
            state.wait_for(|s| *s == CycleState::Fetching).await.unwrap();
            cycle.run_cycle().await
        });

        assert_eq!(first.unwrap().posted, 1);
        assert!(matches!(second, Err(Error::CycleInProgress)));
        assert_eq!(publisher.attempted().len(), 1);
    }

    #[tokio::test]
    async fn test_second_cycle_posts_only_new_items() {
        let publisher = Arc::new(FakePublisher::default());
        let db = Database::new_in_memory().await.unwrap();
        let store = DedupStore::new(&db);

        let first = NewsCycle::new(
            vec![FakeSource::ok("feed", items("a", 2))],
            publisher.clone(),
            store.clone(),
            Duration::ZERO,
        );
        assert_eq!(first.run_cycle().await.unwrap().posted, 2);

        let second = NewsCycle::new(
            vec![FakeSource::ok("feed", items("a", 3))],
            publisher.clone(),
            store,
            Duration::ZERO,
        );
        let report = second.run_cycle().await.unwrap();

        assert_eq!(report.posted, 1);
        assert_eq!(report.duplicates, 2);
        assert_eq!(publisher.attempted().last().unwrap(), "https://a/3");
    }
}
