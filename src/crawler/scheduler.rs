//! Recurring crawl over the whole registry
//!
//! This module handles:
//! - Firing a crawl pass at a fixed interval when auto crawl is enabled
//! - Single-flight: a tick that arrives while a pass is running is skipped
//! - Skipping missed ticks instead of bursting after a long pass
//! - Shutdown through a watch channel, waiting for a running pass

use crate::config::CrawlSettings;
use crate::crawler::{CrawlOrchestrator, CrawlReport};
use crate::registry::SourceRegistry;
use crate::storage::CrawlTrigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};

/// What happened when a scheduled pass was requested
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The pass ran to completion
    Completed(CrawlReport),

    /// A previous pass was still in flight, so nothing ran
    Skipped,
}

/// Clears the in-flight flag when a pass ends, however it ends
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Scheduler for periodic crawls of every registered source
pub struct CrawlScheduler {
    orchestrator: Arc<CrawlOrchestrator>,
    registry: Arc<RwLock<SourceRegistry>>,
    interval: Duration,
    enabled: bool,
    in_flight: Arc<AtomicBool>,
}

impl CrawlScheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `orchestrator` - Runs each pass
    /// * `registry` - Shared registry; read only while selecting sources
    /// * `interval` - Time between passes
    /// * `enabled` - Global auto-crawl switch
    pub fn new(
        orchestrator: Arc<CrawlOrchestrator>,
        registry: Arc<RwLock<SourceRegistry>>,
        interval: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            interval,
            enabled,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_settings(
        orchestrator: Arc<CrawlOrchestrator>,
        registry: Arc<RwLock<SourceRegistry>>,
        settings: &CrawlSettings,
    ) -> Self {
        Self::new(
            orchestrator,
            registry,
            settings.interval(),
            settings.auto_crawl_enabled,
        )
    }

    /// Whether a pass is currently running
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one pass over every registered source unless one is already running
    pub async fn try_trigger(&self) -> TriggerOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Previous scheduled crawl still running, skipping this tick");
            return TriggerOutcome::Skipped;
        }
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let targets = {
            let registry = self.registry.read().await;
            registry.select(&registry.ids())
        };

        let report = self
            .orchestrator
            .run_selected(targets, CrawlTrigger::Scheduled)
            .await;

        TriggerOutcome::Completed(report)
    }

    /// Starts the recurring loop
    ///
    /// Returns `None` when auto crawl is disabled. The loop stops once `true`
    /// is sent on `shutdown` or the sender is dropped, and the returned handle
    /// completes only after any pass still in flight has finished.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        if !self.enabled {
            tracing::info!("Auto crawl disabled, scheduler not started");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut passes = JoinSet::new();
            tracing::info!("Scheduler started ({}s interval)", self.interval.as_secs());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let scheduler = Arc::clone(&self);
                        passes.spawn(async move { scheduler.try_trigger().await });
                    }
                    Some(joined) = passes.join_next(), if !passes.is_empty() => {
                        log_pass(joined);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Scheduler stopping");
                            break;
                        }
                    }
                }
            }

            while let Some(joined) = passes.join_next().await {
                log_pass(joined);
            }
        }))
    }
}

fn log_pass(joined: Result<TriggerOutcome, JoinError>) {
    match joined {
        Ok(TriggerOutcome::Completed(report)) => tracing::debug!(
            "Scheduled pass done: {} ok, {} failed",
            report.succeeded(),
            report.failed()
        ),
        Ok(TriggerOutcome::Skipped) => {}
        Err(e) => tracing::warn!("Scheduled pass aborted: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchPolicy;
    use crate::platform::{Article, ArticleFetcher};
    use crate::registry::{build_source_record_at, SourceRecord};
    use crate::session::Session;
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, Semaphore};

    /// Signals when a fetch starts and blocks until released
    struct GatedFetcher {
        started: Notify,
        release: Semaphore,
        calls: AtomicUsize,
    }

    impl GatedFetcher {
        fn new(initial_permits: usize) -> Arc<Self> {
            Arc::new(Self {
                started: Notify::new(),
                release: Semaphore::new(initial_permits),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ArticleFetcher for GatedFetcher {
        async fn fetch(&self, _: &SourceRecord) -> Result<Vec<Article>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            let permit = self.release.acquire().await;
            drop(permit);
            Ok(Vec::new())
        }
    }

    fn scheduler_for(fetcher: Arc<GatedFetcher>, enabled: bool) -> Arc<CrawlScheduler> {
        let mut registry = SourceRegistry::default();
        registry.merge(
            vec![build_source_record_at("A", "a", &Session::default(), 1, 1)],
            &Session::default(),
        );

        let policy = FetchPolicy {
            request_timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_delay: Duration::ZERO,
        };
        let orchestrator = Arc::new(CrawlOrchestrator::new(fetcher, policy));

        Arc::new(CrawlScheduler::new(
            orchestrator,
            Arc::new(RwLock::new(registry)),
            Duration::from_secs(3600),
            enabled,
        ))
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let fetcher = GatedFetcher::new(0);
        let scheduler = scheduler_for(fetcher.clone(), true);

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.try_trigger().await })
        };

        fetcher.started.notified().await;
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.try_trigger().await,
            TriggerOutcome::Skipped
        ));

        fetcher.release.add_permits(10);
        match first.await.unwrap() {
            TriggerOutcome::Completed(report) => {
                assert_eq!(report.trigger, CrawlTrigger::Scheduled);
                assert_eq!(report.succeeded(), 1);
            }
            TriggerOutcome::Skipped => panic!("first pass should run"),
        }

        assert!(!scheduler.is_running());
        assert!(matches!(
            scheduler.try_trigger().await,
            TriggerOutcome::Completed(_)
        ));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_pass() {
        let fetcher = GatedFetcher::new(0);
        let scheduler = scheduler_for(fetcher.clone(), true);
        let (tx, rx) = watch::channel(false);

        let mut handle = Arc::clone(&scheduler).spawn(rx).unwrap();
        fetcher.started.notified().await;
        tx.send(true).unwrap();

        // The loop must not finish while the pass is blocked
        assert!(
            tokio::time::timeout(Duration::from_millis(100), &mut handle)
                .await
                .is_err()
        );
        assert!(scheduler.is_running());

        fetcher.release.add_permits(10);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler loop should stop")
            .unwrap();
        assert!(!scheduler.is_running());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let scheduler = scheduler_for(GatedFetcher::new(10), false);
        let (_tx, rx) = watch::channel(false);
        assert!(scheduler.spawn(rx).is_none());
    }

    #[tokio::test]
    async fn test_first_tick_runs_and_shutdown_stops_loop() {
        let fetcher = GatedFetcher::new(10);
        let scheduler = scheduler_for(fetcher.clone(), true);
        let (tx, rx) = watch::channel(false);

        let handle = Arc::clone(&scheduler).spawn(rx).unwrap();
        fetcher.started.notified().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler loop should stop")
            .unwrap();
    }
}
