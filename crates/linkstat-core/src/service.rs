//! Orchestration of submissions, reports and crash recovery.
//!
//! [`ProcessingService`] answers every request synchronously from the
//! [`VolatileIndex`] and pushes durable persistence of completed results into
//! tracked background tasks. The pending ledgers bracket each request so that
//! work interrupted by a crash can be found and rerun with
//! [`ProcessingService::recover_unfinished_work`].
//!
//! ## Lifecycle
//!
//! ```rust,no_run
//! use linkstat_core::{Config, LinkRequest, ProcessingService};
//!
//! # async fn run() -> linkstat_core::Result<()> {
//! let config = Config::load()?;
//! let service = ProcessingService::open(&config).await?;
//!
//! let result = service.submit_links(LinkRequest::new(["example.com"])).await?;
//! println!("stored as #{}", result.number);
//!
//! service.shutdown(config.service.shutdown_timeout()).await?;
//! # Ok(())
//! # }
//! ```

use crate::checker::{HttpProbe, Probe, ReachabilityChecker};
use crate::config::{Config, Durability, ServiceConfig};
use crate::index::VolatileIndex;
use crate::ledger::{DurableStore, PendingId};
use crate::report::ReportGenerator;
use crate::tracker::{PersistTracker, TaskGuard};
use crate::{
    Error, LinkRequest, LinkResult, NumberRequest, RecoveredWork, ReportArtifact, Result,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Description of the recovery result when both pending ledgers are empty
pub const NO_UNFINISHED_WORK: &str = "no unfinished work found";

/// Link checking service with write-ahead pending ledgers and async persistence
pub struct ProcessingService {
    index: Arc<VolatileIndex>,
    store: Arc<DurableStore>,
    checker: ReachabilityChecker,
    reports: ReportGenerator,
    durability: Durability,
    accepting: AtomicBool,
    in_flight: PersistTracker,
    background: PersistTracker,
}

impl std::fmt::Debug for ProcessingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingService")
            .field("durability", &self.durability)
            .field("accepting", &self.accepting.load(Ordering::SeqCst))
            .field("in_flight", &self.in_flight.outstanding())
            .field("background", &self.background.outstanding())
            .finish_non_exhaustive()
    }
}

impl ProcessingService {
    /// Open the ledgers and HTTP probe described by `config` and replay
    pub async fn open(config: &Config) -> Result<Self> {
        let store = DurableStore::open(&config.storage).await?;
        let probe = HttpProbe::new(&config.probe)?;
        Self::new(
            Arc::new(VolatileIndex::new()),
            Arc::new(store),
            Arc::new(probe),
            &config.service,
        )
        .await
    }

    /// Assemble a service and rebuild `index` from the completed ledger.
    ///
    /// A replay failure leaves the index empty and is only logged, unless
    /// `strict_replay` is set.
    pub async fn new(
        index: Arc<VolatileIndex>,
        store: Arc<DurableStore>,
        probe: Arc<dyn Probe>,
        config: &ServiceConfig,
    ) -> Result<Self> {
        match store.read_completed_ledger().await {
            Ok(ledger) => {
                let replayed = ledger.records.len();
                index.replace(ledger.records);
                index.advance_to(ledger.last_sequence_number);
                info!(
                    replayed,
                    last = index.max_assigned(),
                    "completed ledger replayed"
                );
            },
            Err(e) if config.strict_replay => return Err(e),
            Err(e) => {
                error!(category = e.category(), "replay failed, starting empty: {e}");
                index.replace(Vec::new());
            },
        }

        Ok(Self {
            index,
            store,
            checker: ReachabilityChecker::new(probe),
            reports: ReportGenerator::new(),
            durability: config.durability,
            accepting: AtomicBool::new(true),
            in_flight: PersistTracker::new(),
            background: PersistTracker::new(),
        })
    }

    fn admit(&self) -> Result<TaskGuard> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let guard = self.in_flight.enter();
        // Shutdown may have flipped the flag between the check and enter.
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        Ok(guard)
    }

    /// Probe every URL in `request` and store the statuses under a new number.
    ///
    /// The result is returned as soon as it is in the index; appending it to
    /// the completed ledger happens in the background. Pending-ledger failures
    /// are logged and do not fail the request.
    pub async fn submit_links(&self, request: LinkRequest) -> Result<LinkResult> {
        let _op = self.admit()?;
        request.validate()?;

        let pending = match self.store.enqueue_links(&request).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(category = e.category(), "failed to record pending links: {e}");
                None
            },
        };

        let result = self.process(&request).await;
        self.persist(result.clone(), pending).await;
        Ok(result)
    }

    /// Render a report for previously assigned numbers.
    ///
    /// Numbers above the current maximum are rejected before anything is
    /// recorded. A number at or below the maximum that is missing from the
    /// index fails with [`Error::NotFound`]; an encoding failure with
    /// [`Error::Report`]. Either way the pending entry is cleared.
    pub async fn request_report(&self, request: NumberRequest) -> Result<ReportArtifact> {
        let _op = self.admit()?;
        request.validate()?;

        let max = self.index.max_assigned();
        if let Some(&requested) = request.numbers.iter().find(|&&n| n > max) {
            return Err(Error::IndexOutOfRange { requested, max });
        }

        let pending = match self.store.enqueue_numbers(&request).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(category = e.category(), "failed to record pending report: {e}");
                None
            },
        };

        let report = match self
            .index
            .lookup(&request.numbers)
            .and_then(|maps| self.reports.render(&maps))
        {
            Ok(report) => report,
            Err(e) => {
                if let Some(id) = pending {
                    self.clear_numbers(&id).await;
                }
                return Err(e);
            },
        };

        let store = Arc::clone(&self.store);
        self.background.spawn(async move {
            match store.enqueue_numbers(&request).await {
                Ok(id) => {
                    if let Err(e) = store.dequeue_numbers(&id).await {
                        warn!(category = e.category(), "failed to clear report marker: {e}");
                    }
                },
                Err(e) => warn!(category = e.category(), "failed to record report marker: {e}"),
            }
        });

        if let Some(id) = pending {
            self.clear_numbers(&id).await;
        }
        Ok(report)
    }

    /// Drain both pending ledgers and rerun whatever they held.
    ///
    /// Link submissions are probed again and stored under new numbers, durably.
    /// Report requests are rendered against the current index; a lookup failure
    /// becomes that report's description. When nothing was pending, or the
    /// ledgers could not be drained, a single placeholder report is returned.
    pub async fn recover_unfinished_work(&self) -> Result<RecoveredWork> {
        let _op = self.admit()?;

        let (links, numbers) = match self.store.drain_pending().await {
            Ok(drained) => drained,
            Err(e) => {
                error!(category = e.category(), "failed to drain pending ledgers: {e}");
                return Ok(RecoveredWork::placeholder(format!(
                    "error reading pending work: {e}"
                )));
            },
        };

        if links.is_empty() && numbers.is_empty() {
            return Ok(RecoveredWork::placeholder(NO_UNFINISHED_WORK));
        }

        let mut recovered = RecoveredWork::default();
        for request in links {
            let result = self.process(&request).await;
            self.persist(result.clone(), None).await;
            recovered.links.push(result);
        }
        for request in numbers {
            let report = match self.index.lookup(&request.numbers) {
                Ok(maps) => self.reports.render(&maps).unwrap_or_else(|e| {
                    ReportArtifact::placeholder(format!("error rendering report: {e}"))
                }),
                Err(e) => ReportArtifact::placeholder(format!("error finding keys: {e}")),
            };
            recovered.reports.push(report);
        }

        info!(
            links = recovered.links.len(),
            reports = recovered.reports.len(),
            "unfinished work recovered"
        );
        Ok(recovered)
    }

    /// Wait for every background task launched so far, for at most `timeout`
    pub async fn await_outstanding(&self, timeout: Duration) -> Result<()> {
        self.background.wait(timeout).await
    }

    /// Stop accepting work, let running operations finish, then drain
    /// background persistence.
    ///
    /// `timeout` bounds the whole sequence. Later calls to any operation fail
    /// with [`Error::ShuttingDown`].
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.accepting.store(false, Ordering::SeqCst);
        info!(
            in_flight = self.in_flight.outstanding(),
            background = self.background.outstanding(),
            "shutting down"
        );

        let started = tokio::time::Instant::now();
        self.in_flight.wait(timeout).await?;
        let remaining = timeout.saturating_sub(started.elapsed());
        self.background.wait(remaining).await?;

        info!("shutdown complete");
        Ok(())
    }

    /// Highest sequence number assigned so far
    pub fn max_assigned(&self) -> u64 {
        self.index.max_assigned()
    }

    /// Background persistence tasks still running
    pub fn outstanding(&self) -> usize {
        self.background.outstanding()
    }

    /// Entries currently in the (links, numbers) pending ledgers
    pub async fn pending_counts(&self) -> Result<(usize, usize)> {
        self.store.pending_counts().await
    }

    async fn process(&self, request: &LinkRequest) -> LinkResult {
        let links = self.checker.check(&request.links).await;
        let number = self.index.append(links.clone());
        debug!(number, urls = links.len(), "links processed");
        LinkResult { links, number }
    }

    async fn persist(&self, result: LinkResult, pending: Option<PendingId>) {
        let store = Arc::clone(&self.store);
        match self.durability {
            Durability::BestEffort => {
                self.background.spawn(async move {
                    append_completed(&store, &result).await;
                });
                if let Some(id) = pending {
                    self.clear_links(&id).await;
                }
            },
            Durability::AtLeastOnce => {
                self.background.spawn(async move {
                    if !append_completed(&store, &result).await {
                        return;
                    }
                    if let Some(id) = pending {
                        if let Err(e) = store.dequeue_links(&id).await {
                            warn!(category = e.category(), %id, "failed to clear pending links: {e}");
                        }
                    }
                });
            },
        }
    }

    async fn clear_links(&self, id: &PendingId) {
        if let Err(e) = self.store.dequeue_links(id).await {
            warn!(category = e.category(), %id, "failed to clear pending links: {e}");
        }
    }

    async fn clear_numbers(&self, id: &PendingId) {
        if let Err(e) = self.store.dequeue_numbers(id).await {
            warn!(category = e.category(), %id, "failed to clear pending report: {e}");
        }
    }
}

async fn append_completed(store: &DurableStore, result: &LinkResult) -> bool {
    match store.append_completed(result).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                category = e.category(),
                number = result.number,
                "failed to persist completed result: {e}"
            );
            false
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::{LinkStatus, StatusMap};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    /// Probe answering from a fixed table, unavailable otherwise
    struct TableProbe {
        statuses: HashMap<String, LinkStatus>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl TableProbe {
        fn new(entries: &[(&str, LinkStatus)]) -> Self {
            Self {
                statuses: entries
                    .iter()
                    .map(|(url, status)| ((*url).to_string(), *status))
                    .collect(),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl Probe for TableProbe {
        async fn probe(&self, url: &str) -> LinkStatus {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.expect("gate closed");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .get(url)
                .copied()
                .unwrap_or(LinkStatus::Unavailable)
        }
    }

    fn table() -> TableProbe {
        TableProbe::new(&[
            ("a.com", LinkStatus::Available),
            ("b.com", LinkStatus::Unavailable),
            ("c.com", LinkStatus::Available),
        ])
    }

    async fn create_test_service(
        probe: TableProbe,
        service: ServiceConfig,
    ) -> (ProcessingService, StorageConfig, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = StorageConfig::in_dir(temp_dir.path());
        let store = DurableStore::open(&storage).await.expect("Failed to open store");
        let svc = ProcessingService::new(
            Arc::new(VolatileIndex::new()),
            Arc::new(store),
            Arc::new(probe),
            &service,
        )
        .await
        .expect("Failed to build service");
        (svc, storage, temp_dir)
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_submit_links_assigns_first_number() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;

        let result = svc
            .submit_links(LinkRequest::new(["a.com", "b.com"]))
            .await
            .unwrap();

        assert_eq!(result.number, 1);
        let expected: StatusMap = [
            ("a.com".to_string(), LinkStatus::Available),
            ("b.com".to_string(), LinkStatus::Unavailable),
        ]
        .into_iter()
        .collect();
        assert_eq!(result.links, expected);
    }

    #[tokio::test]
    async fn test_submit_links_persists_and_clears_pending() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;

        svc.submit_links(LinkRequest::new(["a.com"])).await.unwrap();
        svc.submit_links(LinkRequest::new(["b.com"])).await.unwrap();
        svc.await_outstanding(WAIT).await.unwrap();

        assert_eq!(svc.store.read_completed().await.unwrap().len(), 2);
        assert_eq!(svc.store.last_sequence_number().await.unwrap(), 2);
        assert_eq!(svc.pending_counts().await.unwrap(), (0, 0));
        assert_eq!(svc.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_at_least_once_clears_pending_after_append() {
        let config = ServiceConfig {
            durability: Durability::AtLeastOnce,
            ..ServiceConfig::default()
        };
        let (svc, _storage, _dir) = create_test_service(table(), config).await;

        svc.submit_links(LinkRequest::new(["a.com"])).await.unwrap();
        svc.await_outstanding(WAIT).await.unwrap();

        assert_eq!(svc.store.read_completed().await.unwrap().len(), 1);
        assert_eq!(svc.pending_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_at_least_once_keeps_pending_when_append_fails() {
        // Given: A completed ledger that can no longer be decoded
        let config = ServiceConfig {
            durability: Durability::AtLeastOnce,
            ..ServiceConfig::default()
        };
        let (svc, storage, _dir) = create_test_service(table(), config).await;
        std::fs::write(storage.completed_path(), "{ \"processed_data\": [").unwrap();

        // When: A submission completes but its result cannot be persisted
        let result = svc.submit_links(LinkRequest::new(["a.com"])).await.unwrap();
        svc.await_outstanding(WAIT).await.unwrap();

        // Then: The submission stays pending
        assert_eq!(result.number, 1);
        assert_eq!(svc.pending_counts().await.unwrap(), (1, 0));

        // And: Once the ledger is writable again, recovery reruns it
        std::fs::write(storage.completed_path(), "{}").unwrap();
        let work = svc.recover_unfinished_work().await.unwrap();
        svc.await_outstanding(WAIT).await.unwrap();

        assert_eq!(work.links.len(), 1);
        assert_eq!(work.links[0].number, 2);
        assert_eq!(work.links[0].links["a.com"], LinkStatus::Available);
        assert_eq!(svc.pending_counts().await.unwrap(), (0, 0));
        let persisted = svc.store.read_completed().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].number, 2);
    }

    #[tokio::test]
    async fn test_replay_resumes_after_persisted_counter() {
        // Given: A ledger whose counter is ahead of its records
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageConfig::in_dir(temp_dir.path());
        std::fs::write(
            storage.completed_path(),
            r#"{ "processed_data": [{ "links": { "a.com": "available" }, "links_num": 1 }], "lastNum": 4 }"#,
        )
        .unwrap();
        let store = DurableStore::open(&storage).await.unwrap();

        // When: Replaying and submitting
        let svc = ProcessingService::new(
            Arc::new(VolatileIndex::new()),
            Arc::new(store),
            Arc::new(table()),
            &ServiceConfig::default(),
        )
        .await
        .unwrap();
        let result = svc.submit_links(LinkRequest::new(["b.com"])).await.unwrap();

        // Then: Numbering continues past the counter, not the highest record
        assert_eq!(result.number, 5);
        svc.await_outstanding(WAIT).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_submission_touches_nothing() {
        let (svc, storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        let before = std::fs::read(storage.pending_links_path()).unwrap();

        let err = svc
            .submit_links(LinkRequest::new(Vec::<String>::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(std::fs::read(storage.pending_links_path()).unwrap(), before);
        assert_eq!(svc.max_assigned(), 0);
    }

    #[tokio::test]
    async fn test_request_report_renders_in_order() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        svc.submit_links(LinkRequest::new(["a.com", "b.com"]))
            .await
            .unwrap();

        let report = svc.request_report(NumberRequest::new([1])).await.unwrap();

        assert_eq!(
            report.entries(),
            vec!["1. a.com - Available", "2. b.com - Unavailable"]
        );
        svc.await_outstanding(WAIT).await.unwrap();
        assert_eq!(svc.pending_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_request_report_out_of_range_leaves_no_pending() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        svc.submit_links(LinkRequest::new(["a.com"])).await.unwrap();
        svc.await_outstanding(WAIT).await.unwrap();

        let err = svc
            .request_report(NumberRequest::new([1, 5]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                requested: 5,
                max: 1
            }
        ));
        assert_eq!(svc.pending_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_request_report_validation() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        assert!(matches!(
            svc.request_report(NumberRequest::new([])).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            svc.request_report(NumberRequest::new(1..=51)).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_with_nothing_pending_returns_placeholder() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;

        let work = svc.recover_unfinished_work().await.unwrap();

        assert!(work.is_placeholder());
        assert_eq!(work.reports[0].description, NO_UNFINISHED_WORK);
    }

    #[tokio::test]
    async fn test_recover_reruns_pending_work() {
        // Given: A crash left one submission and one report request pending
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        svc.submit_links(LinkRequest::new(["a.com"])).await.unwrap();
        svc.store
            .enqueue_links(&LinkRequest::new(["b.com", "c.com"]))
            .await
            .unwrap();
        svc.store
            .enqueue_numbers(&NumberRequest::new([1]))
            .await
            .unwrap();
        svc.store
            .enqueue_numbers(&NumberRequest::new([9]))
            .await
            .unwrap();

        // When: Recovering
        let work = svc.recover_unfinished_work().await.unwrap();
        svc.await_outstanding(WAIT).await.unwrap();

        // Then: Links get a new number, reports render or describe their failure
        assert_eq!(work.links.len(), 1);
        assert_eq!(work.links[0].number, 2);
        assert_eq!(work.reports.len(), 2);
        assert_eq!(work.reports[0].entries(), vec!["1. a.com - Available"]);
        assert!(work.reports[1].is_empty());
        assert!(work.reports[1].description.contains("key 9 does not exist"));

        assert_eq!(svc.pending_counts().await.unwrap(), (0, 0));
        assert_eq!(svc.store.last_sequence_number().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recover_with_corrupt_ledger_describes_error() {
        let (svc, storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        std::fs::write(storage.pending_links_path(), "not json").unwrap();

        let work = svc.recover_unfinished_work().await.unwrap();

        assert!(work.is_placeholder());
        assert!(work.reports[0].description.starts_with("error reading pending work"));
    }

    #[tokio::test]
    async fn test_replay_failure_starts_empty_unless_strict() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageConfig::in_dir(temp_dir.path());
        let store = Arc::new(DurableStore::open(&storage).await.unwrap());
        std::fs::write(storage.completed_path(), "{ broken").unwrap();

        let lenient = ProcessingService::new(
            Arc::new(VolatileIndex::new()),
            Arc::clone(&store),
            Arc::new(table()),
            &ServiceConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(lenient.max_assigned(), 0);

        let strict = ProcessingService::new(
            Arc::new(VolatileIndex::new()),
            store,
            Arc::new(table()),
            &ServiceConfig {
                strict_replay: true,
                ..ServiceConfig::default()
            },
        )
        .await;
        assert!(matches!(strict, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let (svc, _storage, _dir) = create_test_service(table(), ServiceConfig::default()).await;
        svc.submit_links(LinkRequest::new(["a.com"])).await.unwrap();

        svc.shutdown(WAIT).await.unwrap();

        assert!(matches!(
            svc.submit_links(LinkRequest::new(["a.com"])).await,
            Err(Error::ShuttingDown)
        ));
        assert!(matches!(
            svc.recover_unfinished_work().await,
            Err(Error::ShuttingDown)
        ));
        assert_eq!(svc.store.read_completed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_submission() {
        // Given: A submission blocked inside the probe
        let gate = Arc::new(Semaphore::new(0));
        let probe = table().gated(Arc::clone(&gate));
        let (svc, _storage, _dir) = create_test_service(probe, ServiceConfig::default()).await;
        let svc = Arc::new(svc);

        let submission = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.submit_links(LinkRequest::new(["a.com"])).await })
        };
        while svc.in_flight.outstanding() == 0 {
            tokio::task::yield_now().await;
        }

        // When: Shutdown runs with too short a limit
        let err = svc.shutdown(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        // Then: Releasing the probe lets the submission and its persistence finish
        gate.add_permits(1);
        let result = submission.await.unwrap().unwrap();
        svc.shutdown(WAIT).await.unwrap();
        assert_eq!(result.number, 1);
        assert_eq!(svc.store.read_completed().await.unwrap().len(), 1);
    }
}
