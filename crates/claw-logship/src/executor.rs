//! Batch submission with retry and on-demand collection creation.
//!
//! Each call to [`WriteExecutor::execute`] runs this state machine until it
//! reaches a terminal state:
//!
//! ```text
//! Idle ──execute──▶ Attempting ──ack──────────▶ Success
//!                    │  ▲    │
//!        not found   │  │    └─client error × limit──▶ Exhausted
//!                    ▼  │
//!          CollectionMissingRecovery
//! ```
//!
//! The collection name is recomputed from the clock on every attempt. A
//! missing collection is created and the write retried without consuming the
//! attempt budget; any other failure is reported, consumes one attempt and
//! drops the client so the next attempt reconnects.

use std::sync::Arc;

use crate::credentials::CredentialResolver;
use crate::error::{CredentialError, StoreError};
use crate::handler::{ErrorCode, ErrorHandler};
use crate::metrics::ShipperMetrics;
use crate::namer::{collection_name, Clock};
use crate::store::{StoreClient, StoreConnector};
use crate::types::Item;

/// Missing-collection recoveries allowed per batch before the condition is
/// treated as a client error.
pub const MAX_COLLECTION_RECOVERIES: u32 = 3;

/// Terminal result of one [`WriteExecutor::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store acknowledged the batch.
    Success {
        /// Client errors consumed before the acknowledgement
        attempts: u32,
        /// Collections created along the way
        recoveries: u32,
    },
    /// Every attempt failed and the batch was dropped.
    Exhausted {
        /// Client errors reported
        attempts: u32,
    },
}

impl WriteOutcome {
    /// Returns true if the batch was written.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug)]
enum WriteState {
    Attempting,
    CollectionMissingRecovery { collection: String },
    Success,
    Exhausted,
}

/// Settings the executor needs from the appender configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Region clients are bound to
    pub region: String,
    /// Collection name prefix
    pub collection_prefix: String,
    /// Configured retry count; zero still allows one attempt
    pub retry: u32,
}

impl ExecutorSettings {
    /// Number of client errors tolerated before a batch is dropped.
    #[must_use]
    pub fn attempt_limit(&self) -> u32 {
        self.retry.max(1)
    }
}

/// Persists batches, owning the lazily built store client.
pub struct WriteExecutor {
    settings: ExecutorSettings,
    connector: Arc<dyn StoreConnector>,
    credentials: Arc<dyn CredentialResolver>,
    error_handler: Arc<dyn ErrorHandler>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ShipperMetrics>,
    client: Option<Box<dyn StoreClient>>,
}

impl WriteExecutor {
    /// Creates an executor. No client is built until the first write.
    #[must_use]
    pub fn new(
        settings: ExecutorSettings,
        connector: Arc<dyn StoreConnector>,
        credentials: Arc<dyn CredentialResolver>,
        error_handler: Arc<dyn ErrorHandler>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ShipperMetrics>,
    ) -> Self {
        Self {
            settings,
            connector,
            credentials,
            error_handler,
            clock,
            metrics,
            client: None,
        }
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Returns true while a client handle is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Replaces the settings, releasing the current client.
    pub fn reconfigure(&mut self, settings: ExecutorSettings) {
        self.shutdown();
        self.settings = settings;
    }

    /// Writes `items`, retrying until success or the attempt limit.
    ///
    /// Failures are reported to the error handler and never returned.
    pub fn execute(&mut self, items: &[Item]) -> WriteOutcome {
        if items.is_empty() {
            return WriteOutcome::Success {
                attempts: 0,
                recoveries: 0,
            };
        }

        let limit = self.settings.attempt_limit();
        let mut attempts = 0;
        let mut recoveries = 0;
        let mut state = WriteState::Attempting;

        loop {
            tracing::trace!(target: "claw_logship", ?state, attempts, "write state");
            state = match state {
                WriteState::Attempting => {
                    let collection =
                        collection_name(&self.settings.collection_prefix, self.clock.now());
                    match self.attempt(&collection, items) {
                        Ok(()) => WriteState::Success,
                        Err(AttemptError::Store(StoreError::CollectionNotFound(_)))
                            if recoveries < MAX_COLLECTION_RECOVERIES =>
                        {
                            WriteState::CollectionMissingRecovery { collection }
                        }
                        Err(err) => self.consume_attempt(&err, &mut attempts, limit),
                    }
                }
                WriteState::CollectionMissingRecovery { collection } => {
                    recoveries += 1;
                    match self.recover(&collection) {
                        Ok(()) => WriteState::Attempting,
                        Err(err) => self.consume_attempt(&err, &mut attempts, limit),
                    }
                }
                WriteState::Success => {
                    self.metrics.record_written(items.len());
                    return WriteOutcome::Success {
                        attempts,
                        recoveries,
                    };
                }
                WriteState::Exhausted => {
                    self.metrics.record_dropped(items.len());
                    tracing::warn!(
                        target: "claw_logship",
                        attempts,
                        items = items.len(),
                        prefix = %self.settings.collection_prefix,
                        "retries exhausted, dropping batch"
                    );
                    return WriteOutcome::Exhausted { attempts };
                }
            };
        }
    }

    /// Releases the client, if one is held.
    pub fn shutdown(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.shutdown();
            tracing::debug!(target: "claw_logship", "store client shut down");
        }
    }

    fn attempt(&mut self, collection: &str, items: &[Item]) -> Result<(), AttemptError> {
        self.client()?.put_batch(collection, items)?;
        tracing::debug!(
            target: "claw_logship",
            collection,
            items = items.len(),
            "batch written"
        );
        Ok(())
    }

    fn recover(&mut self, collection: &str) -> Result<(), AttemptError> {
        let region = self.settings.region.clone();
        let client = self.client()?;
        client.set_region(&region);
        client.create_collection(collection)?;
        self.metrics.record_collection_created();
        tracing::info!(target: "claw_logship", collection, "created collection");
        Ok(())
    }

    fn client(&mut self) -> Result<&mut Box<dyn StoreClient>, AttemptError> {
        let client = match self.client.take() {
            Some(client) => client,
            None => {
                let credentials = self.credentials.resolve()?;
                let client = self.connector.connect(&credentials, &self.settings.region)?;
                tracing::debug!(
                    target: "claw_logship",
                    region = %self.settings.region,
                    "store client connected"
                );
                client
            }
        };
        Ok(self.client.insert(client))
    }

    fn consume_attempt(&mut self, err: &AttemptError, attempts: &mut u32, limit: u32) -> WriteState {
        *attempts += 1;
        self.fail(err);
        if *attempts >= limit {
            WriteState::Exhausted
        } else {
            WriteState::Attempting
        }
    }

    fn fail(&mut self, err: &AttemptError) {
        self.metrics.record_client_error();
        match err {
            AttemptError::Store(err) => {
                self.error_handler
                    .error("store write failed", err, ErrorCode::GenericFailure);
            }
            AttemptError::Credentials(err) => {
                self.error_handler.error(
                    "credential resolution failed",
                    &StoreError::from(err.clone()),
                    ErrorCode::CredentialFailure,
                );
            }
        }
        self.client = None;
    }
}

/// Why a single attempt failed.
#[derive(Debug)]
enum AttemptError {
    Store(StoreError),
    Credentials(CredentialError),
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<CredentialError> for AttemptError {
    fn from(err: CredentialError) -> Self {
        Self::Credentials(err)
    }
}

impl std::fmt::Debug for WriteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteExecutor")
            .field("settings", &self.settings)
            .field("connected", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, StaticCredentials};
    use crate::memory::MemoryStore;
    use crate::namer::ManualClock;
    use crate::types::Attribute;
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct RecordingHandler {
        reports: Mutex<Vec<(StoreError, ErrorCode)>>,
    }

    impl RecordingHandler {
        fn count(&self) -> usize {
            self.reports.lock().len()
        }

        fn codes(&self) -> Vec<ErrorCode> {
            self.reports.lock().iter().map(|(_, code)| *code).collect()
        }
    }

    impl ErrorHandler for RecordingHandler {
        fn error(&self, _message: &str, error: &StoreError, code: ErrorCode) {
            self.reports.lock().push((error.clone(), code));
        }
    }

    /// Hands out successive instants, repeating the last one.
    struct SequenceClock {
        times: Mutex<VecDeque<DateTime<Utc>>>,
    }

    impl Clock for SequenceClock {
        fn now(&self) -> DateTime<Utc> {
            let mut times = self.times.lock();
            if times.len() > 1 {
                times.pop_front().unwrap_or_else(Utc::now)
            } else {
                times.front().copied().unwrap_or_else(Utc::now)
            }
        }
    }

    /// Connector whose clients never find the collection.
    struct NeverFound {
        creates: Arc<Mutex<u32>>,
    }

    struct NeverFoundClient {
        creates: Arc<Mutex<u32>>,
    }

    impl StoreClient for NeverFoundClient {
        fn put_batch(&mut self, collection: &str, _items: &[Item]) -> Result<(), StoreError> {
            Err(StoreError::CollectionNotFound(collection.to_string()))
        }
        fn create_collection(&mut self, _collection: &str) -> Result<(), StoreError> {
            *self.creates.lock() += 1;
            Ok(())
        }
        fn select(&mut self, _query: &str) -> Result<Vec<Item>, StoreError> {
            Ok(Vec::new())
        }
        fn set_region(&mut self, _region: &str) {}
        fn shutdown(&mut self) {}
    }

    impl StoreConnector for NeverFound {
        fn connect(
            &self,
            _credentials: &Credentials,
            _region: &str,
        ) -> Result<Box<dyn StoreClient>, StoreError> {
            Ok(Box::new(NeverFoundClient {
                creates: Arc::clone(&self.creates),
            }))
        }
    }

    struct NoCredentials;

    impl CredentialResolver for NoCredentials {
        fn resolve(&self) -> Result<Credentials, CredentialError> {
            Err(CredentialError::Unavailable("nothing configured".to_string()))
        }
    }

    fn march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59)
            .single()
            .expect("valid date")
    }

    fn april() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 1)
            .single()
            .expect("valid date")
    }

    fn settings(retry: u32) -> ExecutorSettings {
        ExecutorSettings {
            region: "ap-northeast-1".to_string(),
            collection_prefix: "Logs".to_string(),
            retry,
        }
    }

    struct Harness {
        store: MemoryStore,
        handler: Arc<RecordingHandler>,
        metrics: Arc<ShipperMetrics>,
        executor: WriteExecutor,
    }

    fn harness_with(retry: u32, clock: Arc<dyn Clock>) -> Harness {
        let store = MemoryStore::new();
        let handler = Arc::new(RecordingHandler::default());
        let metrics = Arc::new(ShipperMetrics::new());
        let executor = WriteExecutor::new(
            settings(retry),
            Arc::new(store.connector()),
            Arc::new(StaticCredentials::new(Credentials::new("id", "secret"))),
            handler.clone(),
            clock,
            Arc::clone(&metrics),
        );
        Harness {
            store,
            handler,
            metrics,
            executor,
        }
    }

    fn harness(retry: u32) -> Harness {
        harness_with(retry, Arc::new(ManualClock::new(march())))
    }

    fn batch(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(vec![Attribute::new("Message", format!("m{i}"))]))
            .collect()
    }

    #[test]
    fn missing_collection_is_created_without_consuming_attempts() {
        let mut h = harness(3);
        let outcome = h.executor.execute(&batch(2));

        assert_eq!(
            outcome,
            WriteOutcome::Success {
                attempts: 0,
                recoveries: 1
            }
        );
        let calls = h.store.calls();
        assert_eq!(calls.creates, 1);
        assert_eq!(calls.put_batches, 2);
        assert_eq!(calls.region_binds, 1);
        assert_eq!(calls.connects, 1);
        assert_eq!(h.handler.count(), 0);
        assert_eq!(h.store.items("Logs-2024-03").len(), 2);
        assert_eq!(h.metrics.snapshot().collections_created, 1);
    }

    #[test]
    fn exhausts_after_retry_limit() {
        let mut h = harness(3);
        h.store.create_collection("Logs-2024-03");
        h.store.fail_puts(true);

        let outcome = h.executor.execute(&batch(4));

        assert_eq!(outcome, WriteOutcome::Exhausted { attempts: 3 });
        assert_eq!(h.handler.count(), 3);
        assert!(h
            .handler
            .codes()
            .iter()
            .all(|c| *c == ErrorCode::GenericFailure));
        // the client is rebuilt after every client error
        assert_eq!(h.store.calls().connects, 3);
        assert!(!h.executor.is_connected());

        let snap = h.metrics.snapshot();
        assert_eq!(snap.client_errors, 3);
        assert_eq!(snap.batches_dropped, 1);
        assert_eq!(snap.items_dropped, 4);
        assert_eq!(snap.batches_written, 0);
    }

    #[test]
    fn zero_retry_allows_one_attempt() {
        let mut h = harness(0);
        h.store.create_collection("Logs-2024-03");
        h.store.fail_puts(true);

        assert_eq!(
            h.executor.execute(&batch(1)),
            WriteOutcome::Exhausted { attempts: 1 }
        );
        assert_eq!(h.store.calls().put_batches, 1);
        assert_eq!(h.handler.count(), 1);
    }

    #[test]
    fn transient_error_then_success() {
        let mut h = harness(3);
        h.store.create_collection("Logs-2024-03");
        h.store.fail_next_puts(1);

        assert_eq!(
            h.executor.execute(&batch(1)),
            WriteOutcome::Success {
                attempts: 1,
                recoveries: 0
            }
        );
        assert_eq!(h.store.calls().connects, 2);
        assert_eq!(h.handler.count(), 1);
        assert_eq!(h.metrics.snapshot().batches_written, 1);
    }

    #[test]
    fn collection_name_recomputed_per_attempt() {
        let clock = Arc::new(SequenceClock {
            times: Mutex::new(VecDeque::from(vec![march(), april()])),
        });
        let mut h = harness_with(3, clock);
        h.store.create_collection("Logs-2024-03");
        h.store.fail_next_puts(1);

        let outcome = h.executor.execute(&batch(1));

        assert!(outcome.is_success());
        assert!(h.store.items("Logs-2024-03").is_empty());
        assert_eq!(h.store.items("Logs-2024-04").len(), 1);
    }

    #[test]
    fn failed_create_consumes_an_attempt() {
        let mut h = harness(3);
        h.store.fail_next_creates(1);

        let outcome = h.executor.execute(&batch(1));

        assert_eq!(
            outcome,
            WriteOutcome::Success {
                attempts: 1,
                recoveries: 2
            }
        );
        assert_eq!(h.handler.count(), 1);
        assert_eq!(h.store.calls().creates, 2);
    }

    #[test]
    fn persistent_create_failure_terminates() {
        let mut h = harness(2);
        h.store.fail_next_creates(100);

        assert_eq!(
            h.executor.execute(&batch(1)),
            WriteOutcome::Exhausted { attempts: 2 }
        );
        assert_eq!(h.handler.count(), 2);
    }

    #[test]
    fn collection_that_never_appears_is_bounded() {
        let creates = Arc::new(Mutex::new(0));
        let handler = Arc::new(RecordingHandler::default());
        let mut executor = WriteExecutor::new(
            settings(1),
            Arc::new(NeverFound {
                creates: Arc::clone(&creates),
            }),
            Arc::new(StaticCredentials::new(Credentials::new("id", "secret"))),
            handler.clone(),
            Arc::new(ManualClock::new(march())),
            Arc::new(ShipperMetrics::new()),
        );

        let outcome = executor.execute(&batch(1));

        assert_eq!(outcome, WriteOutcome::Exhausted { attempts: 1 });
        assert_eq!(*creates.lock(), MAX_COLLECTION_RECOVERIES);
        assert_eq!(handler.count(), 1);
    }

    #[test]
    fn credential_failure_is_reported_and_counted() {
        let store = MemoryStore::new();
        let handler = Arc::new(RecordingHandler::default());
        let mut executor = WriteExecutor::new(
            settings(2),
            Arc::new(store.connector()),
            Arc::new(NoCredentials),
            handler.clone(),
            Arc::new(ManualClock::new(march())),
            Arc::new(ShipperMetrics::new()),
        );

        assert_eq!(
            executor.execute(&batch(1)),
            WriteOutcome::Exhausted { attempts: 2 }
        );
        assert_eq!(
            handler.codes(),
            vec![ErrorCode::CredentialFailure, ErrorCode::CredentialFailure]
        );
        assert_eq!(store.calls().connects, 0);
    }

    #[test]
    fn connect_failure_consumes_an_attempt() {
        let mut h = harness(3);
        h.store.create_collection("Logs-2024-03");
        h.store.fail_next_connects(1);

        assert_eq!(
            h.executor.execute(&batch(1)),
            WriteOutcome::Success {
                attempts: 1,
                recoveries: 0
            }
        );
        assert_eq!(h.store.calls().connects, 2);
    }

    #[test]
    fn client_is_reused_across_batches() {
        let mut h = harness(3);
        h.store.create_collection("Logs-2024-03");

        assert!(h.executor.execute(&batch(1)).is_success());
        assert!(h.executor.execute(&batch(1)).is_success());
        assert_eq!(h.store.calls().connects, 1);
        assert!(h.executor.is_connected());
    }

    #[test]
    fn empty_batch_makes_no_calls() {
        let mut h = harness(3);
        assert!(h.executor.execute(&[]).is_success());
        assert_eq!(h.store.calls(), Default::default());
    }

    #[test]
    fn shutdown_releases_client_once() {
        let mut h = harness(3);
        h.store.create_collection("Logs-2024-03");
        assert!(h.executor.execute(&batch(1)).is_success());

        h.executor.shutdown();
        h.executor.shutdown();
        assert_eq!(h.store.calls().shutdowns, 1);
        assert!(!h.executor.is_connected());
    }

    #[test]
    fn reconfigure_releases_client_and_applies_settings() {
        let mut h = harness(3);
        h.store.create_collection("Logs-2024-03");
        assert!(h.executor.execute(&batch(1)).is_success());

        h.executor.reconfigure(ExecutorSettings {
            collection_prefix: "Audit".to_string(),
            ..settings(1)
        });
        assert_eq!(h.store.calls().shutdowns, 1);
        assert_eq!(h.executor.settings().collection_prefix, "Audit");

        assert!(h.executor.execute(&batch(1)).is_success());
        assert_eq!(h.store.items("Audit-2024-03").len(), 1);
    }

    #[test]
    fn attempt_limit_floor() {
        assert_eq!(settings(0).attempt_limit(), 1);
        assert_eq!(settings(1).attempt_limit(), 1);
        assert_eq!(settings(5).attempt_limit(), 5);
    }
}
