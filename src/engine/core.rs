//! Queue engine core: lanes, schedulers, and the cache-or-network
//! decision.

use super::category::Category;
use super::config::EngineConfig;
use super::events::{EngineEvent, EventSink, NullEventSink};
use super::queue::LaneQueue;
use super::transfer::Transfer;
use crate::cache::{CacheError, CacheStore, EntryMetadata, ReadableEntry};
use crate::failure::{FailureKind, RequestFailure};
use crate::request::{Request, SuccessOutcome};
use crate::transport::{Transport, TransportError, TransportResponse};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors surfaced synchronously by [`QueueEngine::submit`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The request was cancelled (or malformed) before submission.
    #[error("request was cancelled before submission")]
    AlreadyCancelled,

    /// The engine has been shut down.
    #[error("engine is shut down")]
    ShutDown,
}

/// One category's scheduling state.
struct Lane {
    category: Category,
    /// Pending requests. Guarded by a plain mutex; never held across an
    /// await point.
    queue: Mutex<LaneQueue>,
    /// Woken on every enqueue.
    notify: Notify,
    /// Concurrency ceiling for this lane.
    semaphore: Arc<Semaphore>,
}

impl Lane {
    /// Waits for and returns the next live request in this lane.
    async fn next_live(&self) -> Arc<Request> {
        loop {
            let popped = self.queue.lock().unwrap().pop_live();
            if let Some(request) = popped {
                return request;
            }
            self.notify.notified().await;
        }
    }
}

/// The download coordination engine.
///
/// Admits request descriptors, keeps one priority-ordered queue per
/// category, and runs each lane up to its concurrency ceiling. The engine
/// alone evaluates the download strategy against cache state, creates
/// transfers, and writes fetched bodies back to the store; transfers never
/// touch the cache.
///
/// Construction spawns one scheduler task per lane, so the engine must be
/// created inside a Tokio runtime. [`shutdown`](Self::shutdown) stops the
/// schedulers; executions already in flight run to completion.
pub struct QueueEngine {
    lanes: Vec<Arc<Lane>>,
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventSink>,
    shutdown: CancellationToken,
}

impl QueueEngine {
    /// Creates an engine with no event sink.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Self::with_events(config, store, transport, Arc::new(NullEventSink))
    }

    /// Creates an engine emitting [`EngineEvent`]s to the given sink.
    pub fn with_events(
        config: EngineConfig,
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
        events: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        let lanes = Category::ALL
            .iter()
            .map(|&category| {
                Arc::new(Lane {
                    category,
                    queue: Mutex::new(LaneQueue::new()),
                    notify: Notify::new(),
                    semaphore: Arc::new(Semaphore::new(config.concurrency(category))),
                })
            })
            .collect::<Vec<_>>();

        let engine = Arc::new(Self {
            lanes,
            store,
            transport,
            events,
            shutdown: CancellationToken::new(),
        });

        for lane in &engine.lanes {
            tokio::spawn(Self::run_lane(Arc::clone(&engine), Arc::clone(lane)));
        }

        info!(lanes = Category::COUNT, "queue engine started");
        engine
    }

    /// Submits a request for execution.
    ///
    /// Non-blocking: the request is enqueued into its category's lane and
    /// picked up when a worker slot frees. Requests already cancelled
    /// (including malformed-at-construction ones) are rejected.
    pub fn submit(&self, request: Arc<Request>) -> Result<(), SubmitError> {
        if self.shutdown.is_cancelled() {
            return Err(SubmitError::ShutDown);
        }
        if request.is_cancelled() {
            return Err(SubmitError::AlreadyCancelled);
        }

        let category = request.category();
        let target = Self::target_string(&request);
        let lane = &self.lanes[category.index()];

        let queue_depth = {
            let mut queue = lane.queue.lock().unwrap();
            queue.push(Arc::clone(&request));
            queue.len()
        };

        self.events.emit(EngineEvent::RequestQueued {
            category,
            target,
            queue_depth,
        });
        lane.notify.notify_one();
        Ok(())
    }

    /// Stops the lane schedulers. In-flight executions finish; queued
    /// requests are abandoned without callbacks.
    pub fn shutdown(&self) {
        info!("queue engine shutting down");
        self.shutdown.cancel();
    }

    /// Returns the number of requests waiting in a category's queue.
    pub fn queue_depth(&self, category: Category) -> usize {
        self.lanes[category.index()].queue.lock().unwrap().len()
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Scheduler loop for one lane: acquire a worker slot, wait for the
    /// highest-priority live request, execute it on its own task. The
    /// permit travels into the spawned future and releases when the
    /// execution finishes.
    async fn run_lane(engine: Arc<QueueEngine>, lane: Arc<Lane>) {
        loop {
            let permit = tokio::select! {
                biased;
                _ = engine.shutdown.cancelled() => break,
                permit = Arc::clone(&lane.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let request = tokio::select! {
                biased;
                _ = engine.shutdown.cancelled() => break,
                request = lane.next_live() => request,
            };

            let worker = Arc::clone(&engine);
            let category = lane.category;
            tokio::spawn(async move {
                worker.execute(category, request).await;
                drop(permit);
            });
        }
        debug!(category = %lane.category, "lane scheduler stopped");
    }

    // -------------------------------------------------------------------------
    // Decision procedure
    // -------------------------------------------------------------------------

    /// Runs the cache-or-network decision for one dequeued request and
    /// carries it to its terminal outcome.
    async fn execute(&self, category: Category, request: Arc<Request>) {
        let target = Self::target_string(&request);

        // Cancellation may have landed between dequeue and execution.
        if request.is_cancelled() {
            self.events.emit(EngineEvent::RequestDropped {
                category,
                target,
            });
            return;
        }

        // The strategy is the only thing allowed to skip the cache check.
        if !request.strategy().should_download_without_checking_cache() {
            let Some(key) = request.cache_key() else {
                return;
            };
            match self.store.lookup(&key) {
                Ok(Some(entry)) => {
                    if !request.strategy().should_download_if_cached(&entry.metadata) {
                        self.serve_from_cache(category, target, &request, entry);
                        return;
                    }
                }
                Ok(None) => {
                    if !request.strategy().should_download_if_not_cached() {
                        let failure = RequestFailure::new(FailureKind::CacheMiss)
                            .with_message("nothing cached for cache-only request");
                        self.fail(category, target, &request, failure);
                        return;
                    }
                }
                Err(error) => {
                    self.fail(
                        category,
                        target,
                        &request,
                        Self::failure_from_cache("cache lookup failed", error),
                    );
                    return;
                }
            }
        }

        // A fetch is required.
        request.notify_download_necessary();

        let transfer = Transfer::new();
        if !request.attach_transfer(transfer.clone()) {
            // Cancelled in the race window; the transfer never starts.
            self.events.emit(EngineEvent::RequestDropped {
                category,
                target,
            });
            return;
        }

        request.notify_download_started();
        self.events.emit(EngineEvent::DownloadStarted {
            category,
            target: target.clone(),
        });

        let outcome = transfer.run(self.transport.as_ref(), &request).await;
        request.clear_transfer();

        match outcome {
            Ok(response) => self.finish_success(category, target, &request, response),
            Err(error) => {
                self.fail(category, target, &request, Self::failure_from_transport(error));
            }
        }
    }

    /// Fast path: deliver a cached entry. No transfer is created.
    fn serve_from_cache(
        &self,
        category: Category,
        target: String,
        request: &Request,
        entry: crate::cache::CacheEntry,
    ) {
        let metadata = entry.metadata.clone();
        self.events.emit(EngineEvent::ServedFromCache {
            category,
            target: target.clone(),
        });
        request.notify_success(SuccessOutcome {
            entry: ReadableEntry::from_store(Arc::clone(&self.store), entry),
            timestamp: metadata.timestamp,
            session: metadata.session,
            from_cache: true,
            mime_type: metadata.mime_type,
        });
        self.events.emit(EngineEvent::RequestSucceeded {
            category,
            target,
            from_cache: true,
        });
    }

    /// Finalizes a completed transfer: write back to the cache when the
    /// request participates in it, then deliver success.
    fn finish_success(
        &self,
        category: Category,
        target: String,
        request: &Request,
        response: TransportResponse,
    ) {
        let timestamp = Utc::now();
        let session = request.session().unwrap_or_else(Uuid::new_v4);
        let mime_type = response.mime_type.clone();

        let entry = if request.uses_cache() {
            let Some(key) = request.cache_key() else {
                return;
            };
            let metadata = EntryMetadata {
                timestamp,
                session,
                mime_type: mime_type.clone(),
            };
            match self.store.write(&key, response.body, metadata) {
                Ok(entry) => ReadableEntry::from_store(Arc::clone(&self.store), entry),
                Err(error) => {
                    self.fail(
                        category,
                        target,
                        request,
                        Self::failure_from_cache("cache write failed", error),
                    );
                    return;
                }
            }
        } else {
            // Write-payload responses bypass the cache entirely.
            ReadableEntry::from_bytes(response.body)
        };

        request.notify_success(SuccessOutcome {
            entry,
            timestamp,
            session,
            from_cache: false,
            mime_type,
        });
        self.events.emit(EngineEvent::RequestSucceeded {
            category,
            target,
            from_cache: false,
        });
    }

    /// Delivers a terminal failure and emits the matching event.
    fn fail(&self, category: Category, target: String, request: &Request, failure: RequestFailure) {
        let kind = failure.kind;
        request.notify_failure(failure);
        self.events.emit(EngineEvent::RequestFailed {
            category,
            target,
            kind,
        });
    }

    // -------------------------------------------------------------------------
    // Failure mapping
    // -------------------------------------------------------------------------

    fn failure_from_transport(error: TransportError) -> RequestFailure {
        let kind = match &error {
            TransportError::Connection(_) | TransportError::Body(_) => FailureKind::Connection,
            TransportError::Status { .. } => FailureKind::Request,
            TransportError::RedirectRejected(_) => FailureKind::RedirectRejected,
            TransportError::Cancelled => FailureKind::Cancelled,
        };
        let status = error.http_status();
        let message = error.to_string();
        let mut failure = RequestFailure::new(kind).with_message(message).with_cause(error);
        if let Some(status) = status {
            failure = failure.with_status(status);
        }
        failure
    }

    fn failure_from_cache(context: &'static str, error: CacheError) -> RequestFailure {
        let kind = match &error {
            CacheError::DirectoryMissing(_) => FailureKind::CacheDirMissing,
            CacheError::DiskFull(_) => FailureKind::DiskSpace,
            _ => FailureKind::Storage,
        };
        RequestFailure::new(kind).with_message(context).with_cause(error)
    }

    fn target_string(request: &Request) -> String {
        request
            .target()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "<no target>".to_string())
    }
}

impl std::fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("QueueEngine");
        for category in Category::ALL {
            s.field(category.as_str(), &self.queue_depth(category));
        }
        s.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::request::{RequestCallbacks, RequesterId};
    use crate::transport::{TransferObserver, TransportRequest};
    use async_trait::async_trait;
    use bytes::Bytes;

    struct SilentCallbacks;

    impl RequestCallbacks for SilentCallbacks {
        fn on_failure(&self, _failure: RequestFailure) {}
        fn on_success(&self, _outcome: SuccessOutcome) {}
    }

    struct StaticTransport;

    #[async_trait]
    impl Transport for StaticTransport {
        async fn perform(
            &self,
            _request: TransportRequest,
            _observer: &mut dyn TransferObserver,
            _cancel: &CancellationToken,
        ) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                body: Bytes::from_static(b"ok"),
                mime_type: None,
                http_status: 200,
            })
        }
    }

    fn engine() -> Arc<QueueEngine> {
        QueueEngine::new(
            EngineConfig::default(),
            Arc::new(MemoryCacheStore::new()),
            Arc::new(StaticTransport),
        )
    }

    fn request() -> Arc<Request> {
        Request::builder(
            Request::parse_target("https://example.com/x"),
            RequesterId::anonymous(),
            Category::Immediate,
            Box::new(SilentCallbacks),
        )
        .build()
    }

    #[tokio::test]
    async fn test_submit_rejects_cancelled_request() {
        let engine = engine();
        let request = request();
        request.cancel();

        assert_eq!(
            engine.submit(request),
            Err(SubmitError::AlreadyCancelled)
        );
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_request() {
        let engine = engine();
        let malformed = Request::builder(
            None,
            RequesterId::anonymous(),
            Category::Immediate,
            Box::new(SilentCallbacks),
        )
        .build();

        assert_eq!(
            engine.submit(malformed),
            Err(SubmitError::AlreadyCancelled)
        );
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let engine = engine();
        engine.shutdown();

        assert_eq!(engine.submit(request()), Err(SubmitError::ShutDown));
    }

    #[tokio::test]
    async fn test_queue_depths_start_empty() {
        let engine = engine();
        for category in Category::ALL {
            assert_eq!(engine.queue_depth(category), 0);
        }
        engine.shutdown();
    }

    #[test]
    fn test_transport_failure_mapping() {
        let failure =
            QueueEngine::failure_from_transport(TransportError::Connection("refused".into()));
        assert_eq!(failure.kind, FailureKind::Connection);

        let failure = QueueEngine::failure_from_transport(TransportError::Status {
            status: 500,
            url: "https://example.com/x".into(),
        });
        assert_eq!(failure.kind, FailureKind::Request);
        assert_eq!(failure.http_status, Some(500));

        let failure = QueueEngine::failure_from_transport(TransportError::RedirectRejected(
            "cross-origin".into(),
        ));
        assert_eq!(failure.kind, FailureKind::RedirectRejected);

        let failure = QueueEngine::failure_from_transport(TransportError::Cancelled);
        assert_eq!(failure.kind, FailureKind::Cancelled);
    }

    #[test]
    fn test_cache_failure_mapping() {
        let failure = QueueEngine::failure_from_cache(
            "cache lookup failed",
            CacheError::DirectoryMissing(std::path::PathBuf::from("/tmp/x")),
        );
        assert_eq!(failure.kind, FailureKind::CacheDirMissing);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "x");
        let failure =
            QueueEngine::failure_from_cache("cache write failed", CacheError::DiskFull(io));
        assert_eq!(failure.kind, FailureKind::DiskSpace);

        let failure =
            QueueEngine::failure_from_cache("cache write failed", CacheError::EntryMissing);
        assert_eq!(failure.kind, FailureKind::Storage);
    }
}
