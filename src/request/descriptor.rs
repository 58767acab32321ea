//! The request descriptor.

use super::callbacks::{DataSink, RequestCallbacks, SuccessOutcome};
use crate::cache::CacheKey;
use crate::engine::{Category, Transfer};
use crate::error_sink::{CallbackPanic, ErrorSink, TracingErrorSink};
use crate::failure::{FailureKind, RequestFailure};
use crate::priority::Priority;
use crate::strategy::{DownloadIfNotCached, DownloadStrategy};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

// =============================================================================
// Identity types
// =============================================================================

/// Identity the request is performed as.
///
/// Anonymous requests use [`RequesterId::anonymous`]; there is no way to
/// express "no requester", which is what makes differently-authenticated
/// fetches of one URL cache separately without a null case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(String);

impl RequesterId {
    /// Creates a named requester identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The anonymous identity.
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    /// Returns true for the anonymous identity.
    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the identity as a string ("" for anonymous).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One name/value pair of a write payload, form-encoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostField {
    pub name: String,
    pub value: String,
}

impl PostField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Caller-defined tag describing what kind of content a request fetches.
///
/// Opaque to the engine; carried so result consumers can dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileKind(pub u32);

impl FileKind {
    pub const UNSPECIFIED: FileKind = FileKind(0);
}

// =============================================================================
// Request descriptor
// =============================================================================

/// Lock-protected mutable lifecycle state.
///
/// One mutex guards both fields so that `cancel()` and `attach_transfer()`
/// exclude each other; this is the single race-resolution point between a
/// caller cancelling and the engine starting the transfer.
struct LifecycleState {
    cancelled: bool,
    transfer: Option<Transfer>,
}

/// One caller-issued request for cached or fetched content.
///
/// Immutable after construction except for the cancellation flag and the
/// in-flight transfer handle. Shared as `Arc<Request>`: the caller keeps
/// one clone for `cancel()`, the engine keeps one while scheduling.
///
/// # Lifecycle
///
/// Built via [`Request::builder`], submitted to the engine, then exactly
/// one of {served from cache, transferred, failed, cancelled} happens.
/// Once cancelled, a request never becomes live again.
pub struct Request {
    target: Option<Url>,
    requester: RequesterId,
    session: Option<Uuid>,
    priority: Priority,
    strategy: Arc<dyn DownloadStrategy>,
    file_kind: FileKind,
    category: Category,
    post_fields: Option<Vec<PostField>>,
    /// Derived: true iff there is no write payload. Write-payload requests
    /// are never served from or written to the cache.
    cache: bool,
    callbacks: Box<dyn RequestCallbacks>,
    error_sink: Arc<dyn ErrorSink>,
    state: Mutex<LifecycleState>,
    terminal_fired: AtomicBool,
}

impl Request {
    /// Starts building a request.
    ///
    /// `target` is optional to mirror the failure contract: building with
    /// `None` synchronously delivers the malformed-target failure and
    /// marks the request cancelled, so it can never be enqueued.
    pub fn builder(
        target: Option<Url>,
        requester: RequesterId,
        category: Category,
        callbacks: Box<dyn RequestCallbacks>,
    ) -> RequestBuilder {
        RequestBuilder {
            target,
            requester,
            category,
            callbacks,
            session: None,
            priority: Priority::default(),
            strategy: Arc::new(DownloadIfNotCached),
            file_kind: FileKind::UNSPECIFIED,
            post_fields: None,
            error_sink: Arc::new(TracingErrorSink),
        }
    }

    /// Parses a target URL, returning `None` when it is not usable.
    pub fn parse_target(raw: &str) -> Option<Url> {
        Url::parse(raw).ok()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The target URL; `None` only for malformed requests, which are
    /// already cancelled and never reach the engine.
    pub fn target(&self) -> Option<&Url> {
        self.target.as_ref()
    }

    pub fn requester(&self) -> &RequesterId {
        &self.requester
    }

    pub fn session(&self) -> Option<Uuid> {
        self.session
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn strategy(&self) -> &dyn DownloadStrategy {
        self.strategy.as_ref()
    }

    pub fn file_kind(&self) -> FileKind {
        self.file_kind
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn post_fields(&self) -> Option<&[PostField]> {
        self.post_fields.as_deref()
    }

    /// True iff the request participates in the cache (no write payload).
    pub fn uses_cache(&self) -> bool {
        self.cache
    }

    /// The store key for this request, when it has a target.
    pub fn cache_key(&self) -> Option<CacheKey> {
        self.target
            .as_ref()
            .map(|t| CacheKey::new(t.clone(), self.requester.clone()))
    }

    /// Returns true once `cancel()` has been called (or the request was
    /// malformed at construction).
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().unwrap().cancelled
    }

    // -------------------------------------------------------------------------
    // Cancellation and transfer attachment
    // -------------------------------------------------------------------------

    /// Cancels the request.
    ///
    /// Idempotent and safe from any thread at any point in the request's
    /// life: before submission, while queued, mid-transfer, or after
    /// completion (a no-op then). If a transfer is in flight its
    /// cancellation is requested and the handle detached.
    pub fn cancel(&self) {
        let transfer = {
            let mut state = self.state.lock().unwrap();
            state.cancelled = true;
            state.transfer.take()
        };
        // Cancelling the token is non-blocking; done outside the lock so
        // the flag can never be observed unset after a cancelled transfer.
        if let Some(transfer) = transfer {
            debug!(target = ?self.target.as_ref().map(Url::as_str), "cancelling in-flight transfer");
            transfer.cancel();
        }
    }

    /// Attaches the transfer about to be started for this request.
    ///
    /// Returns false, attaching nothing, if the request was already
    /// cancelled; the engine must then abandon the request without
    /// starting the transfer. Runs under the same lock as `cancel()`, so
    /// exactly one of the two racing sides wins.
    pub(crate) fn attach_transfer(&self, transfer: Transfer) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.cancelled {
            return false;
        }
        state.transfer = Some(transfer);
        true
    }

    /// Clears the transfer handle after the transfer finishes.
    pub(crate) fn clear_transfer(&self) {
        self.state.lock().unwrap().transfer = None;
    }

    #[cfg(test)]
    pub(crate) fn active_transfer(&self) -> Option<Transfer> {
        self.state.lock().unwrap().transfer.clone()
    }

    // -------------------------------------------------------------------------
    // Notification plumbing
    // -------------------------------------------------------------------------
    //
    // Each notify method forwards to the callback bundle inside a guarded
    // region: a panicking callback is caught, logged, and reported to the
    // error sink. The two pre-download notifications additionally survive
    // a panicking error sink.

    /// Delivers the terminal failure, at most once.
    pub(crate) fn notify_failure(&self, failure: RequestFailure) {
        if self.terminal_fired.swap(true, Ordering::SeqCst) {
            debug!(failure = %failure, "suppressing duplicate terminal notification");
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.callbacks.on_failure(failure))) {
            self.report_callback_panic("on_failure", payload);
        }
    }

    /// Delivers the terminal success, at most once.
    pub(crate) fn notify_success(&self, outcome: SuccessOutcome) {
        if self.terminal_fired.swap(true, Ordering::SeqCst) {
            debug!("suppressing duplicate terminal notification");
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.callbacks.on_success(outcome))) {
            self.report_callback_panic("on_success", payload);
        }
    }

    pub(crate) fn notify_progress(
        &self,
        authorization_in_progress: bool,
        bytes_read: u64,
        total_bytes: Option<u64>,
    ) {
        if self.terminal_fired.load(Ordering::SeqCst) {
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| {
            self.callbacks
                .on_progress(authorization_in_progress, bytes_read, total_bytes)
        })) {
            self.report_callback_panic("on_progress", payload);
        }
    }

    pub(crate) fn notify_download_necessary(&self) {
        if self.terminal_fired.load(Ordering::SeqCst) {
            return;
        }
        if let Err(payload) =
            catch_unwind(AssertUnwindSafe(|| self.callbacks.on_download_necessary()))
        {
            self.report_callback_panic_guarded("on_download_necessary", payload);
        }
    }

    pub(crate) fn notify_download_started(&self) {
        if self.terminal_fired.load(Ordering::SeqCst) {
            return;
        }
        if let Err(payload) =
            catch_unwind(AssertUnwindSafe(|| self.callbacks.on_download_started()))
        {
            self.report_callback_panic_guarded("on_download_started", payload);
        }
    }

    pub(crate) fn notify_data_stream_available(&self) -> Option<Box<dyn DataSink>> {
        match catch_unwind(AssertUnwindSafe(|| self.callbacks.on_data_stream_available())) {
            Ok(sink) => sink,
            Err(payload) => {
                self.report_callback_panic("on_data_stream_available", payload);
                None
            }
        }
    }

    /// Routes a caught callback panic to the error sink.
    pub(crate) fn report_callback_panic(
        &self,
        context: &'static str,
        payload: Box<dyn std::any::Any + Send>,
    ) {
        let panic = CallbackPanic::from_payload(payload);
        error!(context = context, error = %panic, "callback panicked");
        self.error_sink.report(context, &panic);
    }

    /// Like `report_callback_panic`, but also survives a panicking sink.
    fn report_callback_panic_guarded(
        &self,
        context: &'static str,
        payload: Box<dyn std::any::Any + Send>,
    ) {
        let panic = CallbackPanic::from_payload(payload);
        error!(context = context, error = %panic, "callback panicked");
        let report = catch_unwind(AssertUnwindSafe(|| self.error_sink.report(context, &panic)));
        if report.is_err() {
            error!(context = context, "error sink panicked while reporting a callback panic");
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("target", &self.target.as_ref().map(Url::as_str))
            .field("requester", &self.requester)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("cache", &self.cache)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Request`].
///
/// # Panics
///
/// `build()` panics when the request combines a write payload with a
/// strategy that would check the cache. That is a programmer error, by
/// contract distinct from runtime failures, and it fails fast rather than
/// surfacing through the async callback path.
pub struct RequestBuilder {
    target: Option<Url>,
    requester: RequesterId,
    category: Category,
    callbacks: Box<dyn RequestCallbacks>,
    session: Option<Uuid>,
    priority: Priority,
    strategy: Arc<dyn DownloadStrategy>,
    file_kind: FileKind,
    post_fields: Option<Vec<PostField>>,
    error_sink: Arc<dyn ErrorSink>,
}

impl RequestBuilder {
    /// Sets the session correlator.
    pub fn session(mut self, session: Uuid) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the scheduling priority (default: rank 0).
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the download strategy (default: [`DownloadIfNotCached`]).
    pub fn strategy(mut self, strategy: Arc<dyn DownloadStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the content kind tag.
    pub fn file_kind(mut self, file_kind: FileKind) -> Self {
        self.file_kind = file_kind;
        self
    }

    /// Attaches a write payload, making this a POST-style request that
    /// bypasses the cache entirely. Requires a strategy answering
    /// `should_download_without_checking_cache() == true`.
    pub fn post_fields(mut self, fields: Vec<PostField>) -> Self {
        self.post_fields = Some(fields);
        self
    }

    /// Overrides the error sink (default: [`TracingErrorSink`]).
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    /// Builds the request.
    ///
    /// A request built without a target receives the malformed-target
    /// failure synchronously, is marked cancelled, and will be rejected
    /// by `submit()`.
    pub fn build(self) -> Arc<Request> {
        if self.post_fields.is_some() && !self.strategy.should_download_without_checking_cache() {
            panic!("write-payload requests must use a strategy that downloads without checking the cache");
        }

        let malformed = self.target.is_none();
        let cache = self.post_fields.is_none();

        let request = Arc::new(Request {
            target: self.target,
            requester: self.requester,
            session: self.session,
            priority: self.priority,
            strategy: self.strategy,
            file_kind: self.file_kind,
            category: self.category,
            post_fields: self.post_fields,
            cache,
            callbacks: self.callbacks,
            error_sink: self.error_sink,
            state: Mutex::new(LifecycleState {
                cancelled: false,
                transfer: None,
            }),
            terminal_fired: AtomicBool::new(false),
        });

        if malformed {
            request.notify_failure(
                RequestFailure::new(FailureKind::MalformedTarget)
                    .with_message("request built without a target"),
            );
            request.cancel();
        }

        request
    }
}
