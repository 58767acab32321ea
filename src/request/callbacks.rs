//! Caller-supplied callback bundle.

use crate::cache::ReadableEntry;
use crate::failure::RequestFailure;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Consumer of raw bytes as they arrive from the wire.
///
/// Returned from [`RequestCallbacks::on_data_stream_available`] when the
/// caller wants to observe the body incrementally (e.g. to feed a
/// progressive decoder) instead of waiting for the terminal callback.
pub trait DataSink: Send {
    /// Called with each chunk as it is received, in order.
    fn on_bytes(&mut self, chunk: &[u8]);

    /// Called once after the final chunk when the transfer succeeded.
    fn on_complete(&mut self);

    /// Called once if the transfer ended before the body was complete.
    fn on_interrupted(&mut self);
}

/// Everything delivered by a successful request.
#[derive(Debug, Clone)]
pub struct SuccessOutcome {
    /// Handle to the delivered bytes (cached entry or direct body).
    pub entry: ReadableEntry,
    /// When the bytes were fetched. For cache hits this is the original
    /// fetch time, not the hit time.
    pub timestamp: DateTime<Utc>,
    /// Session correlator: the request's own, or the one recorded by the
    /// cached entry it was served from.
    pub session: Uuid,
    /// True if served from the cache store without a transfer.
    pub from_cache: bool,
    /// Effective MIME type, when known.
    pub mime_type: Option<String>,
}

/// Callback bundle attached to a request at construction.
///
/// Exactly one of the two terminal callbacks ([`on_success`] /
/// [`on_failure`]) fires per request, at most once; non-terminal callbacks
/// never fire after a terminal one. Progress may still arrive after
/// `cancel()` has been requested but before the transfer observes it, and
/// must be treated as informational.
///
/// All methods are invoked from engine workers. Panics are caught and
/// reported to the error sink; they never affect other requests.
///
/// [`on_success`]: RequestCallbacks::on_success
/// [`on_failure`]: RequestCallbacks::on_failure
pub trait RequestCallbacks: Send + Sync {
    /// Returns a sink to intercept raw bytes as they arrive, or `None`
    /// (the default) for no interception.
    fn on_data_stream_available(&self) -> Option<Box<dyn DataSink>> {
        None
    }

    /// Invoked once, before the transfer starts, when the cache decision
    /// requires a fetch. Not invoked for cache hits.
    fn on_download_necessary(&self) {}

    /// Invoked once when the transfer actually begins.
    fn on_download_started(&self) {}

    /// Invoked zero or more times while the transfer runs.
    ///
    /// `authorization_in_progress` is true while a preliminary
    /// authorization exchange is running ahead of the payload transfer.
    /// `total_bytes` is `None` when the remote host did not announce a
    /// length.
    fn on_progress(&self, authorization_in_progress: bool, bytes_read: u64, total_bytes: Option<u64>) {
        let _ = (authorization_in_progress, bytes_read, total_bytes);
    }

    /// Terminal: the request failed.
    fn on_failure(&self, failure: RequestFailure);

    /// Terminal: the request succeeded.
    fn on_success(&self, outcome: SuccessOutcome);
}
