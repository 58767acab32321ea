//! Engine observability events.
//!
//! The engine emits structured events via a sink abstraction and does not
//! know how they are consumed. Consumers (logging, dashboards, tests)
//! decide how to present or aggregate them.

use super::category::Category;
use crate::failure::FailureKind;

/// Events emitted while requests move through the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A request was admitted to a lane queue.
    RequestQueued {
        category: Category,
        target: String,
        queue_depth: usize,
    },

    /// A cancelled request was dropped without callbacks.
    RequestDropped { category: Category, target: String },

    /// A request was served from the cache store; no transfer was made.
    ServedFromCache { category: Category, target: String },

    /// A transfer began for a request.
    DownloadStarted { category: Category, target: String },

    /// A request delivered its terminal success.
    RequestSucceeded {
        category: Category,
        target: String,
        from_cache: bool,
    },

    /// A request delivered its terminal failure.
    RequestFailed {
        category: Category,
        target: String,
        kind: FailureKind,
    },
}

impl EngineEvent {
    /// Short stable name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RequestQueued { .. } => "request_queued",
            Self::RequestDropped { .. } => "request_dropped",
            Self::ServedFromCache { .. } => "served_from_cache",
            Self::DownloadStarted { .. } => "download_started",
            Self::RequestSucceeded { .. } => "request_succeeded",
            Self::RequestFailed { .. } => "request_failed",
        }
    }
}

/// Sink for engine events.
///
/// Implementations must be `Send + Sync` and should be fast and
/// non-blocking; events are emitted from lane workers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// No-op sink for when observability is not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: EngineEvent) {
        // Intentionally empty
    }
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: EngineEvent) {
        match &event {
            EngineEvent::RequestQueued {
                category,
                target,
                queue_depth,
            } => {
                tracing::debug!(
                    category = %category,
                    target = %target,
                    queue_depth = queue_depth,
                    "request queued"
                );
            }
            EngineEvent::RequestDropped { category, target } => {
                tracing::debug!(category = %category, target = %target, "cancelled request dropped");
            }
            EngineEvent::ServedFromCache { category, target } => {
                tracing::debug!(category = %category, target = %target, "served from cache");
            }
            EngineEvent::DownloadStarted { category, target } => {
                tracing::debug!(category = %category, target = %target, "download started");
            }
            EngineEvent::RequestSucceeded {
                category,
                target,
                from_cache,
            } => {
                tracing::debug!(
                    category = %category,
                    target = %target,
                    from_cache = from_cache,
                    "request succeeded"
                );
            }
            EngineEvent::RequestFailed {
                category,
                target,
                kind,
            } => {
                tracing::warn!(
                    category = %category,
                    target = %target,
                    kind = %kind,
                    "request failed"
                );
            }
        }
    }
}
