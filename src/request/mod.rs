//! Request descriptors and the caller callback contract.
//!
//! A [`Request`] is the immutable description of one fetch-or-cache
//! operation, plus a small amount of lock-protected lifecycle state (the
//! cancellation flag and the in-flight transfer handle). Callers build one,
//! submit it to the [`engine::QueueEngine`](crate::engine::QueueEngine),
//! and may cancel it from any thread at any time.
//!
//! Results come back through the [`RequestCallbacks`] bundle attached at
//! construction. The engine never lets a panicking callback escape into a
//! worker: every notification runs inside a guarded region that routes
//! panics to the injected [`ErrorSink`](crate::error_sink::ErrorSink).

mod callbacks;
mod descriptor;

pub use callbacks::{DataSink, RequestCallbacks, SuccessOutcome};
pub use descriptor::{FileKind, PostField, Request, RequestBuilder, RequesterId};
