//! Error sink for callback-originated failures.
//!
//! Callbacks are caller code, and a misbehaving caller must never take down
//! an engine worker. When a callback panics, the panic is caught, logged,
//! and handed to an [`ErrorSink`]. The sink is an injected dependency rather
//! than a process-wide global so tests can substitute a capturing
//! implementation.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`; reports may arrive from any
//! worker concurrently.

use thiserror::Error;

/// Sink for errors that must be surfaced but never propagated.
///
/// The engine reports here when caller-supplied callback code fails. A
/// report is informational: the request that triggered it continues to be
/// handled normally.
pub trait ErrorSink: Send + Sync {
    /// Called with the context in which the error was observed (the name of
    /// the callback that failed) and the error itself.
    ///
    /// This method should be fast and non-blocking.
    fn report(&self, context: &'static str, error: &(dyn std::error::Error + Send + Sync));
}

/// Error wrapping a caught callback panic.
#[derive(Debug, Error)]
#[error("callback panicked: {message}")]
pub struct CallbackPanic {
    /// The panic payload rendered as text, when it was a string.
    pub message: String,
}

impl CallbackPanic {
    /// Builds a `CallbackPanic` from a payload returned by
    /// `std::panic::catch_unwind`.
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// No-op sink for when error reporting is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullErrorSink;

impl ErrorSink for NullErrorSink {
    fn report(&self, _context: &'static str, _error: &(dyn std::error::Error + Send + Sync)) {
        // Intentionally empty
    }
}

/// Sink that logs reports using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, context: &'static str, error: &(dyn std::error::Error + Send + Sync)) {
        tracing::error!(context = context, error = %error, "callback error reported");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_from_str() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = CallbackPanic::from_payload(payload);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_panic_payload_from_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("formatted boom"));
        let err = CallbackPanic::from_payload(payload);
        assert_eq!(err.message, "formatted boom");
    }

    #[test]
    fn test_panic_payload_from_other_type() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        let err = CallbackPanic::from_payload(payload);
        assert_eq!(err.message, "non-string panic payload");
    }

    #[test]
    fn test_null_sink_accepts_reports() {
        let sink = NullErrorSink;
        let err = CallbackPanic {
            message: "x".into(),
        };
        sink.report("on_success", &err);
    }

    #[test]
    fn test_tracing_sink_accepts_reports() {
        let sink = TracingErrorSink;
        let err = CallbackPanic {
            message: "x".into(),
        };
        // Should not panic whether or not a subscriber is installed.
        sink.report("on_failure", &err);
    }

    #[test]
    fn test_sinks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NullErrorSink>();
        assert_send_sync::<TracingErrorSink>();
    }
}
