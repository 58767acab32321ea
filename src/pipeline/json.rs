//! JSON-decoding result pipeline.

use crate::failure::{FailureKind, RequestFailure};
use crate::request::{RequestCallbacks, SuccessOutcome};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Receiver for decoded JSON outcomes.
pub trait JsonListener: Send + Sync {
    /// Called with the decoded document on success.
    fn on_json(
        &self,
        value: serde_json::Value,
        timestamp: DateTime<Utc>,
        session: Uuid,
        from_cache: bool,
    );

    /// Called with the original failure, or a parse failure when the
    /// delivered bytes were not valid JSON.
    fn on_failure(&self, failure: RequestFailure);
}

/// Callback set that decodes delivered bytes as JSON.
///
/// Attach it as a request's callback set; request failures pass through
/// unchanged, successes are decoded and re-dispatched to the listener,
/// and a decode error becomes a parse failure.
///
/// # Example
///
/// ```ignore
/// let request = Request::builder(
///     Request::parse_target("https://api.example.com/videos/abc"),
///     RequesterId::anonymous(),
///     Category::Immediate,
///     Box::new(JsonPipeline::new(listener)),
/// )
/// .build();
/// ```
pub struct JsonPipeline {
    listener: Arc<dyn JsonListener>,
}

impl JsonPipeline {
    /// Creates a pipeline forwarding to the given listener.
    pub fn new(listener: Arc<dyn JsonListener>) -> Self {
        Self { listener }
    }
}

impl RequestCallbacks for JsonPipeline {
    fn on_failure(&self, failure: RequestFailure) {
        self.listener.on_failure(failure);
    }

    fn on_success(&self, outcome: SuccessOutcome) {
        let body = match outcome.entry.read() {
            Ok(body) => body,
            Err(error) => {
                self.listener.on_failure(
                    RequestFailure::new(FailureKind::Storage)
                        .with_message("failed to read delivered entry")
                        .with_cause(error),
                );
                return;
            }
        };

        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => {
                self.listener
                    .on_json(value, outcome.timestamp, outcome.session, outcome.from_cache);
            }
            Err(error) => {
                self.listener.on_failure(
                    RequestFailure::new(FailureKind::Parse)
                        .with_message("JSON decode failed")
                        .with_cause(error),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReadableEntry;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        values: Mutex<Vec<serde_json::Value>>,
        failures: Mutex<Vec<RequestFailure>>,
    }

    impl JsonListener for RecordingListener {
        fn on_json(
            &self,
            value: serde_json::Value,
            _timestamp: DateTime<Utc>,
            _session: Uuid,
            _from_cache: bool,
        ) {
            self.values.lock().unwrap().push(value);
        }

        fn on_failure(&self, failure: RequestFailure) {
            self.failures.lock().unwrap().push(failure);
        }
    }

    fn outcome(body: &'static [u8]) -> SuccessOutcome {
        SuccessOutcome {
            entry: ReadableEntry::from_bytes(Bytes::from_static(body)),
            timestamp: Utc::now(),
            session: Uuid::new_v4(),
            from_cache: false,
            mime_type: Some("application/json".into()),
        }
    }

    #[test]
    fn test_valid_json_reaches_listener() {
        let listener = Arc::new(RecordingListener::default());
        let pipeline = JsonPipeline::new(Arc::clone(&listener) as Arc<dyn JsonListener>);

        pipeline.on_success(outcome(br#"{"status": "ok", "count": 3}"#));

        let values = listener.values.lock().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["status"], "ok");
        assert_eq!(values[0]["count"], 3);
        assert!(listener.failures.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_becomes_parse_failure() {
        let listener = Arc::new(RecordingListener::default());
        let pipeline = JsonPipeline::new(Arc::clone(&listener) as Arc<dyn JsonListener>);

        pipeline.on_success(outcome(b"<html>not json</html>"));

        assert!(listener.values.lock().unwrap().is_empty());
        let failures = listener.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::Parse);
    }

    #[test]
    fn test_request_failure_passes_through_unchanged() {
        let listener = Arc::new(RecordingListener::default());
        let pipeline = JsonPipeline::new(Arc::clone(&listener) as Arc<dyn JsonListener>);

        pipeline.on_failure(
            RequestFailure::new(FailureKind::Connection).with_message("refused"),
        );

        let failures = listener.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::Connection);
        assert_eq!(failures[0].message.as_deref(), Some("refused"));
    }
}
