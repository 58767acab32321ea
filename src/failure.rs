//! Request failure kinds and the terminal failure value.
//!
//! Every failed request is reported through exactly one
//! [`on_failure`](crate::request::RequestCallbacks::on_failure) call carrying
//! a [`RequestFailure`]. The [`FailureKind`] set is closed: transport and
//! cache errors are mapped onto the nearest kind at the engine boundary, so
//! callers can match on it without knowing which collaborator failed.

use std::sync::Arc;

/// The closed set of reasons a request can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The network connection failed or was interrupted.
    Connection,
    /// The remote host rejected the request (non-success HTTP status).
    Request,
    /// Reading or writing the cache store failed.
    Storage,
    /// A cache-only request found nothing cached for its target.
    CacheMiss,
    /// The request was cancelled while a transfer was in flight.
    Cancelled,
    /// The request was built without a usable target.
    MalformedTarget,
    /// The delivered payload could not be decoded.
    Parse,
    /// The cache store ran out of disk space.
    DiskSpace,
    /// The remote host redirected somewhere the transport refuses to follow.
    RedirectRejected,
    /// A remote API response failed API-specific decoding.
    ApiParse,
    /// A remote API rejected an upload.
    ApiUpload,
    /// The cache directory no longer exists.
    CacheDirMissing,
}

impl FailureKind {
    /// Returns a short stable name for this kind, suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Request => "request",
            Self::Storage => "storage",
            Self::CacheMiss => "cache_miss",
            Self::Cancelled => "cancelled",
            Self::MalformedTarget => "malformed_target",
            Self::Parse => "parse",
            Self::DiskSpace => "disk_space",
            Self::RedirectRejected => "redirect_rejected",
            Self::ApiParse => "api_parse",
            Self::ApiUpload => "api_upload",
            Self::CacheDirMissing => "cache_dir_missing",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure delivered to a request's callback set.
///
/// Bundles the failure kind with whatever detail was available at the point
/// of failure: the underlying error, the HTTP status (for rejected
/// requests), and a human-readable message.
#[derive(Debug, Clone)]
pub struct RequestFailure {
    /// What went wrong, from the closed set.
    pub kind: FailureKind,
    /// The underlying error, when one exists.
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    /// HTTP status code, for failures carrying one.
    pub http_status: Option<u16>,
    /// Human-readable description.
    pub message: Option<String>,
}

impl RequestFailure {
    /// Creates a failure of the given kind with no further detail.
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            cause: None,
            http_status: None,
            message: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attaches an HTTP status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Attaches a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {})", status)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(FailureKind::Connection.as_str(), "connection");
        assert_eq!(FailureKind::CacheMiss.as_str(), "cache_miss");
        assert_eq!(FailureKind::MalformedTarget.as_str(), "malformed_target");
        assert_eq!(FailureKind::CacheDirMissing.as_str(), "cache_dir_missing");
    }

    #[test]
    fn test_display_includes_status_and_message() {
        let failure = RequestFailure::new(FailureKind::Request)
            .with_status(503)
            .with_message("service unavailable");

        let rendered = format!("{}", failure);
        assert!(rendered.contains("request"));
        assert!(rendered.contains("503"));
        assert!(rendered.contains("service unavailable"));
    }

    #[test]
    fn test_bare_failure_displays_kind_only() {
        let failure = RequestFailure::new(FailureKind::Cancelled);
        assert_eq!(format!("{}", failure), "cancelled");
    }

    #[test]
    fn test_cause_is_exposed_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let failure = RequestFailure::new(FailureKind::Storage).with_cause(io);

        let source = std::error::Error::source(&failure).expect("source should be set");
        assert!(source.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_failure_is_clone() {
        let failure = RequestFailure::new(FailureKind::Parse).with_message("bad json");
        let copy = failure.clone();
        assert_eq!(copy.kind, FailureKind::Parse);
        assert_eq!(copy.message.as_deref(), Some("bad json"));
    }
}
