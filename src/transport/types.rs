//! Transport types and traits.

use crate::request::PostField;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How the target should be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMethod {
    /// Plain GET.
    Get,
    /// POST with a form-encoded write payload.
    PostForm(Vec<PostField>),
}

/// One network operation handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub target: Url,
    pub method: TransportMethod,
}

/// The completed result of a transport operation.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The full response body.
    pub body: Bytes,
    /// Effective MIME type from the Content-Type header, parameters
    /// stripped.
    pub mime_type: Option<String>,
    /// The HTTP status the body was delivered with.
    pub http_status: u16,
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established or broke mid-request.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote host answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The remote host redirected somewhere the transport refuses to go.
    #[error("redirect rejected: {0}")]
    RedirectRejected(String),

    /// The body stream failed after headers were received.
    #[error("response body read failed: {0}")]
    Body(String),

    /// The operation was cancelled cooperatively.
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransportError {
    /// The HTTP status carried by this error, when there is one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Receives transfer progress and raw body chunks as they arrive.
///
/// Implemented by the transfer handle, which forwards progress into the
/// request descriptor and chunks into the caller's optional data sink.
pub trait TransferObserver: Send {
    /// Called as bytes arrive. `authorization_in_progress` is true while
    /// a preliminary authorization exchange runs ahead of the payload;
    /// `total_bytes` is `None` when the length is not announced.
    fn on_progress(&mut self, authorization_in_progress: bool, bytes_read: u64, total_bytes: Option<u64>);

    /// Called with each body chunk, in arrival order.
    fn on_chunk(&mut self, chunk: &[u8]);
}

/// Performs network operations with cooperative cancellation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the operation, streaming into `observer` as data arrives.
    ///
    /// Implementations must return promptly with
    /// [`TransportError::Cancelled`] once `cancel` fires; they must never
    /// block on anything the cancellation cannot interrupt.
    async fn perform(
        &self,
        request: TransportRequest,
        observer: &mut dyn TransferObserver,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, TransportError>;
}
