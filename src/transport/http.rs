//! HTTP transport on reqwest.

use super::types::{
    TransferObserver, Transport, TransportError, TransportMethod, TransportRequest,
    TransportResponse,
};
use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default User-Agent string for HTTP requests.
/// Some hosts reject requests without one.
const DEFAULT_USER_AGENT: &str = concat!("fetchlane/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum redirect chain length before the transport gives up.
const MAX_REDIRECTS: usize = 5;

/// Streaming HTTP transport.
///
/// Same-host redirects are followed up to [`MAX_REDIRECTS`]; a redirect to
/// a different host is refused and surfaces as
/// [`TransportError::RedirectRejected`], so a misbehaving upstream cannot
/// bounce an authenticated request to an arbitrary origin.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with default configuration.
    ///
    /// Tuned for many short concurrent fetches: pooled keep-alive
    /// connections and TCP nodelay.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a transport with a custom per-request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.previous().len() > MAX_REDIRECTS {
                    return attempt.error("too many redirects");
                }
                let same_host = attempt
                    .previous()
                    .first()
                    .map(|origin| origin.host_str() == attempt.url().host_str())
                    .unwrap_or(true);
                if same_host {
                    attempt.follow()
                } else {
                    attempt.error("cross-origin redirect refused")
                }
            }))
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn map_send_error(url: &url::Url, error: reqwest::Error) -> TransportError {
        if error.is_redirect() {
            warn!(url = url.as_str(), error = %error, "redirect refused");
            TransportError::RedirectRejected(error.to_string())
        } else {
            warn!(
                url = url.as_str(),
                error = %error,
                is_connect = error.is_connect(),
                is_timeout = error.is_timeout(),
                "HTTP request failed"
            );
            TransportError::Connection(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(
        &self,
        request: TransportRequest,
        observer: &mut dyn TransferObserver,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let url = request.target;
        trace!(url = url.as_str(), method = ?request.method, "HTTP request starting");

        let builder = match &request.method {
            TransportMethod::Get => self.client.get(url.clone()),
            TransportMethod::PostForm(fields) => {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .map(|f| (f.name.as_str(), f.value.as_str()))
                    .collect();
                self.client.post(url.clone()).form(&pairs)
            }
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = builder.send() => result.map_err(|e| Self::map_send_error(&url, e))?,
        };

        let status = response.status();
        debug!(url = url.as_str(), status = status.as_u16(), "HTTP response received");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let total_bytes = response.content_length();

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                next = stream.next() => next,
            };

            match chunk {
                Some(Ok(chunk)) => {
                    body.extend_from_slice(&chunk);
                    observer.on_chunk(&chunk);
                    observer.on_progress(false, body.len() as u64, total_bytes);
                }
                Some(Err(error)) => {
                    warn!(url = url.as_str(), error = %error, "body stream failed");
                    return Err(TransportError::Body(error.to_string()));
                }
                None => break,
            }
        }

        trace!(url = url.as_str(), bytes = body.len(), "HTTP response body read");

        Ok(TransportResponse {
            body: body.freeze(),
            mime_type,
            http_status: status.as_u16(),
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}
