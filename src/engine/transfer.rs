//! The in-flight transfer handle.

use crate::request::{DataSink, Request};
use crate::transport::{
    TransferObserver, Transport, TransportError, TransportMethod, TransportRequest,
    TransportResponse,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio_util::sync::CancellationToken;

/// Handle to one in-flight network operation, bound to exactly one
/// request descriptor.
///
/// Created by the engine only after the cache decision selects "must
/// fetch" and the descriptor accepts attachment. Cancelling the handle
/// aborts the underlying operation cooperatively; the transfer itself
/// never calls the descriptor's terminal notifications, it only reports
/// the outcome back to the engine.
#[derive(Clone, Debug)]
pub struct Transfer {
    cancel_token: CancellationToken,
}

impl Transfer {
    pub(crate) fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
        }
    }

    /// Requests cancellation of the underlying operation. Idempotent,
    /// non-blocking, safe from any thread.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Drives the transport for the given request.
    ///
    /// Progress is streamed into the descriptor's progress notification;
    /// raw chunks go to the caller's data sink when one was supplied.
    pub(crate) async fn run(
        &self,
        transport: &dyn Transport,
        request: &Request,
    ) -> Result<TransportResponse, TransportError> {
        let Some(target) = request.target() else {
            // Malformed requests never reach the engine; guard anyway.
            return Err(TransportError::Connection("request has no target".into()));
        };

        let method = match request.post_fields() {
            Some(fields) => TransportMethod::PostForm(fields.to_vec()),
            None => TransportMethod::Get,
        };

        let mut observer = DescriptorObserver {
            request,
            sink: request.notify_data_stream_available(),
        };

        let result = transport
            .perform(
                TransportRequest {
                    target: target.clone(),
                    method,
                },
                &mut observer,
                &self.cancel_token,
            )
            .await;

        observer.finish(result.is_ok());
        result
    }
}

/// Bridges transport callbacks onto the descriptor and the optional
/// caller data sink.
struct DescriptorObserver<'a> {
    request: &'a Request,
    sink: Option<Box<dyn DataSink>>,
}

impl DescriptorObserver<'_> {
    /// Delivers the data-sink terminator. A panicking sink is reported
    /// and dropped, like any other callback.
    fn finish(&mut self, complete: bool) {
        if let Some(mut sink) = self.sink.take() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                if complete {
                    sink.on_complete();
                } else {
                    sink.on_interrupted();
                }
            }));
            if let Err(payload) = outcome {
                self.request
                    .report_callback_panic("data_sink_terminator", payload);
            }
        }
    }
}

impl TransferObserver for DescriptorObserver<'_> {
    fn on_progress(
        &mut self,
        authorization_in_progress: bool,
        bytes_read: u64,
        total_bytes: Option<u64>,
    ) {
        self.request
            .notify_progress(authorization_in_progress, bytes_read, total_bytes);
    }

    fn on_chunk(&mut self, chunk: &[u8]) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| sink.on_bytes(chunk))) {
            self.request.report_callback_panic("data_sink", payload);
            // Stop feeding a sink that panicked; the body itself is still
            // delivered through the terminal callback.
            self.sink = None;
        }
    }
}
