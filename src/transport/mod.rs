//! Transport boundary.
//!
//! A [`Transport`] performs one network operation on behalf of a transfer:
//! it receives the target and method, streams progress and raw chunks into
//! a [`TransferObserver`], honours cooperative cancellation, and returns
//! the complete response or an error. The engine holds it as
//! `Arc<dyn Transport>`, so the trait is object-safe via `async_trait`.
//!
//! [`HttpTransport`] is the production implementation on `reqwest`.

mod http;
mod types;

pub use http::HttpTransport;
pub use types::{
    TransferObserver, Transport, TransportError, TransportMethod, TransportRequest,
    TransportResponse,
};
