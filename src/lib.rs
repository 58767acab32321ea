//! Fetchlane - prioritized download lanes with cache coordination
//!
//! This library coordinates cached downloads: a caller describes one fetch
//! (target URL, requester, priority, download strategy, scheduling category,
//! callbacks), submits it to the [`engine::QueueEngine`], and receives exactly
//! one terminal outcome. The engine decides whether to serve from the cache
//! store or fetch over the transport, schedules work through independent
//! per-category lanes with their own concurrency ceilings, and stays safely
//! cancelable at every point in flight.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use fetchlane::cache::MemoryCacheStore;
//! use fetchlane::engine::{Category, EngineConfig, QueueEngine};
//! use fetchlane::request::{Request, RequesterId};
//! use fetchlane::strategy::DownloadIfNotCached;
//! use fetchlane::transport::HttpTransport;
//!
//! let engine = QueueEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(MemoryCacheStore::new()),
//!     Arc::new(HttpTransport::new()?),
//! );
//!
//! let request = Request::builder(
//!     Request::parse_target("https://example.com/listing.json"),
//!     RequesterId::anonymous(),
//!     Category::PrimaryApi,
//!     Box::new(my_callbacks),
//! )
//! .strategy(Arc::new(DownloadIfNotCached))
//! .build();
//!
//! engine.submit(Arc::clone(&request))?;
//! // ... later, from any thread:
//! request.cancel();
//! ```

pub mod cache;
pub mod engine;
pub mod error_sink;
pub mod failure;
pub mod logging;
pub mod pipeline;
pub mod priority;
pub mod request;
pub mod strategy;
pub mod transport;

/// Version of the fetchlane library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
