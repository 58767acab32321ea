//! Queue engine.
//!
//! The engine admits request descriptors, holds one priority-ordered queue
//! per [`Category`], and runs up to a per-category concurrency ceiling of
//! executions at a time. It is the single place where the cache-or-network
//! decision is evaluated, where a [`Transfer`] is created, and where cache
//! write-back happens.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      QueueEngine                         │
//! │  submit() -> per-category lane                           │
//! ├──────────────┬──────────────┬──────────────┬─────────────┤
//! │ PrimaryApi   │ SecondaryApi │ Immediate    │ BulkPrecache│
//! │ queue+sema   │ queue+sema   │ queue+sema   │ queue+sema  │
//! └──────┬───────┴──────┬───────┴──────┬───────┴──────┬──────┘
//!        │   scheduler loop per lane: pop highest priority    │
//!        ▼              ▼              ▼              ▼
//!   cache decision -> serve from cache | Transfer over network
//! ```
//!
//! Lanes are fully independent: a burst of bulk precache work can never
//! starve interactive requests, and no ordering holds across lanes.

mod category;
mod config;
mod core;
mod events;
mod queue;
mod transfer;

pub use category::Category;
pub use config::EngineConfig;
pub use core::{QueueEngine, SubmitError};
pub use events::{EngineEvent, EventSink, NullEventSink, TracingEventSink};
pub use transfer::Transfer;
