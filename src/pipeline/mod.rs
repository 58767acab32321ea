//! Result pipelines.
//!
//! A pipeline is a callback set that post-processes the raw outcome of a
//! request before re-dispatching it to the original caller. Pipelines are
//! built entirely on the public callback contract; they need no engine
//! internals, which keeps the contract composable.

mod json;

pub use json::{JsonListener, JsonPipeline};
