//! HTTP boundary for the ytcut job engine.
//!
//! Exposed as a library so integration tests can drive the router in-process.

pub mod api;
pub mod metrics;
pub mod state;
