//! Observability for the snapshot engine
//!
//! Structured `tracing` events through [`TracingLogger`], optionally counted
//! in a Prometheus [`Metrics`] registry.

pub mod logging;
pub mod metrics;

pub use logging::TracingLogger;
pub use metrics::Metrics;
