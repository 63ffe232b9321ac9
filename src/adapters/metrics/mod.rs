//! Metrics Adapters
//!
//! Prometheus registry for provider fetch outcomes and invocation
//! counts. Exposed on `/metrics` by the web adapter.

pub mod prometheus;

pub use prometheus::MetricsRegistry;
