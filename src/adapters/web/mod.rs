//! Web Adapter
//!
//! axum router and server for the aggregation entrypoint.

pub mod server;

pub use server::{AppState, WebServer, router};
