//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (upstream REST APIs, OAuth token endpoint,
//! HTTP server, Prometheus). Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `auth`: OAuth password-grant credential exchange
//! - `http`: Shared upstream client, auth headers, JSON fetch
//! - `metrics`: Prometheus metrics registry
//! - `providers`: One adapter per grid operator
//! - `web`: axum entrypoint (aggregation, diagnostics, health, metrics)

pub mod auth;
pub mod http;
pub mod metrics;
pub mod providers;
pub mod web;
