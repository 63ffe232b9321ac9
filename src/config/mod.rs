//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Provider
//! credentials are never read from the file: they come from the
//! environment (see [`credentials`]). Every provider works with its
//! built-in defaults, so the `[providers]` section is optional.

pub mod credentials;
pub mod loader;
pub mod providers;

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::ProviderId;

pub use credentials::Credentials;
pub use providers::{ProviderOverrides, ProviderSettings};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// HTTP listener and logging.
  #[serde(default)]
  pub server: ServerConfig,
  /// Outbound HTTP client.
  #[serde(default)]
  pub http: HttpConfig,
  /// Per-provider overrides keyed by provider id (`ercot`, `pjm`, ...).
  #[serde(default)]
  pub providers: HashMap<String, ProviderOverrides>,
}

impl AppConfig {
  /// Resolved settings for every provider, defaults merged with overrides.
  pub fn provider_settings(&self) -> Vec<ProviderSettings> {
    ProviderId::ALL
      .into_iter()
      .map(|id| ProviderSettings::resolve(id, self.overrides_for(id)))
      .collect()
  }

  fn overrides_for(&self, id: ProviderId) -> Option<&ProviderOverrides> {
    self
      .providers
      .iter()
      .find(|(key, _)| key.parse::<ProviderId>().is_ok_and(|k| k == id))
      .map(|(_, overrides)| overrides)
  }

  /// Override table names that match no provider.
  pub fn unknown_provider_keys(&self) -> Vec<&str> {
    self
      .providers
      .keys()
      .filter(|key| key.parse::<ProviderId>().is_err())
      .map(String::as_str)
      .collect()
  }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Bind address for the aggregation endpoint.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      log_level: default_log_level(),
    }
  }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  /// User-Agent sent to every upstream API.
  #[serde(default = "default_user_agent")]
  pub user_agent: String,
  /// TCP connect timeout in milliseconds.
  #[serde(default = "default_connect_timeout")]
  pub connect_timeout_ms: u64,
  /// Upper bound on any single outbound request, in milliseconds.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_ms: u64,
  /// Idle connections kept per upstream host.
  #[serde(default = "default_pool_idle")]
  pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      user_agent: default_user_agent(),
      connect_timeout_ms: default_connect_timeout(),
      request_timeout_ms: default_request_timeout(),
      pool_max_idle_per_host: default_pool_idle(),
    }
  }
}

// Default value functions for serde

fn default_bind_address() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_user_agent() -> String {
  concat!("grid-market-aggregator/", env!("CARGO_PKG_VERSION")).to_string()
}

const fn default_connect_timeout() -> u64 {
  5_000
}

const fn default_request_timeout() -> u64 {
  30_000
}

const fn default_pool_idle() -> usize {
  4
}
