//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use super::providers::ProviderSettings;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    bind = %config.server.bind_address,
    overrides = config.providers.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A usable bind address and HTTP client settings
/// - Positive deadlines, baselines and retry attempts per provider
/// - Well-ordered plausibility bounds
/// - Non-empty upstream URLs
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.server.bind_address.is_empty(),
    "server.bind_address must not be empty"
  );
  anyhow::ensure!(
    config.http.connect_timeout_ms > 0,
    "http.connect_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.http.request_timeout_ms > 0,
    "http.request_timeout_ms must be positive"
  );

  let unknown = config.unknown_provider_keys();
  anyhow::ensure!(
    unknown.is_empty(),
    "Unknown provider table(s) in config: {}",
    unknown.join(", ")
  );

  for settings in config.provider_settings() {
    validate_provider(&settings)?;
  }

  Ok(())
}

fn validate_provider(s: &ProviderSettings) -> Result<()> {
  let id = s.id;

  anyhow::ensure!(!s.timeout.is_zero(), "{id}: timeout must be positive");
  anyhow::ensure!(!s.base_url.is_empty(), "{id}: base_url must not be empty");
  anyhow::ensure!(
    s.token_url.as_ref().is_none_or(|u| !u.is_empty()),
    "{id}: token_url must not be empty when set"
  );
  anyhow::ensure!(
    s.baseline_price.is_finite() && s.baseline_price > 0.0,
    "{id}: baseline_price must be positive, got {}",
    s.baseline_price
  );
  anyhow::ensure!(
    s.retry_attempts >= 1,
    "{id}: retry_attempts must be at least 1"
  );

  for (name, bounds) in [
    ("price_bounds", s.price_bounds),
    ("load_bounds", s.load_bounds),
    ("generation_bounds", s.generation_bounds),
  ] {
    anyhow::ensure!(
      bounds.min.is_finite() && bounds.max.is_finite() && bounds.min < bounds.max,
      "{id}: {name} must satisfy min < max, got [{}, {}]",
      bounds.min,
      bounds.max
    );
  }

  Ok(())
}
