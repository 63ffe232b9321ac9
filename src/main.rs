//! Grid Market Aggregator - Entry Point
//!
//! Loads configuration and credentials, wires the provider adapters
//! into the fetch orchestrator, and serves the aggregation endpoint
//! until SIGINT.
//!
//! Wiring sequence:
//! 1. Load .env (if present) and config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create Prometheus registry
//! 4. Create the shared upstream HTTP client
//! 5. Register providers (credentials from env, token cache for OAuth)
//! 6. Spawn the axum server (aggregation, diagnostics, /live, /metrics)
//! 7. Wait for SIGINT → graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use grid_market_aggregator::adapters::auth::RopcExchange;
use grid_market_aggregator::adapters::http::build_client;
use grid_market_aggregator::adapters::metrics::MetricsRegistry;
use grid_market_aggregator::adapters::providers::adapter_for;
use grid_market_aggregator::adapters::web::{AppState, WebServer};
use grid_market_aggregator::config::{self, AppConfig, Credentials};
use grid_market_aggregator::usecases::{
  FetchOrchestrator, ProviderRegistration, TOKEN_EXCHANGE_TIMEOUT, TokenCache,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
  // ── 1. Load .env and configuration ──────────────────────
  let dotenv = dotenvy::dotenv();
  let (config, config_source) = load_configuration()?;

  // ── 2. Initialize structured JSON logging ───────────────
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
    )
    .json()
    .init();

  if let Ok(path) = dotenv {
    debug!(path = %path.display(), "Loaded .env");
  }
  info!(
    version = env!("CARGO_PKG_VERSION"),
    config = %config_source,
    bind = %config.server.bind_address,
    "Starting grid market aggregator"
  );

  // ── 3. Metrics registry ─────────────────────────────────
  let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);

  // ── 4. Shared upstream HTTP client ──────────────────────
  let http = build_client(&config.http)?;

  // ── 5. Register providers ───────────────────────────────
  let providers = register_providers(&config, &http);
  info!(providers = providers.len(), "Providers registered");

  let orchestrator = Arc::new(FetchOrchestrator::new(http, providers, Arc::clone(&metrics)));
  let state = AppState::new(orchestrator, metrics);

  // ── 6. Spawn HTTP server ────────────────────────────────
  let (shutdown_tx, _) = broadcast::channel::<()>(1);
  let server = WebServer::new(state, config.server.bind_address.clone());
  let server_shutdown = shutdown_tx.subscribe();
  let server_handle = tokio::spawn(async move {
    if let Err(e) = server.run(server_shutdown).await {
      error!(error = %e, "HTTP server failed");
    }
  });

  // ── 7. Wait for SIGINT ──────────────────────────────────
  signal::ctrl_c()
    .await
    .context("Failed to listen for SIGINT")?;
  info!("SIGINT received, initiating graceful shutdown");

  let _ = shutdown_tx.send(());
  let _ = tokio::time::timeout(Duration::from_secs(10), server_handle).await;

  info!("Shutdown complete");
  Ok(())
}

/// Load `CONFIG_PATH`, or fall back to built-in defaults when the
/// default path does not exist.
fn load_configuration() -> Result<(AppConfig, String)> {
  match std::env::var("CONFIG_PATH") {
    Ok(path) => {
      let config = config::loader::load_config(&path).context("Failed to load configuration")?;
      Ok((config, path))
    }
    Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
      let config = config::loader::load_config(DEFAULT_CONFIG_PATH)
        .context("Failed to load configuration")?;
      Ok((config, DEFAULT_CONFIG_PATH.to_string()))
    }
    Err(_) => Ok((AppConfig::default(), "built-in defaults".to_string())),
  }
}

/// Build one registration per enabled provider.
fn register_providers(config: &AppConfig, http: &reqwest::Client) -> Vec<ProviderRegistration> {
  let mut registrations = Vec::new();

  for settings in config.provider_settings() {
    let id = settings.id;
    if !settings.enabled {
      info!(provider = %id, "Provider disabled in configuration");
      continue;
    }

    let credentials = Credentials::from_env(id);
    let token_url = settings.token_url.clone();
    let mut registration = ProviderRegistration::new(adapter_for(id), settings, credentials.clone());

    if let (
      Some(Credentials::PasswordGrant {
        username, password, ..
      }),
      Some(token_url),
    ) = (&credentials, token_url)
    {
      // Never longer than the provider deadline.
      let exchange_timeout = registration.settings.timeout.min(TOKEN_EXCHANGE_TIMEOUT);
      let exchange = RopcExchange::new(http.clone(), token_url, username.as_str(), password.as_str())
        .with_timeout(exchange_timeout);
      let cache = TokenCache::new(Arc::new(exchange)).with_exchange_timeout(exchange_timeout);
      registration = registration.with_token_cache(Arc::new(cache));
    }

    info!(
      provider = %id,
      configured = credentials.is_some(),
      oauth = registration.token_cache.is_some(),
      "Provider wired"
    );
    registrations.push(registration);
  }

  registrations
}
