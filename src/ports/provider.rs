//! Provider Adapter Port - Grid Operator Telemetry Interface
//!
//! Defines the trait every grid-operator adapter implements. An
//! adapter owns one upstream API shape: it builds the requests, parses
//! the payloads, and normalizes them into the canonical schema.
//!
//! Key design decisions:
//! - Each metric (pricing, load, generation mix) is independently optional
//! - A failure on one metric never blocks the others
//! - Sub-requests run sequentially with the provider's rate-limit delay

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{Credentials, ProviderSettings};
use crate::domain::{GenerationMix, LoadSnapshot, PricingSnapshot, ProviderId, ProviderResult};
use crate::error::FetchError;

/// Which metrics an adapter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
  pub pricing: bool,
  pub load: bool,
  pub generation_mix: bool,
}

impl Capabilities {
  /// Pricing, load and generation mix.
  pub const ALL: Self = Self {
    pricing: true,
    load: true,
    generation_mix: true,
  };

  /// Number of metrics supported.
  pub fn count(self) -> usize {
    usize::from(self.pricing) + usize::from(self.load) + usize::from(self.generation_mix)
  }
}

/// Everything an adapter needs for one fetch.
///
/// Built fresh by the orchestrator for each provider task.
#[derive(Debug, Clone)]
pub struct FetchContext {
  /// Shared outbound HTTP client.
  pub http: reqwest::Client,
  /// Resolved provider settings (URLs, bounds, delays).
  pub settings: Arc<ProviderSettings>,
  /// Resolved credentials.
  pub credentials: Credentials,
  /// Bearer token from the token cache, for password-grant providers.
  pub bearer: Option<String>,
  /// Invocation time; the query window is anchored here.
  pub now: DateTime<Utc>,
}

impl FetchContext {
  /// Wait out the provider's inter-request delay.
  pub async fn pace(&self) {
    let delay = self.settings.inter_request_delay;
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
  }
}

/// A named upstream endpoint exercised by the diagnostic probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEndpoint {
  /// Short endpoint name shown in the diagnostic report.
  pub name: &'static str,
  /// Path (with query string) relative to the provider's base URL.
  pub path: String,
}

/// Trait for grid-operator telemetry providers.
///
/// Implementors override the metric methods their upstream supports
/// and report them through [`ProviderAdapter::capabilities`]. The
/// default [`ProviderAdapter::fetch`] runs the supported metrics in
/// order with [`FetchContext::pace`] between them and converts every
/// per-metric error into an absent field.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
  /// Provider identity.
  fn id(&self) -> ProviderId;

  /// Metrics this adapter can produce.
  fn capabilities(&self) -> Capabilities;

  /// Fetch and normalize the current price.
  async fn fetch_pricing(&self, _ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    Ok(None)
  }

  /// Fetch and normalize system demand.
  async fn fetch_load(&self, _ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    Ok(None)
  }

  /// Fetch and normalize the generation mix.
  async fn fetch_generation_mix(
    &self,
    _ctx: &FetchContext,
  ) -> Result<Option<GenerationMix>, FetchError> {
    Ok(None)
  }

  /// Fetch every supported metric.
  async fn fetch(&self, ctx: &FetchContext) -> ProviderResult {
    let caps = self.capabilities();
    let id = self.id();
    let mut result = ProviderResult::default();
    let mut issued = false;

    if caps.pricing {
      result.pricing = settle_metric(id, "pricing", self.fetch_pricing(ctx).await);
      issued = true;
    }
    if caps.load {
      if issued {
        ctx.pace().await;
      }
      result.load = settle_metric(id, "load", self.fetch_load(ctx).await);
      issued = true;
    }
    if caps.generation_mix {
      if issued {
        ctx.pace().await;
      }
      result.generation_mix =
        settle_metric(id, "generation_mix", self.fetch_generation_mix(ctx).await);
    }

    result
  }

  /// Endpoints the diagnostic probe should exercise.
  fn probe_endpoints(&self, _now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    Vec::new()
  }
}

/// Collapse a per-metric outcome into an optional field, logging misses.
pub fn settle_metric<T>(
  provider: ProviderId,
  metric: &'static str,
  outcome: Result<Option<T>, FetchError>,
) -> Option<T> {
  match outcome {
    Ok(Some(value)) => Some(value),
    Ok(None) => {
      debug!(%provider, metric, "No plausible value in upstream payload");
      None
    }
    Err(e) => {
      warn!(%provider, metric, error = %e, "Metric fetch failed");
      None
    }
  }
}
