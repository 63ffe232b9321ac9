//! Fetch Orchestrator - Concurrent Settle-All Provider Fan-out
//!
//! Runs one task per registered provider, each under its own deadline,
//! and waits for every task to reach a terminal state. A provider task
//! can only ever contribute absent fields to the aggregate: missing
//! credentials, a rejected token exchange, a timeout and a panic all
//! settle into an empty `ProviderResult` for that provider alone.
//!
//! Task lifecycle:
//! `Pending → Fetching → {Complete | Partial | TimedOut | AuthFailed | Panicked}`
//!
//! A timed-out task is abandoned rather than cancelled: the spawned
//! fetch keeps running in the background and its result is dropped.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::adapters::metrics::MetricsRegistry;
use crate::config::{Credentials, ProviderSettings};
use crate::domain::{AggregateResult, ProviderId, ProviderResult};
use crate::error::{AuthError, OrchestrationError};
use crate::ports::{FetchContext, ProviderAdapter};

use super::token_cache::TokenCache;

/// Terminal state of one provider task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
  /// Credentials absent; no network call was made.
  NotConfigured,
  /// Every supported metric was produced.
  Complete,
  /// Some, possibly none, of the supported metrics were produced.
  Partial,
  /// Deadline expired before the adapter finished.
  TimedOut,
  /// Bearer token could not be obtained.
  AuthFailed,
  /// The adapter panicked.
  Panicked,
}

impl TaskOutcome {
  /// Metric label.
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::NotConfigured => "not_configured",
      Self::Complete => "complete",
      Self::Partial => "partial",
      Self::TimedOut => "timed_out",
      Self::AuthFailed => "auth_failed",
      Self::Panicked => "panicked",
    }
  }
}

/// One provider wired for orchestration.
#[derive(Clone)]
pub struct ProviderRegistration {
  pub adapter: Arc<dyn ProviderAdapter>,
  pub settings: Arc<ProviderSettings>,
  /// `None` when the provider's credentials are not configured.
  pub credentials: Option<Credentials>,
  /// Present for password-grant providers.
  pub token_cache: Option<Arc<TokenCache>>,
}

impl ProviderRegistration {
  /// Register `adapter` without a token cache.
  pub fn new(
    adapter: Arc<dyn ProviderAdapter>,
    settings: ProviderSettings,
    credentials: Option<Credentials>,
  ) -> Self {
    Self {
      adapter,
      settings: Arc::new(settings),
      credentials,
      token_cache: None,
    }
  }

  /// Attach the token cache used to obtain bearer tokens.
  #[must_use]
  pub fn with_token_cache(mut self, cache: Arc<TokenCache>) -> Self {
    self.token_cache = Some(cache);
    self
  }

  /// Provider identity.
  pub fn id(&self) -> ProviderId {
    self.adapter.id()
  }
}

/// Concurrent fan-out over every registered provider.
pub struct FetchOrchestrator {
  http: reqwest::Client,
  providers: Vec<ProviderRegistration>,
  metrics: Arc<MetricsRegistry>,
}

impl FetchOrchestrator {
  /// Create an orchestrator over `providers`.
  pub fn new(
    http: reqwest::Client,
    providers: Vec<ProviderRegistration>,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    Self {
      http,
      providers,
      metrics,
    }
  }

  /// Registered providers in registration order.
  pub fn providers(&self) -> &[ProviderRegistration] {
    &self.providers
  }

  /// Look up a registration by id.
  pub fn provider(&self, id: ProviderId) -> Option<&ProviderRegistration> {
    self.providers.iter().find(|p| p.id() == id)
  }

  /// Shared outbound HTTP client.
  pub fn http(&self) -> &reqwest::Client {
    &self.http
  }

  /// Reject task sets that cannot be orchestrated.
  fn validate(&self) -> Result<(), OrchestrationError> {
    if self.providers.is_empty() {
      return Err(OrchestrationError::NoProviders);
    }
    let mut seen = HashSet::new();
    for registration in &self.providers {
      if !seen.insert(registration.id()) {
        return Err(OrchestrationError::DuplicateProvider(registration.id()));
      }
    }
    Ok(())
  }

  /// Run every provider task and collect the aggregate.
  ///
  /// # Errors
  /// Fails only when the task set itself is invalid; no provider
  /// outcome can make this return an error.
  #[instrument(skip(self), name = "aggregate", fields(invocation_id = %Uuid::new_v4()))]
  pub async fn run_all(&self) -> Result<AggregateResult, OrchestrationError> {
    self.validate()?;

    let started = Instant::now();
    let tasks = self.providers.iter().map(|registration| self.run_provider(registration));
    let settled = join_all(tasks).await;

    let mut providers = BTreeMap::new();
    let mut populated = 0usize;
    for (id, result) in settled {
      if !result.is_empty() {
        populated += 1;
      }
      providers.insert(id, result);
    }

    info!(
      providers = providers.len(),
      populated,
      elapsed_ms = started.elapsed().as_millis(),
      "Aggregation settled"
    );

    Ok(AggregateResult::succeeded(providers))
  }

  /// Drive one provider to a terminal state.
  async fn run_provider(&self, registration: &ProviderRegistration) -> (ProviderId, ProviderResult) {
    let id = registration.id();
    let span = info_span!("provider", provider = %id);
    let started = Instant::now();

    let (outcome, result) = self.settle(registration).instrument(span).await;
    self.metrics.record_provider(id, outcome.as_str(), started.elapsed());

    (id, result)
  }

  async fn settle(&self, registration: &ProviderRegistration) -> (TaskOutcome, ProviderResult) {
    let Some(credentials) = registration.credentials.clone() else {
      debug!("Credentials not configured, skipping provider");
      return (TaskOutcome::NotConfigured, ProviderResult::default());
    };

    let adapter = Arc::clone(&registration.adapter);
    let token_cache = registration.token_cache.clone();
    let ctx_settings = Arc::clone(&registration.settings);
    let http = self.http.clone();
    let deadline = registration.settings.timeout;

    let work = async move {
      let bearer = match token_cache {
        Some(cache) => Some(cache.get_token().await?),
        None => None,
      };
      let ctx = FetchContext {
        http,
        settings: ctx_settings,
        credentials,
        bearer,
        now: Utc::now(),
      };
      Ok::<ProviderResult, AuthError>(adapter.fetch(&ctx).await)
    }
    .in_current_span();

    match tokio::time::timeout(deadline, tokio::spawn(work)).await {
      Err(_) => {
        warn!(deadline_ms = deadline.as_millis(), "Provider deadline exceeded, result abandoned");
        (TaskOutcome::TimedOut, ProviderResult::default())
      }
      Ok(Err(join_error)) => {
        error!(error = %join_error, "Provider task panicked");
        (TaskOutcome::Panicked, ProviderResult::default())
      }
      Ok(Ok(Err(auth_error))) => {
        warn!(error = %auth_error, "Token exchange failed, skipping provider");
        (TaskOutcome::AuthFailed, ProviderResult::default())
      }
      Ok(Ok(Ok(result))) => {
        let supported = registration.adapter.capabilities().count();
        let produced = result.metric_count();
        let outcome = if produced >= supported {
          TaskOutcome::Complete
        } else {
          TaskOutcome::Partial
        };
        debug!(produced, supported, "Provider settled");
        (outcome, result)
      }
    }
  }
}
