//! Connectivity Diagnostics - Per-endpoint Upstream Probe
//!
//! Hits each endpoint a provider adapter declares, one at a time, and
//! classifies the answer. Requests carry the provider's static
//! credentials (API key, basic auth, subscription key) but never a
//! bearer token, so an OAuth-protected endpoint reports
//! `requires_oauth` instead of spending a credential exchange.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::adapters::http::{apply_static_auth, join_url};
use crate::domain::ProviderId;

use super::orchestrator::{FetchOrchestrator, ProviderRegistration};

/// Longest body preview included in a report, in characters.
pub const PREVIEW_CHARS: usize = 300;

/// What an endpoint's answer suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
  /// 2xx.
  Valid,
  /// 401 or 403.
  RequiresOauth,
  /// 404.
  NotFound,
  /// Any other status.
  Unexpected,
  /// No response at all.
  Unreachable,
}

impl Interpretation {
  pub const fn from_status(status: u16) -> Self {
    match status {
      200..=299 => Self::Valid,
      401 | 403 => Self::RequiresOauth,
      404 => Self::NotFound,
      _ => Self::Unexpected,
    }
  }
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointDiagnostic {
  pub endpoint: &'static str,
  pub url: String,
  pub status: Option<u16>,
  pub preview: String,
  pub interpretation: Interpretation,
}

/// Result of probing every endpoint of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
  pub provider: ProviderId,
  pub credentials_configured: bool,
  pub timestamp: DateTime<Utc>,
  pub endpoints: Vec<EndpointDiagnostic>,
}

/// First [`PREVIEW_CHARS`] characters of `body`.
pub fn preview(body: &str) -> String {
  body.chars().take(PREVIEW_CHARS).collect()
}

/// Probe a provider's endpoints sequentially.
#[instrument(skip(http, registration), fields(provider = %registration.id()))]
pub async fn probe_provider(
  http: &reqwest::Client,
  registration: &ProviderRegistration,
  now: DateTime<Utc>,
) -> DiagnosticReport {
  let settings = &registration.settings;
  let mut endpoints = Vec::new();

  for probe in registration.adapter.probe_endpoints(now) {
    let url = join_url(&settings.base_url, &probe.path);
    let mut request = http.get(&url).timeout(settings.timeout);
    if let Some(credentials) = &registration.credentials {
      request = apply_static_auth(request, credentials);
    }

    let diagnostic = match request.send().await {
      Ok(response) => {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        EndpointDiagnostic {
          endpoint: probe.name,
          url,
          status: Some(status),
          preview: preview(&body),
          interpretation: Interpretation::from_status(status),
        }
      }
      Err(e) => EndpointDiagnostic {
        endpoint: probe.name,
        url,
        status: None,
        preview: preview(&e.to_string()),
        interpretation: Interpretation::Unreachable,
      },
    };
    info!(
      endpoint = diagnostic.endpoint,
      status = ?diagnostic.status,
      interpretation = ?diagnostic.interpretation,
      "Endpoint probed"
    );
    endpoints.push(diagnostic);
  }

  DiagnosticReport {
    provider: registration.id(),
    credentials_configured: registration.credentials.is_some(),
    timestamp: now,
    endpoints,
  }
}

/// Run the probe named by a `test` query value.
///
/// Unknown or unregistered ids produce an error body listing the
/// available ids rather than a failure status.
pub async fn diagnose(orchestrator: &FetchOrchestrator, test_id: &str) -> Value {
  let known: Vec<&str> = orchestrator
    .providers()
    .iter()
    .map(|p| p.id().as_str())
    .collect();

  let registration = test_id
    .parse::<ProviderId>()
    .ok()
    .and_then(|id| orchestrator.provider(id));

  let Some(registration) = registration else {
    return json!({
      "success": false,
      "error": format!("unknown diagnostic '{test_id}'"),
      "available": known,
    });
  };

  let report = probe_provider(orchestrator.http(), registration, Utc::now()).await;
  json!({ "success": true, "diagnostics": report })
}
