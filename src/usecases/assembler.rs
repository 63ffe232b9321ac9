//! Response Assembler - Aggregate to HTTP Response
//!
//! Serializes the aggregate for the wire. When full serialization
//! fails the consumer still gets a 200 with `success: true`: each
//! provider is re-serialized on its own, degrading to its pricing
//! sub-object and finally to omission. Only a setup failure, before
//! any provider ran, yields the 503 path.

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::AggregateResult;
use crate::error::OrchestrationError;

/// Status and JSON body ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledResponse {
  pub status: StatusCode,
  pub body: Value,
}

impl IntoResponse for AssembledResponse {
  fn into_response(self) -> Response {
    (self.status, Json(self.body)).into_response()
  }
}

/// Turns orchestration outcomes into HTTP responses.
pub struct ResponseAssembler {
  metrics: Arc<MetricsRegistry>,
}

impl ResponseAssembler {
  pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
    Self { metrics }
  }

  /// Build the response for one invocation.
  pub fn assemble(&self, outcome: Result<AggregateResult, OrchestrationError>) -> AssembledResponse {
    match outcome {
      Ok(aggregate) => {
        self.metrics.record_invocation("ok");
        AssembledResponse {
          status: StatusCode::OK,
          body: self.serialize(&aggregate),
        }
      }
      Err(e) => {
        error!(error = %e, "Aggregation could not start");
        self.metrics.record_invocation("unavailable");
        AssembledResponse {
          status: StatusCode::SERVICE_UNAVAILABLE,
          body: self.serialize(&AggregateResult::failed(e.to_string())),
        }
      }
    }
  }

  fn serialize(&self, aggregate: &AggregateResult) -> Value {
    match serde_json::to_value(aggregate) {
      Ok(body) => body,
      Err(e) => {
        warn!(error = %e, "Full payload serialization failed, serving reduced payload");
        self.metrics.serialization_fallbacks.inc();
        reduced_payload(aggregate)
      }
    }
  }
}

/// Best-effort payload: each provider's full result, else its pricing
/// alone, else nothing. Always `success: true`.
pub fn reduced_payload(aggregate: &AggregateResult) -> Value {
  let mut body = Map::new();
  body.insert("success".to_string(), Value::Bool(true));

  for (id, result) in &aggregate.providers {
    if let Ok(full) = serde_json::to_value(result) {
      body.insert(id.to_string(), full);
      continue;
    }

    let pricing = result
      .pricing
      .as_ref()
      .and_then(|p| serde_json::to_value(p).ok());
    match pricing {
      Some(pricing) => {
        debug!(provider = %id, "Provider reduced to pricing");
        body.insert(id.to_string(), json!({ "pricing": pricing }));
      }
      None => debug!(provider = %id, "Provider omitted from reduced payload"),
    }
  }

  Value::Object(body)
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use chrono::Utc;

  use super::*;
  use crate::domain::{LoadSnapshot, PricingSnapshot, ProviderId, ProviderResult};

  fn assembler() -> ResponseAssembler {
    ResponseAssembler::new(Arc::new(MetricsRegistry::new().unwrap()))
  }

  fn priced(id: ProviderId, price: f64) -> ProviderResult {
    ProviderResult {
      pricing: Some(PricingSnapshot::from_window(id, price, &[], 40.0, Utc::now())),
      ..ProviderResult::default()
    }
  }

  #[test]
  fn test_full_payload_when_serializable() {
    let mut providers = BTreeMap::new();
    providers.insert(ProviderId::Spp, priced(ProviderId::Spp, 31.0));
    let response = assembler().assemble(Ok(AggregateResult::succeeded(providers)));

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], json!(true));
    assert_eq!(response.body["spp"]["pricing"]["current_price"], json!(31.0));
  }

  #[test]
  fn test_non_finite_load_degrades_to_pricing() {
    let mut broken = priced(ProviderId::Ercot, 42.17);
    broken.load = Some(LoadSnapshot {
      current_demand_mw: f64::NAN,
      peak_forecast_mw: 50_000.0,
      reserve_margin_pct: 13.75,
      timestamp: Utc::now(),
      source: "ercot_api_load".into(),
    });

    let mut providers = BTreeMap::new();
    providers.insert(ProviderId::Ercot, broken);
    providers.insert(ProviderId::Pjm, priced(ProviderId::Pjm, 28.5));

    let assembler = assembler();
    let response = assembler.assemble(Ok(AggregateResult::succeeded(providers)));

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], json!(true));
    assert_eq!(response.body["ercot"]["pricing"]["current_price"], json!(42.17));
    assert!(response.body["ercot"].get("loadData").is_none());
    assert_eq!(response.body["pjm"]["pricing"]["current_price"], json!(28.5));
    assert_eq!(assembler.metrics.serialization_fallbacks.get(), 1);
  }

  #[test]
  fn test_provider_without_serializable_pricing_is_omitted() {
    let mut broken = ProviderResult::default();
    broken.pricing = Some(PricingSnapshot::from_window(
      ProviderId::Miso,
      f64::INFINITY,
      &[],
      35.0,
      Utc::now(),
    ));
    let mut providers = BTreeMap::new();
    providers.insert(ProviderId::Miso, broken);

    let body = reduced_payload(&AggregateResult::succeeded(providers));
    assert_eq!(body, json!({ "success": true }));
  }

  #[test]
  fn test_setup_failure_is_503() {
    let response = assembler().assemble(Err(OrchestrationError::NoProviders));
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["success"], json!(false));
    assert_eq!(response.body["error"], json!("no providers registered"));
  }
}
