//! HTTP Entrypoint - Aggregation, Diagnostics, Health, Metrics
//!
//! Serves the aggregation endpoint via axum 0.7 on both `/` and
//! `/api/grid-data`. `OPTIONS` answers 200 with an empty body and
//! permissive CORS headers; `?test=<provider>` switches a GET/POST to
//! the connectivity probe instead of the aggregation.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::adapters::metrics::MetricsRegistry;
use crate::usecases::diagnostics::diagnose;
use crate::usecases::{FetchOrchestrator, ResponseAssembler};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<FetchOrchestrator>,
  pub assembler: Arc<ResponseAssembler>,
  pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
  pub fn new(orchestrator: Arc<FetchOrchestrator>, metrics: Arc<MetricsRegistry>) -> Self {
    Self {
      orchestrator,
      assembler: Arc::new(ResponseAssembler::new(Arc::clone(&metrics))),
      metrics,
    }
  }
}

/// Query parameters accepted by the aggregation endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct InvocationQuery {
  /// Provider id to probe instead of aggregating.
  pub test: Option<String>,
}

fn invocation_route() -> MethodRouter<AppState> {
  get(invoke).post(invoke).options(preflight)
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", invocation_route())
    .route("/api/grid-data", invocation_route())
    .route("/live", get(liveness))
    .route("/metrics", get(metrics))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn invoke(State(state): State<AppState>, Query(query): Query<InvocationQuery>) -> Response {
  if let Some(test) = query.test.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
    let report = diagnose(&state.orchestrator, test).await;
    return (StatusCode::OK, Json(report)).into_response();
  }

  let outcome = state.orchestrator.run_all().await;
  state.assembler.assemble(outcome).into_response()
}

async fn preflight() -> StatusCode {
  StatusCode::OK
}

async fn liveness() -> impl IntoResponse {
  (StatusCode::OK, "OK")
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
  (
    [(CONTENT_TYPE, "text/plain; version=0.0.4")],
    state.metrics.render(),
  )
}

/// Axum HTTP server for the aggregation service.
pub struct WebServer {
  state: AppState,
  bind_address: String,
}

impl WebServer {
  pub fn new(state: AppState, bind_address: impl Into<String>) -> Self {
    Self {
      state,
      bind_address: bind_address.into(),
    }
  }

  /// Serve until the shutdown signal fires.
  #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
  pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
    let app = router(self.state);
    let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

    info!("HTTP server started");

    axum::serve(listener, app)
      .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
      })
      .await?;

    info!("HTTP server stopped");
    Ok(())
  }
}
