//! Integration Tests - Orchestration, Assembly, and the HTTP Surface
//!
//! Drives the fetch orchestrator, response assembler and axum router
//! with fake provider adapters. No network: every adapter here answers
//! from memory, sleeps, or panics on purpose.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use mockall::mock;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

use grid_market_aggregator::adapters::metrics::MetricsRegistry;
use grid_market_aggregator::adapters::web::{AppState, router};
use grid_market_aggregator::config::{Credentials, ProviderSettings};
use grid_market_aggregator::domain::{
    LoadObservation, LoadSnapshot, PricingSnapshot, ProviderId, ProviderResult,
};
use grid_market_aggregator::error::{FetchError, OrchestrationError};
use grid_market_aggregator::ports::{Capabilities, FetchContext, ProviderAdapter};
use grid_market_aggregator::usecases::{FetchOrchestrator, ProviderRegistration, ResponseAssembler};

// ---- Fake Adapters ----

mock! {
    pub Adapter {}

    #[async_trait]
    impl ProviderAdapter for Adapter {
        fn id(&self) -> ProviderId;
        fn capabilities(&self) -> Capabilities;
        async fn fetch(&self, ctx: &FetchContext) -> ProviderResult;
    }
}

/// Answers pricing immediately and counts how often it was asked.
struct Priced {
    id: ProviderId,
    price: f64,
    calls: Arc<AtomicUsize>,
}

impl Priced {
    fn new(id: ProviderId, price: f64) -> Self {
        Self {
            id,
            price,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ProviderAdapter for Priced {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pricing: true,
            load: false,
            generation_mix: false,
        }
    }

    async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(PricingSnapshot::from_window(
            self.id,
            self.price,
            &[],
            ctx.settings.baseline_price,
            ctx.now,
        )))
    }
}

/// Never finishes within any realistic deadline.
struct Stalled(ProviderId);

#[async_trait]
impl ProviderAdapter for Stalled {
    fn id(&self) -> ProviderId {
        self.0
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn fetch(&self, _ctx: &FetchContext) -> ProviderResult {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        ProviderResult::default()
    }
}

/// Panics mid-fetch.
struct Exploding(ProviderId);

#[async_trait]
impl ProviderAdapter for Exploding {
    fn id(&self) -> ProviderId {
        self.0
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn fetch(&self, _ctx: &FetchContext) -> ProviderResult {
        panic!("upstream payload tripped an adapter bug");
    }
}

// ---- Helpers ----

fn settings(id: ProviderId) -> ProviderSettings {
    let mut settings = ProviderSettings::defaults(id);
    settings.inter_request_delay = Duration::ZERO;
    settings
}

fn register(adapter: Arc<dyn ProviderAdapter>, credentials: Option<Credentials>) -> ProviderRegistration {
    let id = adapter.id();
    ProviderRegistration::new(adapter, settings(id), credentials)
}

fn metrics() -> Arc<MetricsRegistry> {
    Arc::new(MetricsRegistry::new().unwrap())
}

fn orchestrator(providers: Vec<ProviderRegistration>) -> FetchOrchestrator {
    FetchOrchestrator::new(reqwest::Client::new(), providers, metrics())
}

fn app(providers: Vec<ProviderRegistration>) -> axum::Router {
    let metrics = metrics();
    let orchestrator = Arc::new(FetchOrchestrator::new(
        reqwest::Client::new(),
        providers,
        Arc::clone(&metrics),
    ));
    router(AppState::new(orchestrator, metrics))
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn read_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&read_body(response).await).unwrap()
}

// ---- Orchestration ----

#[tokio::test]
async fn test_panicking_provider_does_not_disturb_siblings() {
    let orch = orchestrator(vec![
        register(Arc::new(Priced::new(ProviderId::Pjm, 31.0)), Some(Credentials::Anonymous)),
        register(Arc::new(Exploding(ProviderId::Miso)), Some(Credentials::Anonymous)),
        register(Arc::new(Priced::new(ProviderId::Spp, 24.0)), Some(Credentials::Anonymous)),
    ]);

    let aggregate = assert_ok!(orch.run_all().await);

    assert!(aggregate.success);
    assert_eq!(aggregate.providers.len(), 3);
    assert!(aggregate.providers[&ProviderId::Miso].is_empty());
    let pjm = aggregate.providers[&ProviderId::Pjm].pricing.as_ref().unwrap();
    let spp = aggregate.providers[&ProviderId::Spp].pricing.as_ref().unwrap();
    assert!((pjm.current_price - 31.0).abs() < 1e-9);
    assert!((spp.current_price - 24.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_provider_is_bounded_by_its_deadline() {
    let mut slow = settings(ProviderId::Nyiso);
    slow.timeout = Duration::from_secs(2);
    let stalled = ProviderRegistration::new(
        Arc::new(Stalled(ProviderId::Nyiso)),
        slow,
        Some(Credentials::Anonymous),
    );
    let orch = orchestrator(vec![
        stalled,
        register(Arc::new(Priced::new(ProviderId::Caiso, 45.0)), Some(Credentials::Anonymous)),
    ]);

    let started = tokio::time::Instant::now();
    let aggregate = assert_ok!(orch.run_all().await);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3), "settled after {elapsed:?}");
    assert!(aggregate.providers[&ProviderId::Nyiso].is_empty());
    assert!(aggregate.providers[&ProviderId::Caiso].pricing.is_some());
}

#[tokio::test]
async fn test_unconfigured_provider_is_never_called() {
    let mut adapter = MockAdapter::new();
    adapter.expect_id().return_const(ProviderId::Ercot);
    adapter.expect_capabilities().return_const(Capabilities::ALL);
    adapter.expect_fetch().times(0);

    let pjm = Priced::new(ProviderId::Pjm, 28.0);
    let pjm_calls = Arc::clone(&pjm.calls);

    let orch = orchestrator(vec![
        register(Arc::new(adapter), None),
        register(Arc::new(pjm), Some(Credentials::Anonymous)),
    ]);
    let aggregate = assert_ok!(orch.run_all().await);

    assert!(aggregate.providers[&ProviderId::Ercot].is_empty());
    assert_eq!(pjm_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_adapter_result_passes_through_unchanged() {
    let now = Utc::now();
    let expected = ProviderResult {
        load: LoadSnapshot::from_observation(
            ProviderId::IsoNe,
            LoadObservation {
                current_mw: 14_000.0,
                ..Default::default()
            },
            ProviderSettings::defaults(ProviderId::IsoNe).load_bounds,
            15.0,
            now,
        ),
        ..ProviderResult::default()
    };

    let mut adapter = MockAdapter::new();
    adapter.expect_id().return_const(ProviderId::IsoNe);
    adapter.expect_capabilities().return_const(Capabilities::ALL);
    let returned = expected.clone();
    adapter.expect_fetch().times(1).returning(move |_| returned.clone());

    let orch = orchestrator(vec![register(Arc::new(adapter), Some(Credentials::Anonymous))]);
    let aggregate = assert_ok!(orch.run_all().await);

    assert_eq!(aggregate.providers[&ProviderId::IsoNe], expected);
}

#[tokio::test]
async fn test_no_providers_is_the_only_failure() {
    let err = assert_err!(orchestrator(Vec::new()).run_all().await);
    assert_eq!(err, OrchestrationError::NoProviders);
}

// ---- Assembly ----

#[tokio::test]
async fn test_setup_failure_becomes_503() {
    let assembler = ResponseAssembler::new(metrics());
    let outcome = orchestrator(Vec::new()).run_all().await;
    let response = assembler.assemble(outcome);

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, json!({"success": false, "error": "no providers registered"}));
}

#[tokio::test]
async fn test_every_provider_key_present_even_when_empty() {
    let orch = orchestrator(vec![
        register(Arc::new(Priced::new(ProviderId::Aeso, 80.0)), Some(Credentials::Anonymous)),
        register(Arc::new(Exploding(ProviderId::Caiso)), Some(Credentials::Anonymous)),
        register(Arc::new(Priced::new(ProviderId::Pjm, 40.0)), None),
    ]);
    let response = ResponseAssembler::new(metrics()).assemble(orch.run_all().await);

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], json!(true));
    assert_eq!(response.body["caiso"], json!({}));
    assert_eq!(response.body["pjm"], json!({}));
    assert_eq!(response.body["aeso"]["pricing"]["current_price"], json!(80.0));
    assert_eq!(response.body["aeso"]["pricing"]["source"], json!("aeso_estimated_lmp"));
}

// ---- HTTP Surface ----

#[tokio::test]
async fn test_options_answers_200_with_empty_body() {
    let app = app(vec![register(
        Arc::new(Priced::new(ProviderId::Spp, 20.0)),
        Some(Credentials::Anonymous),
    )]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/grid-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_body(response).await.is_empty());
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let app = app(vec![register(
        Arc::new(Priced::new(ProviderId::Spp, 20.0)),
        Some(Credentials::Anonymous),
    )]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/")
                .header("origin", "https://dashboard.example.org")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_get_and_post_both_aggregate() {
    for method in [Method::GET, Method::POST] {
        let app = app(vec![register(
            Arc::new(Priced::new(ProviderId::Miso, 33.0)),
            Some(Credentials::Anonymous),
        )]);
        let response = app
            .oneshot(Request::builder().method(method).uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["miso"]["pricing"]["current_price"], json!(33.0));
    }
}

#[tokio::test]
async fn test_unknown_diagnostic_lists_available_providers() {
    let app = app(vec![
        register(Arc::new(Priced::new(ProviderId::Pjm, 30.0)), Some(Credentials::Anonymous)),
        register(Arc::new(Priced::new(ProviderId::Caiso, 30.0)), Some(Credentials::Anonymous)),
    ]);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/grid-data?test=hydro-quebec")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["available"], json!(["pjm", "caiso"]));
}

#[tokio::test]
async fn test_empty_task_set_surfaces_as_503() {
    let response = app(Vec::new())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_liveness_and_metrics_endpoints() {
    let app = app(vec![register(
        Arc::new(Priced::new(ProviderId::Spp, 20.0)),
        Some(Credentials::Anonymous),
    )]);

    let live = app
        .clone()
        .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(read_body(live).await, b"OK");

    let _ = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let scrape = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(scrape.status(), StatusCode::OK);
    let text = String::from_utf8(read_body(scrape).await).unwrap();
    assert!(text.contains("grid_aggregator_provider_fetch_total"));
    assert!(text.contains(r#"status="ok""#));
}
