pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod validation;

use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use llm_core::LlmClient;
use tts_core::SpeechClient;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{AppMetrics, MetricsResponse};
use crate::validation::validate_tts_request;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<LlmClient>,
    pub speech: Arc<SpeechClient>,
    pub metrics: Arc<AppMetrics>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            llm: Arc::new(LlmClient::new(config.llm.clone())?),
            speech: Arc::new(SpeechClient::new(config.speech.clone())?),
            metrics: Arc::new(AppMetrics::default()),
            config,
        })
    }
}

#[derive(Deserialize)]
pub struct TtsRequest {
    text: Option<String>,
    format: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct TtsTestResponse {
    status: &'static str,
    model: String,
    endpoint: String,
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    let Some(ref allowed_origins) = config.cors_allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return base.allow_origin(tower_http::cors::Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(tower_http::cors::Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(tower_http::cors::AllowOrigin::list(origins))
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(request).await;
    };
    request.headers_mut().insert("x-request-id", value.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", value);
    response
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config))
        .into_inner();

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/tts-test", get(tts_test))
        .route("/tts", post(tts_endpoint))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .route("/ws", get(relay::ws_handler))
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .fallback(not_found)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {uri}"))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn tts_test(State(state): State<AppState>) -> Json<TtsTestResponse> {
    info!("TTS test endpoint called");
    let speech = state.speech.config();
    Json(TtsTestResponse {
        status: "ok",
        model: speech.model.clone(),
        endpoint: speech.endpoint.clone(),
    })
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.metrics.snapshot())
}

/// Proxy a synthesis request to the provider and stream the audio back.
pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Response, ApiError> {
    let format = validate_tts_request(req.text.as_deref(), req.format.as_deref())?;
    let text = req.text.unwrap_or_default();
    let start = Instant::now();

    let audio = match state.speech.speak(&text, format).await {
        Ok(audio) => audio,
        Err(e) => {
            state.metrics.tts.record_error();
            return Err(e.into());
        }
    };
    state.metrics.tts.record_request(start.elapsed().as_millis() as u64);

    Ok((
        [(header::CONTENT_TYPE, format.mime_type())],
        Body::from_stream(audio),
    )
        .into_response())
}
