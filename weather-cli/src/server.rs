//! HTTP surface over [`WeatherService`].

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use weather_core::{Config, WeatherError, WeatherRecord, WeatherService, spawn_sweeper};

/// Shared state for the weather routes.
#[derive(Clone)]
pub struct AppState {
    pub service: WeatherService,
    pub provider_info: ProviderInfo,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

/// What `/weather/config-test` reports. Never includes the key itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub has_api_key: bool,
    pub key_length: usize,
    pub base_url: String,
}

impl ProviderInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            has_api_key: config.has_api_key(),
            key_length: config.provider.api_key.chars().count(),
            base_url: config.provider.base_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheTestResult {
    first_call: WeatherRecord,
    second_call: WeatherRecord,
    are_same: bool,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    timestamp: DateTime<Utc>,
}

pub struct ApiError(WeatherError);

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody {
            error: self.0.to_string(),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn status_for(err: &WeatherError) -> StatusCode {
    match err {
        WeatherError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        WeatherError::UpstreamUnavailable { .. } | WeatherError::Cancelled { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        WeatherError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/weather/test", get(liveness))
        .route("/weather/test/{param}", get(echo_param))
        .route("/weather/config-test", get(config_test))
        .route("/weather/cache-test/{city}", get(cache_test))
        .route("/weather/{city}", get(get_weather))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds `config.server.bind` and serves until Ctrl-C.
pub async fn serve(config: &Config, service: WeatherService) -> Result<()> {
    let shutdown = CancellationToken::new();

    let sweeper = spawn_sweeper(
        service.cache().clone(),
        config.cache.sweep_interval(),
        shutdown.clone(),
    );

    let state = AppState {
        service,
        provider_info: ProviderInfo::from_config(config),
        shutdown: shutdown.clone(),
    };

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("weather service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(wait_for_ctrl_c(shutdown.clone()))
        .await
        .context("HTTP server error")?;

    shutdown.cancel();
    sweeper.await.context("Cache sweeper task failed")?;
    info!("weather service shut down");
    Ok(())
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
    }
    info!("shutdown requested");
    shutdown.cancel();
}

async fn liveness() -> &'static str {
    "Controller is working!"
}

async fn echo_param(Path(param): Path<String>) -> String {
    format!("Received parameter: {param}")
}

async fn config_test(State(state): State<AppState>) -> Json<ProviderInfo> {
    Json(state.provider_info)
}

async fn get_weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<WeatherRecord>, ApiError> {
    info!(city = %city, "weather request");
    let cancel = state.shutdown.child_token();
    let record = state.service.get_current_weather(&city, &cancel).await?;
    Ok(Json(record))
}

async fn cache_test(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<CacheTestResult>, ApiError> {
    let cancel = state.shutdown.child_token();
    let first_call = state.service.get_current_weather(&city, &cancel).await?;
    let second_call = state.service.get_current_weather(&city, &cancel).await?;

    Ok(Json(CacheTestResult {
        are_same: first_call == second_call,
        first_call,
        second_call,
        timestamp: Utc::now(),
    }))
}
