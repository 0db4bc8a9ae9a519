//! JSON API handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::aviation_weather::{ReportKind, UpstreamResponse};
use crate::display::WeatherDisplay;
use crate::error::AeroWeatherError;
use crate::gate::AccessGate;
use crate::models::{AnalysisResult, ForecastReport, WeatherObservation};
use crate::service::WeatherService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
    pub gate: Arc<AccessGate>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    ids: Option<String>,
}

/// Body of `POST /api/analyze-weather`
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default, alias = "metar")]
    pub observation: Option<WeatherObservation>,
    #[serde(default, alias = "taf")]
    pub forecast: Option<ForecastReport>,
}

#[derive(Debug, Serialize)]
struct Authorization {
    authorized: bool,
}

/// Routes behind the access gate, relative to `/api`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/weather", get(get_weather))
        .route(
            "/analyze-weather",
            post(analyze_weather).fallback(method_not_allowed),
        )
        .route("/report", get(get_report))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Upstream body passed through with caching disabled at every layer
fn no_store_response(body: String) -> Response {
    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

fn upstream_failure(kind: ReportKind, upstream: &UpstreamResponse) -> Response {
    match kind {
        // Station info is optional enrichment; report it as absent
        ReportKind::Station => (
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            "null",
        )
            .into_response(),
        ReportKind::Metar | ReportKind::Taf => {
            let status = if upstream.status == 404 {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_GATEWAY
            };
            error_response(status, format!("Upstream error: {}", upstream.status))
        }
    }
}

/// `GET /api/weather?type=metar|taf|station&ids=...`
#[instrument(skip(state))]
pub async fn get_weather(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> Response {
    let kind = query.kind.filter(|kind| !kind.is_empty());
    let ids = query.ids.filter(|ids| !ids.trim().is_empty());
    let (Some(kind), Some(ids)) = (kind, ids) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing type or ids parameter");
    };
    let Some(kind) = ReportKind::parse(&kind) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid type parameter");
    };

    match state.service.provider().fetch_raw(kind, ids.trim()).await {
        Ok(upstream) if upstream.is_success() => no_store_response(upstream.body),
        Ok(upstream) => {
            warn!(%kind, status = upstream.status, "Upstream returned an error");
            upstream_failure(kind, &upstream)
        }
        Err(e) => {
            error!(%kind, "Weather data fetch failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch data")
        }
    }
}

/// `GET /api/verify-key?key=...`
pub async fn verify_key(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Response {
    let authorized = state.gate.verify_key(query.key.as_deref());
    let status = if authorized {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    (status, Json(Authorization { authorized })).into_response()
}

/// `POST /api/analyze-weather`
#[instrument(skip_all)]
pub async fn analyze_weather(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisResult>, AeroWeatherError> {
    if !state.service.has_analyzer() {
        error!("Analysis requested but no API key is configured");
        return Err(AeroWeatherError::config("Analysis API key is not configured"));
    }

    let request: AnalyzeRequest = if body.is_empty() {
        AnalyzeRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            warn!("Rejecting malformed analysis request: {e}");
            AeroWeatherError::validation("Invalid request body")
        })?
    };

    let result = state
        .service
        .analyze(request.observation.as_ref(), request.forecast.as_ref())
        .await?;
    Ok(Json(result))
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// `GET /api/report?ids=...`, the complete display model for one station
#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<WeatherDisplay>, AeroWeatherError> {
    let ids = query
        .ids
        .ok_or_else(|| AeroWeatherError::validation("Missing ids parameter"))?;
    let display = state.service.load(&ids, Utc::now()).await?;
    Ok(Json(display))
}
