//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

use bdgeo_cache::CacheStats;
use bdgeo_core::types::{District, Division, Union, Upazila};

use crate::dto::*;
use crate::error::{ApiError, FieldError};
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Longest accepted path parameter, in characters.
const MAX_PARAM_LEN: usize = 50;

/// Header carrying the admin token for `POST /cache/clear`.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Trims a path parameter and checks length and alphabet.
///
/// Letters (any script), digits, spaces and hyphens are accepted.
pub fn validate_param<'a>(field: &str, raw: &'a str) -> Result<&'a str> {
    let value = raw.trim();
    let len = value.chars().count();

    let problem = if len == 0 {
        Some(format!("{field} parameter is required"))
    } else if len > MAX_PARAM_LEN {
        Some(format!("{field} must be between 1 and {MAX_PARAM_LEN} characters"))
    } else if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || is_combining_mark(c))
    {
        Some(format!("{field} may only contain letters, numbers, spaces and hyphens"))
    } else {
        None
    };

    match problem {
        Some(message) => Err(ApiError::validation(vec![FieldError {
            field: field.to_string(),
            message,
            value: raw.to_string(),
        }])),
        None => Ok(value),
    }
}

/// Bengali vowel signs and virama, which are not alphanumeric on their own.
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0981}'..='\u{0983}' | '\u{09BC}'..='\u{09D7}')
}

// ═══════════════════════════════════════════════════════════════════════════════
// GEO
// ═══════════════════════════════════════════════════════════════════════════════

/// GET /divisions
pub async fn list_divisions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Division>>>> {
    Ok(Json(state.lookup.divisions().await?))
}

/// GET /districts
pub async fn list_districts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<District>>>> {
    Ok(Json(state.lookup.districts().await?))
}

/// GET /upazilas
pub async fn list_upazilas(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Upazila>>>> {
    Ok(Json(state.lookup.upazilas().await?))
}

/// GET /unions
pub async fn list_unions(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<Vec<Union>>>> {
    Ok(Json(state.lookup.unions().await?))
}

/// GET /districts/:division
pub async fn districts_of(
    State(state): State<Arc<AppState>>,
    Path(division): Path<String>,
) -> Result<Json<Envelope<Vec<DistrictView>>>> {
    let division = validate_param("division", &division)?;
    Ok(Json(state.lookup.districts_of(division).await?))
}

/// GET /upazilas/:district
pub async fn upazilas_of(
    State(state): State<Arc<AppState>>,
    Path(district): Path<String>,
) -> Result<Json<Envelope<Vec<UpazilaView>>>> {
    let district = validate_param("district", &district)?;
    Ok(Json(state.lookup.upazilas_of(district).await?))
}

/// GET /unions/:upazila_id
pub async fn unions_of(
    State(state): State<Arc<AppState>>,
    Path(upazila_id): Path<String>,
) -> Result<Json<Envelope<Vec<UnionView>>>> {
    let upazila_id = validate_param("upazila_id", &upazila_id)?;
    Ok(Json(state.lookup.unions_of(upazila_id).await?))
}

/// GET /search/:term?type=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(term): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    Ok(Json(state.lookup.search(&term, params.scope.as_deref()).await?))
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPS
// ═══════════════════════════════════════════════════════════════════════════════

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok".to_string(),
        backend: state.lookup.backend().to_string(),
        uptime_secs: state.uptime_secs(),
        timestamp: Utc::now(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Envelope<StatsResponse>>> {
    let dataset = state.lookup.dataset_counts().await?;

    let stats = StatsResponse {
        requests: state.metrics.requests(),
        errors: state.metrics.errors(),
        error_rate: state.metrics.error_rate(),
        uptime_secs: state.uptime_secs(),
        dataset,
        cache: state.cache.stats(),
        memory: MemoryUsage::from_bytes(state.cache.weigh(|cached| cached.body.len())),
    };
    Ok(Json(Envelope::new(stats, "Server statistics")))
}

/// GET /cache/stats
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<Envelope<CacheStats>> {
    Json(Envelope::new(state.cache.stats(), "Cache statistics"))
}

/// POST /cache/clear
///
/// Needs `x-admin-token` to match the configured token. Without a
/// configured token the endpoint is closed.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<CacheStats>>> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(ApiError::forbidden("Cache clearing is disabled"));
    };

    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        warn!("Rejected cache clear with bad admin token");
        return Err(ApiError::unauthorized("Invalid or missing admin token"));
    }

    state.cache.flush_all();
    info!("Response cache cleared");
    Ok(Json(Envelope::new(state.cache.stats(), "Cache cleared successfully")))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::route_not_found()
}
