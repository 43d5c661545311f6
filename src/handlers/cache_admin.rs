//! Cache inspection and invalidation endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::services::CacheStats;
use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub invalidated: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// Report cache entry count, approximate memory use and backing store.
#[utoipa::path(
    get,
    path = "/api/cache/stats",
    responses(
        (status = 200, description = "Current cache statistics", body = CacheStats)
    ),
    tag = "Cache"
)]
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CacheStats>> {
    Ok(Json(state.cache.stats().await))
}

/// Drop every cached result and reverse-index set.
#[utoipa::path(
    post,
    path = "/api/cache/clear",
    responses(
        (status = 200, description = "Cache emptied", body = ClearResponse)
    ),
    tag = "Cache"
)]
pub async fn clear(State(state): State<Arc<AppState>>) -> ApiResult<Json<ClearResponse>> {
    state.cache.clear().await;
    Ok(Json(ClearResponse { cleared: true }))
}

/// Invalidate every cached result that consulted the given data source.
#[utoipa::path(
    post,
    path = "/api/cache/invalidate/{dataSourceId}",
    params(
        ("dataSourceId" = String, Path, description = "Data source identifier")
    ),
    responses(
        (status = 200, description = "Count of evicted entries", body = InvalidateResponse),
        (status = 400, description = "Empty data source id")
    ),
    tag = "Cache"
)]
pub async fn invalidate(
    State(state): State<Arc<AppState>>,
    Path(data_source_id): Path<String>,
) -> ApiResult<Json<InvalidateResponse>> {
    if data_source_id.trim().is_empty() {
        return Err(ApiError::bad_request("data source id is required"));
    }
    let invalidated = state.cache.invalidate_data_source(&data_source_id).await;
    Ok(Json(InvalidateResponse { invalidated }))
}
