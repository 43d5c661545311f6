//! Chart data endpoint: the upstream dashboard layer posts a chart type,
//! column mappings and a data-source descriptor, and gets rows back.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{ChartConfig, ChartType, DataSourceDescriptor, Row};
use crate::utils::ApiResult;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataRequest {
    pub chart_type: ChartType,
    #[serde(default)]
    pub config: ChartConfig,
    pub data_source: DataSourceDescriptor,
    /// Materialized rows for tabular-file sources.
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub rows: Option<Vec<Row>>,
    /// Caller row ceiling; clamped to the server maximum.
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChartDataResponse {
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Row>,
}

/// Execute a chart query against its data source.
#[utoipa::path(
    post,
    path = "/api/charts/data",
    request_body = ChartDataRequest,
    responses(
        (status = 200, description = "Chart rows (empty on execution failure)", body = ChartDataResponse)
    ),
    tag = "Charts"
)]
pub async fn chart_data(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChartDataRequest>,
) -> ApiResult<Json<ChartDataResponse>> {
    let rows = state
        .router
        .execute_chart_query(
            req.chart_type,
            &req.config,
            &req.data_source,
            req.rows.as_deref(),
            req.limit,
        )
        .await;

    tracing::debug!(
        "Chart query ({}) on source {} returned {} rows",
        req.chart_type.as_str(),
        req.data_source.id,
        rows.len()
    );
    Ok(Json(ChartDataResponse { rows }))
}
