//! Natural-language question endpoint.
//!
//! The question is answered with locally computed numbers; the language
//! model only ever sees the schema and a derived fact. When the request
//! carries an adhoc chart configuration, that query is executed first and
//! its (already aggregated) result reused.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{
    ChartConfig, ChartDatum, ChartType, DataSourceDescriptor, Relationship, Row, SourceKind,
    TableSchema,
};
use crate::services::{infer_relationships, mediator};
use crate::utils::{ApiError, ApiResult};

/// Row prefix fetched from live sources for local analysis.
const PREVIEW_LIMIT: u64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub data_source: Option<DataSourceDescriptor>,
    /// Materialized rows for tabular-file sources.
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub rows: Option<Vec<Row>>,
    /// Optional adhoc chart configuration to execute before answering.
    #[serde(default)]
    pub chart_type: Option<ChartType>,
    #[serde(default)]
    pub config: Option<ChartConfig>,
    /// Table schemas for cross-table relationship inference.
    #[serde(default)]
    pub tables: Option<Vec<TableSchema>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    pub chart_data: Vec<ChartDatum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    pub relationships: Vec<Relationship>,
}

/// Answer a free-text question over a data source.
#[utoipa::path(
    post,
    path = "/api/ask",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Answer with chart suggestion", body = AskResponse),
        (status = 400, description = "Empty question")
    ),
    tag = "Analysis"
)]
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let relationships = req
        .tables
        .as_deref()
        .map(infer_relationships)
        .unwrap_or_default();

    let mut rows = req.rows.unwrap_or_default();
    let mut sql_query = None;
    let mut precomputed = None;

    if let Some(source) = &req.data_source {
        if let Some(chart_type) = req.chart_type {
            // Adhoc config: run it and reuse the aggregated result.
            let config = req.config.clone().unwrap_or_default();
            let (spec, sql) = state.router.compile(chart_type, &config, source, None);
            let executed = state
                .router
                .execute_chart_query(
                    chart_type,
                    &config,
                    source,
                    (!rows.is_empty()).then_some(rows.as_slice()),
                    None,
                )
                .await;
            // Only an aggregated query produces a reusable derived fact; an
            // unaggregated projection (table previews) is still raw rows and
            // must stay behind the local analyzer.
            if !spec.metrics.is_empty() {
                precomputed = mediator::classify_precomputed(&executed);
            }
            sql_query = Some(sql);
        } else {
            let (_, sql) = state.router.compile(
                ChartType::Table,
                &ChartConfig::default(),
                source,
                Some(PREVIEW_LIMIT),
            );
            sql_query = Some(sql);
        }

        if rows.is_empty() && source.kind == SourceKind::LiveDatabase {
            rows = state
                .router
                .execute_chart_query(
                    ChartType::Table,
                    &ChartConfig::default(),
                    source,
                    None,
                    Some(PREVIEW_LIMIT),
                )
                .await;
        }
    }

    let mediated = state.mediator.ask(question, &rows, precomputed).await;

    Ok(Json(AskResponse {
        answer: mediated.answer,
        chart_type: mediated.chart_type,
        chart_data: mediated.chart_data,
        sql_query,
        relationships,
    }))
}
