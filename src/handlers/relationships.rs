//! Relationship inference endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;
use crate::models::{Relationship, TableSchema};
use crate::services::{generate_join_clauses, infer_relationships};
use crate::utils::ApiResult;

/// Relationships below this floor never auto-join unless callers opt in.
const DEFAULT_MIN_JOIN_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InferRelationshipsRequest {
    pub tables: Vec<TableSchema>,
    /// Join tree root; defaults to the first table.
    #[serde(default)]
    pub start_table: Option<String>,
    /// Confidence floor for join generation (default 0.8).
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InferRelationshipsResponse {
    /// Every inferred relationship with its confidence, join-worthy or not.
    pub relationships: Vec<Relationship>,
    pub join_clauses: Vec<String>,
}

/// Infer cross-table relationships and an advisory LEFT JOIN chain.
#[utoipa::path(
    post,
    path = "/api/relationships/infer",
    request_body = InferRelationshipsRequest,
    responses(
        (status = 200, description = "Inferred relationships, confidence-descending", body = InferRelationshipsResponse)
    ),
    tag = "Relationships"
)]
pub async fn infer(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<InferRelationshipsRequest>,
) -> ApiResult<Json<InferRelationshipsResponse>> {
    let relationships = infer_relationships(&req.tables);

    let start_table = req
        .start_table
        .or_else(|| req.tables.first().map(|t| t.name.clone()));
    let join_clauses = match start_table {
        Some(start) => generate_join_clauses(
            &relationships,
            &start,
            req.min_confidence.unwrap_or(DEFAULT_MIN_JOIN_CONFIDENCE),
        ),
        None => Vec::new(),
    };

    Ok(Json(InferRelationshipsResponse { relationships, join_clauses }))
}
