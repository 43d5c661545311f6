//! Inferred cross-table relationships.
//!
//! Relationships are transient advisory output of the heuristic inferencer;
//! they are never persisted, and the confidence score is surfaced end-to-end
//! rather than collapsed to a boolean.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    PrimaryForeign,
    NameMatch,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    /// Heuristic confidence in [0, 1]. Advisory only, never ground truth.
    pub confidence: f64,
    pub kind: RelationshipKind,
}

/// Minimal table shape fed to the inferencer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}
