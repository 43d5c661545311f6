//! Locally computed analysis results.
//!
//! An `AnalysisResult` is computed per request from real rows and is never
//! serialized wholesale across the language-model boundary; only a terse
//! derived fact crosses that line.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Row;

/// Value kind inferred from a bounded row sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Float,
    Date,
    Boolean,
    String,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// Column name plus inferred value kind; the only shape information that
/// crosses into the language-model prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrendPoint {
    pub period: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroupTotal {
    pub name: String,
    pub value: f64,
}

/// Tagged result of the local analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// Single aggregate cell, e.g. "total revenue".
    KpiValue { value: f64, unit: String },
    /// One row with several named columns.
    SingleRow {
        #[schema(value_type = Object)]
        columns: Row,
    },
    /// Time-ordered series.
    Trend { points: Vec<TrendPoint> },
    /// Per-category totals.
    Grouped { groups: Vec<GroupTotal> },
    /// Raw record subset when no aggregate rule matched.
    Records {
        #[schema(value_type = Vec<Object>)]
        rows: Vec<Row>,
    },
}

/// Chart-ready point reconstructed from the local result, never from
/// model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartDatum {
    pub name: String,
    pub value: f64,
}
