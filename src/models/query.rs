//! Dialect-neutral query representation.
//!
//! `QuerySpec` sits between a chart configuration and the SQL text the
//! compiler emits. Invariant: when both `dimensions` and `metrics` are
//! non-empty, the dimensions are the GROUP BY keys.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::datasource::SemanticType;

/// Aggregation applied to a metric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    CountDistinct,
}

impl AggregationKind {
    /// SQL function name; `CountDistinct` is rendered specially by the compiler.
    pub fn sql_fn(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Count | Self::CountDistinct => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    /// Lenient parse from config strings; unknown values fall back to Sum.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "avg" | "average" | "mean" => Self::Avg,
            "count" => Self::Count,
            "count_distinct" | "distinct" => Self::CountDistinct,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => Self::Sum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Metric {
    pub name: String,
    pub field: String,
    pub aggregation: AggregationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dimension {
    pub name: String,
    pub field: String,
    pub semantic_type: SemanticType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Like,
}

impl FilterOperator {
    pub fn sql_op(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Compiled, dialect-neutral query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuerySpec {
    /// Schema-qualified table reference of the dataset.
    pub table: String,
    /// Ordered, name-unique metrics.
    pub metrics: Vec<Metric>,
    /// Ordered, name-unique dimensions.
    pub dimensions: Vec<Dimension>,
    pub filters: Vec<FilterPredicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl QuerySpec {
    /// GROUP BY is emitted only when both sides are present.
    pub fn is_grouped(&self) -> bool {
        !self.dimensions.is_empty() && !self.metrics.is_empty()
    }
}
