//! Chart configuration model.
//!
//! The wire format is a loosely-typed blob of per-chart-type named fields
//! (`xAxis`/`yAxis`, `category`/`value`, `metric`, `dimensions[]`, ...).
//! It is validated exactly once, at the config-to-QuerySpec boundary, into
//! the tagged [`ChartMapping`] variant for its chart family. Unmapped chart
//! types fall back to the generic xAxis/yAxis mapping - never an error.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::query::{AggregationKind, FilterPredicate, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Area,
    Pie,
    Donut,
    Scatter,
    Kpi,
    Gauge,
    BigNumber,
    Table,
    /// Chart types this engine has no dedicated mapping for.
    #[serde(other)]
    Unknown,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Area => "area",
            Self::Pie => "pie",
            Self::Donut => "donut",
            Self::Scatter => "scatter",
            Self::Kpi => "kpi",
            Self::Gauge => "gauge",
            Self::BigNumber => "big_number",
            Self::Table => "table",
            Self::Unknown => "unknown",
        }
    }

    /// Single-value charts render one aggregate cell and get the short cache TTL.
    pub fn is_single_value(&self) -> bool {
        matches!(self, Self::Kpi | Self::Gauge | Self::BigNumber)
    }
}

/// Raw chart configuration as sent by the dashboard layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub category: Option<String>,
    pub value: Option<String>,
    pub metric: Option<String>,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub aggregation: Option<String>,
    pub filters: Vec<FilterPredicate>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    #[serde(deserialize_with = "deserialize_lenient_count")]
    #[schema(value_type = Option<u64>)]
    pub limit: Option<u64>,
    #[serde(deserialize_with = "deserialize_lenient_count")]
    #[schema(value_type = Option<u64>)]
    pub offset: Option<u64>,
}

impl ChartConfig {
    pub fn aggregation_kind(&self) -> AggregationKind {
        self.aggregation
            .as_deref()
            .map(AggregationKind::parse_lenient)
            .unwrap_or(AggregationKind::Sum)
    }
}

/// Validated per-chart-family field mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartMapping {
    /// Axis charts: bar, line, area, scatter.
    Xy { x_axis: String, y_axis: String },
    /// Slice charts: pie, donut.
    CategoryValue { category: String, value: String },
    /// Single-value charts: kpi, gauge, big_number.
    SingleValue { metric: String },
    /// Tabular previews: explicit column list, no aggregation.
    Columns { dimensions: Vec<String> },
    /// Fallback for unmapped chart types: xAxis becomes the dimension,
    /// yAxis the metric, whichever of the two is present.
    Generic { dimension: Option<String>, metric: Option<String> },
}

impl ChartMapping {
    /// Table-driven translation of chart-type-specific fields. Total: any
    /// config maps to something, missing fields simply produce an empty side.
    pub fn from_config(chart_type: ChartType, config: &ChartConfig) -> Self {
        let nonempty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        match chart_type {
            ChartType::Bar | ChartType::Line | ChartType::Area | ChartType::Scatter => {
                match (nonempty(&config.x_axis), nonempty(&config.y_axis)) {
                    (Some(x), Some(y)) => Self::Xy { x_axis: x, y_axis: y },
                    (x, y) => Self::Generic { dimension: x, metric: y },
                }
            },
            ChartType::Pie | ChartType::Donut => {
                match (
                    nonempty(&config.category).or_else(|| nonempty(&config.x_axis)),
                    nonempty(&config.value).or_else(|| nonempty(&config.y_axis)),
                ) {
                    (Some(category), Some(value)) => Self::CategoryValue { category, value },
                    (c, v) => Self::Generic { dimension: c, metric: v },
                }
            },
            ChartType::Kpi | ChartType::Gauge | ChartType::BigNumber => {
                match nonempty(&config.metric)
                    .or_else(|| nonempty(&config.value))
                    .or_else(|| nonempty(&config.y_axis))
                {
                    Some(metric) => Self::SingleValue { metric },
                    None => Self::Generic { dimension: None, metric: None },
                }
            },
            ChartType::Table => {
                let dimensions = unique_nonempty(&config.dimensions);
                if dimensions.is_empty() {
                    Self::Generic {
                        dimension: nonempty(&config.x_axis),
                        metric: nonempty(&config.y_axis),
                    }
                } else {
                    Self::Columns { dimensions }
                }
            },
            ChartType::Unknown => Self::Generic {
                dimension: nonempty(&config.x_axis),
                metric: nonempty(&config.y_axis),
            },
        }
    }
}

/// Deduplicate preserving first-seen order, dropping blank entries.
pub fn unique_nonempty(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_string()))
        .map(String::from)
        .collect()
}

// Accepts a JSON number or a numeric string ("3"); anything else reads as None.
fn deserialize_lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
