pub mod analysis;
pub mod chart;
pub mod datasource;
pub mod query;
pub mod relationship;

pub use analysis::{
    AnalysisResult, ChartDatum, ColumnProfile, GroupTotal, TrendPoint, ValueKind,
};
pub use chart::{ChartConfig, ChartMapping, ChartType, unique_nonempty};
pub use datasource::{
    ColumnDescriptor, ConnectionConfig, DataSourceDescriptor, Dialect, SemanticType, SourceKind,
};
pub use query::{
    AggregationKind, Dimension, FilterOperator, FilterPredicate, Metric, QuerySpec, SortOrder,
};
pub use relationship::{Relationship, RelationshipKind, TableSchema};

/// A single result row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;
