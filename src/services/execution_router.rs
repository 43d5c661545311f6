//! Execution router: compiler + cache + (in-memory engine | connector).
//!
//! The compiled dialect SQL text is always produced, even for in-memory
//! execution - it is the cache key material. Data-path failures degrade to
//! an empty row set so the surface renders an empty state instead of
//! crashing.

use std::sync::Arc;
use std::time::Duration;

use super::connector::DatabaseConnector;
use super::query_compiler::{build_query, translate_chart_config};
use super::result_cache::ResultCache;
use super::tabular_engine;
use crate::config::{CacheConfig, QueryConfig};
use crate::models::{ChartConfig, ChartType, DataSourceDescriptor, QuerySpec, Row, SourceKind};

/// Chart-type-dependent cache lifetimes: single-value charts refresh fast,
/// tabular previews medium, everything else long.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub single_value: Duration,
    pub table: Duration,
    pub default_ttl: Duration,
}

impl TtlPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            single_value: Duration::from_secs(config.ttl_single_value_secs),
            table: Duration::from_secs(config.ttl_table_secs),
            default_ttl: Duration::from_secs(config.ttl_default_secs),
        }
    }

    fn for_chart(&self, chart_type: ChartType) -> Duration {
        if chart_type.is_single_value() {
            self.single_value
        } else if chart_type == ChartType::Table {
            self.table
        } else {
            self.default_ttl
        }
    }
}

pub struct ExecutionRouter {
    cache: Arc<ResultCache>,
    connector: Arc<dyn DatabaseConnector>,
    ttl: TtlPolicy,
    max_rows: u64,
}

impl ExecutionRouter {
    pub fn new(
        cache: Arc<ResultCache>,
        connector: Arc<dyn DatabaseConnector>,
        ttl: TtlPolicy,
        query_config: &QueryConfig,
    ) -> Self {
        Self { cache, connector, ttl, max_rows: query_config.max_rows }
    }

    /// Compile a chart request into its QuerySpec and dialect SQL text,
    /// clamping the row limit to the caller ceiling.
    pub fn compile(
        &self,
        chart_type: ChartType,
        config: &ChartConfig,
        source: &DataSourceDescriptor,
        limit: Option<u64>,
    ) -> (QuerySpec, String) {
        let ceiling = limit.unwrap_or(self.max_rows).min(self.max_rows).max(1);
        let mut spec = translate_chart_config(chart_type, config, source);
        spec.limit = Some(spec.limit.unwrap_or(ceiling).min(ceiling));
        let sql = build_query(&spec, source.dialect);
        (spec, sql)
    }

    /// Run a chart query end to end. `rows` carries the materialized table
    /// for tabular-file sources; live-database sources ignore it.
    pub async fn execute_chart_query(
        &self,
        chart_type: ChartType,
        config: &ChartConfig,
        source: &DataSourceDescriptor,
        rows: Option<&[Row]>,
        limit: Option<u64>,
    ) -> Vec<Row> {
        let (spec, sql) = self.compile(chart_type, config, source, limit);
        let params = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        let source_ids = vec![source.id.clone()];

        if let Some(hit) = self.cache.get(&sql, &params, &source_ids).await {
            return hit;
        }

        let result = match source.kind {
            SourceKind::TabularFile => {
                let Some(rows) = rows else {
                    tracing::warn!(
                        "Tabular source {} requested without materialized rows",
                        source.id
                    );
                    return Vec::new();
                };
                tabular_engine::execute(&spec, rows)
            },
            SourceKind::LiveDatabase => {
                match self.connector.execute_query(source, &sql).await {
                    Ok(query_result) => query_result.rows,
                    Err(e) => {
                        tracing::error!("Connector failed for source {}: {}", source.id, e);
                        return Vec::new();
                    },
                }
            },
        };

        let ttl = self.ttl.for_chart(chart_type);
        self.cache
            .set(&sql, &params, &source_ids, result.clone(), Some(ttl))
            .await;

        result
    }
}
