use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{CacheConfig, QueryConfig};
use crate::models::{ChartConfig, ChartType, DataSourceDescriptor, Dialect};
use crate::services::result_cache::{LocalCacheStore, ResultCache};
use crate::services::{
    ConnectorError, DatabaseConnector, ExecutionRouter, QueryResult, TtlPolicy,
};
use crate::tests::common::{live_source, row, sales_rows, sales_source};

/// Connector that counts executions and returns a fixed row set.
struct CountingConnector {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingConnector {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0), fail: false }
    }

    fn failing() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseConnector for CountingConnector {
    async fn execute_query(
        &self,
        _source: &DataSourceDescriptor,
        _sql: &str,
    ) -> Result<QueryResult, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ConnectorError::Execution("table gone".to_string()));
        }
        let rows = vec![row(&[("region", json!("East")), ("amount", json!(20))])];
        Ok(QueryResult { columns: vec!["region".to_string(), "amount".to_string()], row_count: rows.len(), rows })
    }
}

fn router_with(connector: Arc<CountingConnector>, max_rows: u64) -> ExecutionRouter {
    let cache = Arc::new(ResultCache::with_store(
        Arc::new(LocalCacheStore::new(100)),
        true,
        Duration::from_secs(600),
    ));
    ExecutionRouter::new(
        cache,
        connector,
        TtlPolicy::from_config(&CacheConfig::default()),
        &QueryConfig { max_rows, timeout_secs: 30 },
    )
}

fn bar_config() -> ChartConfig {
    ChartConfig {
        x_axis: Some("region".to_string()),
        y_axis: Some("amount".to_string()),
        ..ChartConfig::default()
    }
}

#[test]
fn test_compile_clamps_limit_to_server_maximum() {
    let router = router_with(Arc::new(CountingConnector::new()), 1000);
    let source = sales_source("ds1");

    let config = ChartConfig { limit: Some(50_000), ..bar_config() };
    let (spec, _) = router.compile(ChartType::Bar, &config, &source, None);
    assert_eq!(spec.limit, Some(1000));

    // Caller ceiling below the config limit wins.
    let (spec, _) = router.compile(ChartType::Bar, &config, &source, Some(10));
    assert_eq!(spec.limit, Some(10));

    // No limit anywhere still caps at the server maximum.
    let (spec, _) = router.compile(ChartType::Bar, &bar_config(), &source, None);
    assert_eq!(spec.limit, Some(1000));
}

#[test]
fn test_compile_emits_dialect_sql() {
    let router = router_with(Arc::new(CountingConnector::new()), 1000);
    let source = live_source("ds1", Dialect::SqlServer);

    let config = ChartConfig { limit: Some(5), ..bar_config() };
    let (_, sql) = router.compile(ChartType::Bar, &config, &source, None);
    assert!(sql.starts_with("SELECT TOP 5 "));
}

#[tokio::test]
async fn test_tabular_source_executes_in_process() {
    let connector = Arc::new(CountingConnector::new());
    let router = router_with(Arc::clone(&connector), 1000);
    let source = sales_source("ds1");
    let rows = sales_rows();

    let result = router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, Some(&rows), None)
        .await;

    assert_eq!(result.len(), 2);
    assert_eq!(result[0]["amount"], json!(20));
    // The connector is never consulted for tabular-file sources.
    assert_eq!(connector.calls(), 0);
}

#[tokio::test]
async fn test_tabular_source_without_rows_returns_empty_uncached() {
    let router = router_with(Arc::new(CountingConnector::new()), 1000);
    let source = sales_source("ds1");

    let result = router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, None, None)
        .await;
    assert!(result.is_empty());

    // A later call with rows must compute, not replay an empty cache entry.
    let rows = sales_rows();
    let result = router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, Some(&rows), None)
        .await;
    assert_eq!(result.len(), 2);
}

#[tokio::test]
async fn test_live_source_repeat_query_hits_cache() {
    let connector = Arc::new(CountingConnector::new());
    let router = router_with(Arc::clone(&connector), 1000);
    let source = live_source("ds1", Dialect::MySql);

    let first = router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, None, None)
        .await;
    let second = router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, None, None)
        .await;

    assert_eq!(first, second);
    assert_eq!(connector.calls(), 1);
}

#[tokio::test]
async fn test_different_config_is_a_different_cache_entry() {
    let connector = Arc::new(CountingConnector::new());
    let router = router_with(Arc::clone(&connector), 1000);
    let source = live_source("ds1", Dialect::MySql);

    router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, None, None)
        .await;
    let other = ChartConfig { limit: Some(7), ..bar_config() };
    router
        .execute_chart_query(ChartType::Bar, &other, &source, None, None)
        .await;

    assert_eq!(connector.calls(), 2);
}

#[tokio::test]
async fn test_connector_failure_returns_empty_and_is_not_cached() {
    let connector = Arc::new(CountingConnector::failing());
    let router = router_with(Arc::clone(&connector), 1000);
    let source = live_source("ds1", Dialect::MySql);

    let result = router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, None, None)
        .await;
    assert!(result.is_empty());

    // The failure was not cached: the next call reaches the connector again.
    router
        .execute_chart_query(ChartType::Bar, &bar_config(), &source, None, None)
        .await;
    assert_eq!(connector.calls(), 2);
}
