use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, extract::State};
use serde_json::json;

use crate::AppState;
use crate::config::{CacheConfig, QueryConfig};
use crate::handlers::ask::{AskRequest, ask};
use crate::models::{
    ChartConfig, ChartType, ColumnDescriptor, DataSourceDescriptor, Dialect, SemanticType,
    SourceKind,
};
use crate::services::result_cache::{LocalCacheStore, ResultCache};
use crate::services::{
    AnalysisMediator, ConnectorError, DatabaseConnector, ExecutionRouter, LanguageModel, LlmAnswer,
    LlmError, QueryResult, TtlPolicy,
};
use crate::tests::common::row;

/// Model fake that records every user prompt it is handed.
struct CapturingModel {
    prompts: Arc<Mutex<Vec<String>>>,
    answer: String,
}

impl CapturingModel {
    fn new(answer: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        (Self { prompts: Arc::clone(&prompts), answer: answer.to_string() }, prompts)
    }
}

#[async_trait]
impl LanguageModel for CapturingModel {
    fn is_available(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmAnswer, LlmError> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        Ok(LlmAnswer { answer: self.answer.clone(), chart_type: Some("kpi".to_string()) })
    }
}

/// Connector that must never be reached from a tabular-file request.
struct UnreachableConnector;

#[async_trait]
impl DatabaseConnector for UnreachableConnector {
    async fn execute_query(
        &self,
        source: &DataSourceDescriptor,
        _sql: &str,
    ) -> Result<QueryResult, ConnectorError> {
        Err(ConnectorError::MissingConnection(source.id.clone()))
    }
}

fn app_state(model: Arc<dyn LanguageModel>) -> Arc<AppState> {
    let cache = Arc::new(ResultCache::with_store(
        Arc::new(LocalCacheStore::new(100)),
        true,
        Duration::from_secs(600),
    ));
    let router = Arc::new(ExecutionRouter::new(
        Arc::clone(&cache),
        Arc::new(UnreachableConnector),
        TtlPolicy::from_config(&CacheConfig::default()),
        &QueryConfig::default(),
    ));
    let mediator = Arc::new(AnalysisMediator::new(model));
    Arc::new(AppState { router, cache, mediator })
}

fn revenue_source() -> DataSourceDescriptor {
    DataSourceDescriptor {
        id: "ds1".to_string(),
        dialect: Dialect::MySql,
        table: "revenue".to_string(),
        schema: None,
        columns: vec![
            ColumnDescriptor { name: "customer".to_string(), column_type: SemanticType::String },
            ColumnDescriptor { name: "revenue".to_string(), column_type: SemanticType::Number },
        ],
        kind: SourceKind::TabularFile,
        connection: None,
    }
}

fn revenue_rows() -> Vec<crate::models::Row> {
    vec![
        row(&[("customer", json!("Acme")), ("revenue", json!(100))]),
        row(&[("customer", json!("Globex")), ("revenue", json!(200))]),
        row(&[("customer", json!("Initech")), ("revenue", json!(300))]),
    ]
}

#[tokio::test]
async fn test_table_chart_ask_keeps_raw_rows_out_of_the_prompt() {
    let (model, prompts) = CapturingModel::new("Total revenue is 600.");
    let state = app_state(Arc::new(model));

    // A table chart compiles to an unaggregated projection: its output is
    // still raw rows and must never be reused as a derived fact.
    let req = AskRequest {
        question: "What is the total revenue?".to_string(),
        data_source: Some(revenue_source()),
        rows: Some(revenue_rows()),
        chart_type: Some(ChartType::Table),
        config: Some(ChartConfig {
            dimensions: vec!["customer".to_string(), "revenue".to_string()],
            ..ChartConfig::default()
        }),
        tables: None,
    };

    let response = ask(State(state), Json(req)).await.unwrap();
    assert_eq!(response.0.answer, "Total revenue is 600.");

    // The locally computed aggregate crosses; the projected cells do not.
    let prompt = prompts.lock().unwrap().join("\n");
    assert!(prompt.contains("600"));
    for leaked in ["Acme", "Globex", "Initech", "100", "200", "300"] {
        assert!(!prompt.contains(leaked), "raw value leaked into prompt: {}", leaked);
    }
}

#[tokio::test]
async fn test_aggregated_chart_result_feeds_the_derived_fact() {
    let (model, prompts) = CapturingModel::new("Revenue totals 600.");
    let state = app_state(Arc::new(model));

    let req = AskRequest {
        question: "total revenue".to_string(),
        data_source: Some(revenue_source()),
        rows: Some(revenue_rows()),
        chart_type: Some(ChartType::Kpi),
        config: Some(ChartConfig {
            metric: Some("revenue".to_string()),
            ..ChartConfig::default()
        }),
        tables: None,
    };

    let response = ask(State(state), Json(req)).await.unwrap();

    // The kpi query aggregated, so its single cell is reused as-is.
    let prompt = prompts.lock().unwrap().join("\n");
    assert!(prompt.contains("revenue = 600"));
    assert_eq!(response.0.chart_data.len(), 1);
    assert_eq!(response.0.chart_data[0].value, 600.0);
    assert!(response.0.sql_query.is_some());
}
