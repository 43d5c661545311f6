use serde_json::json;

use crate::models::{
    AggregationKind, ChartConfig, ChartType, Dialect, FilterOperator, FilterPredicate, SortOrder,
};
use crate::services::{build_query, derive_dataset_fields, sanitize_identifier, translate_chart_config};
use crate::tests::common::sales_source;

fn bar_config() -> ChartConfig {
    ChartConfig {
        x_axis: Some("region".to_string()),
        y_axis: Some("amount".to_string()),
        ..ChartConfig::default()
    }
}

#[test]
fn test_derive_dataset_fields_numeric_and_name_hints() {
    let mut source = sales_source("ds1");
    source.columns.push(crate::models::ColumnDescriptor {
        name: "unit_price".to_string(),
        column_type: crate::models::SemanticType::String,
    });

    let fields = derive_dataset_fields(&source);

    // `amount` is numeric; `unit_price` is a string but name-hints to a
    // metric on tabular-file sources.
    let metric_names: Vec<&str> = fields.metrics.iter().map(|m| m.field.as_str()).collect();
    assert_eq!(metric_names, vec!["amount", "unit_price"]);
    // Every column stays a dimension candidate.
    assert_eq!(fields.dimensions.len(), 3);
}

#[test]
fn test_translate_bar_chart_groups_by_x_axis() {
    let source = sales_source("ds1");
    let spec = translate_chart_config(ChartType::Bar, &bar_config(), &source);

    assert_eq!(spec.table, "sales");
    assert_eq!(spec.dimensions.len(), 1);
    assert_eq!(spec.dimensions[0].field, "region");
    assert_eq!(spec.metrics.len(), 1);
    assert_eq!(spec.metrics[0].field, "amount");
    assert_eq!(spec.metrics[0].aggregation, AggregationKind::Sum);
    assert!(spec.is_grouped());
}

#[test]
fn test_translate_is_deterministic() {
    let source = sales_source("ds1");
    let config = bar_config();
    let first = translate_chart_config(ChartType::Bar, &config, &source);
    let second = translate_chart_config(ChartType::Bar, &config, &source);
    assert_eq!(first, second);
    assert_eq!(build_query(&first, Dialect::MySql), build_query(&second, Dialect::MySql));
}

#[test]
fn test_missing_sort_by_defaults_to_first_metric() {
    let source = sales_source("ds1");
    let config = ChartConfig {
        sort_order: Some(SortOrder::Desc),
        ..bar_config()
    };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    assert_eq!(spec.sort_by.as_deref(), Some("amount"));
    assert_eq!(spec.sort_order, SortOrder::Desc);
}

#[test]
fn test_unknown_chart_type_falls_back_to_generic_mapping() {
    let source = sales_source("ds1");
    let spec = translate_chart_config(ChartType::Unknown, &bar_config(), &source);
    assert_eq!(spec.dimensions[0].field, "region");
    assert_eq!(spec.metrics[0].field, "amount");
}

#[test]
fn test_empty_config_compiles_to_select_star() {
    let source = sales_source("ds1");
    let spec = translate_chart_config(ChartType::Unknown, &ChartConfig::default(), &source);
    let sql = build_query(&spec, Dialect::MySql);
    assert_eq!(sql, "SELECT * FROM sales");
}

#[test]
fn test_build_query_grouped_mysql() {
    let source = sales_source("ds1");
    let config = ChartConfig { limit: Some(3), ..bar_config() };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    let sql = build_query(&spec, Dialect::MySql);
    assert_eq!(
        sql,
        "SELECT region, SUM(amount) AS amount FROM sales \
         GROUP BY region ORDER BY amount DESC LIMIT 3"
    );
}

#[test]
fn test_sql_server_uses_leading_top_instead_of_limit() {
    let source = sales_source("ds1");
    let config = ChartConfig { limit: Some(5), offset: Some(10), ..bar_config() };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);

    let mssql = build_query(&spec, Dialect::SqlServer);
    assert!(mssql.starts_with("SELECT TOP 5 "));
    assert!(!mssql.contains("LIMIT"));
    assert!(!mssql.contains("OFFSET"));

    let mysql = build_query(&spec, Dialect::MySql);
    assert!(!mysql.contains("TOP"));
    assert!(mysql.ends_with("LIMIT 5 OFFSET 10"));
}

#[test]
fn test_zero_offset_is_omitted() {
    let source = sales_source("ds1");
    let config = ChartConfig { limit: Some(5), offset: Some(0), ..bar_config() };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    let sql = build_query(&spec, Dialect::Postgres);
    assert!(sql.ends_with("LIMIT 5"));
}

#[test]
fn test_count_distinct_renders_inside_count() {
    let source = sales_source("ds1");
    let config = ChartConfig {
        aggregation: Some("distinct".to_string()),
        ..bar_config()
    };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    let sql = build_query(&spec, Dialect::MySql);
    assert!(sql.contains("COUNT(DISTINCT amount) AS amount"));
}

#[test]
fn test_sanitize_identifier_strips_injection_characters() {
    assert_eq!(sanitize_identifier("amount; DROP TABLE users--"), "amountDROPTABLEusers");
    assert_eq!(sanitize_identifier("schema.table_1"), "schema.table_1");
    assert_eq!(sanitize_identifier("a' OR '1'='1"), "aOR11");
}

#[test]
fn test_filter_values_are_quoted_and_escaped() {
    let source = sales_source("ds1");
    let config = ChartConfig {
        filters: vec![FilterPredicate {
            field: "region".to_string(),
            operator: FilterOperator::Eq,
            value: json!("O'Brien"),
        }],
        ..bar_config()
    };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    let sql = build_query(&spec, Dialect::MySql);
    assert!(sql.contains("WHERE region = 'O''Brien'"));
}

#[test]
fn test_in_filter_renders_value_list() {
    let source = sales_source("ds1");
    let config = ChartConfig {
        filters: vec![FilterPredicate {
            field: "region".to_string(),
            operator: FilterOperator::In,
            value: json!(["East", "West"]),
        }],
        ..bar_config()
    };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    let sql = build_query(&spec, Dialect::MySql);
    assert!(sql.contains("region IN ('East', 'West')"));
}

#[test]
fn test_like_filter_wraps_bare_pattern_in_wildcards() {
    let source = sales_source("ds1");
    let config = ChartConfig {
        filters: vec![FilterPredicate {
            field: "region".to_string(),
            operator: FilterOperator::Like,
            value: json!("Ea"),
        }],
        ..bar_config()
    };
    let spec = translate_chart_config(ChartType::Bar, &config, &source);
    let sql = build_query(&spec, Dialect::MySql);
    assert!(sql.contains("region LIKE '%Ea%'"));
}

#[test]
fn test_schema_qualified_table() {
    let mut source = sales_source("ds1");
    source.schema = Some("analytics".to_string());
    let spec = translate_chart_config(ChartType::Bar, &bar_config(), &source);
    assert_eq!(spec.table, "analytics.sales");
    assert!(build_query(&spec, Dialect::MySql).contains("FROM analytics.sales"));
}
