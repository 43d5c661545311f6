use serde_json::json;

use crate::models::{
    AggregationKind, AnalysisResult, ChartConfig, ChartMapping, ChartType, DataSourceDescriptor,
    Relationship, RelationshipKind, SortOrder,
};

#[test]
fn test_chart_type_deserializes_snake_case_and_unknowns() {
    assert_eq!(serde_json::from_value::<ChartType>(json!("bar")).unwrap(), ChartType::Bar);
    assert_eq!(
        serde_json::from_value::<ChartType>(json!("big_number")).unwrap(),
        ChartType::BigNumber
    );
    // Unknown chart types are accepted, not rejected.
    assert_eq!(
        serde_json::from_value::<ChartType>(json!("treemap")).unwrap(),
        ChartType::Unknown
    );
}

#[test]
fn test_chart_config_accepts_numeric_string_counts() {
    let config: ChartConfig =
        serde_json::from_value(json!({"xAxis": "region", "limit": "3", "offset": 7})).unwrap();
    assert_eq!(config.x_axis.as_deref(), Some("region"));
    assert_eq!(config.limit, Some(3));
    assert_eq!(config.offset, Some(7));

    // Garbage counts read as absent rather than failing the request.
    let config: ChartConfig = serde_json::from_value(json!({"limit": "lots"})).unwrap();
    assert_eq!(config.limit, None);
}

#[test]
fn test_chart_mapping_pie_falls_back_to_axis_fields() {
    let config: ChartConfig =
        serde_json::from_value(json!({"xAxis": "region", "yAxis": "amount"})).unwrap();
    let mapping = ChartMapping::from_config(ChartType::Pie, &config);
    assert_eq!(
        mapping,
        ChartMapping::CategoryValue { category: "region".to_string(), value: "amount".to_string() }
    );
}

#[test]
fn test_chart_mapping_kpi_prefers_metric_field() {
    let config: ChartConfig =
        serde_json::from_value(json!({"metric": "revenue", "yAxis": "amount"})).unwrap();
    let mapping = ChartMapping::from_config(ChartType::Kpi, &config);
    assert_eq!(mapping, ChartMapping::SingleValue { metric: "revenue".to_string() });
}

#[test]
fn test_aggregation_parse_lenient_defaults_to_sum() {
    assert_eq!(AggregationKind::parse_lenient("AVG"), AggregationKind::Avg);
    assert_eq!(AggregationKind::parse_lenient("mean"), AggregationKind::Avg);
    assert_eq!(AggregationKind::parse_lenient("distinct"), AggregationKind::CountDistinct);
    assert_eq!(AggregationKind::parse_lenient("median"), AggregationKind::Sum);
    assert_eq!(AggregationKind::parse_lenient(""), AggregationKind::Sum);
}

#[test]
fn test_sort_order_defaults_to_desc() {
    assert_eq!(SortOrder::default(), SortOrder::Desc);
    assert_eq!(serde_json::from_value::<SortOrder>(json!("asc")).unwrap(), SortOrder::Asc);
}

#[test]
fn test_data_source_password_never_serializes() {
    let source: DataSourceDescriptor = serde_json::from_value(json!({
        "id": "ds1",
        "dialect": "mysql",
        "table": "sales",
        "columns": [{"name": "amount", "type": "number"}],
        "kind": "live_database",
        "connection": {
            "host": "db.internal",
            "port": 3306,
            "username": "reader",
            "password": "hunter2",
            "database": "analytics"
        }
    }))
    .unwrap();

    let text = serde_json::to_string(&source).unwrap();
    assert!(!text.contains("hunter2"));
    assert!(!text.contains("password"));
    assert_eq!(source.connection.unwrap().password.as_deref(), Some("hunter2"));
}

#[test]
fn test_relationship_serializes_camel_case_with_confidence() {
    let rel = Relationship {
        left_table: "orders".to_string(),
        left_column: "customer_id".to_string(),
        right_table: "customers".to_string(),
        right_column: "id".to_string(),
        confidence: 0.9,
        kind: RelationshipKind::PrimaryForeign,
    };

    let value = serde_json::to_value(&rel).unwrap();
    assert_eq!(value["leftTable"], json!("orders"));
    assert_eq!(value["confidence"], json!(0.9));
    assert_eq!(value["kind"], json!("primary-foreign"));
}

#[test]
fn test_analysis_result_is_tagged_by_kind() {
    let kpi = AnalysisResult::KpiValue { value: 600.0, unit: "revenue".to_string() };
    let value = serde_json::to_value(&kpi).unwrap();
    assert_eq!(value["kind"], json!("kpi_value"));
    assert_eq!(value["value"], json!(600.0));
}
