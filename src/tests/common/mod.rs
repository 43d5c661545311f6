//! Shared fixtures for the test modules.

use serde_json::{Value, json};

use crate::models::{
    ColumnDescriptor, DataSourceDescriptor, Dialect, Row, SemanticType, SourceKind,
};

/// Build a row from (column, value) pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    let mut out = Row::new();
    for (key, value) in pairs {
        out.insert((*key).to_string(), value.clone());
    }
    out
}

/// Region/amount sales rows used across the aggregation tests.
pub fn sales_rows() -> Vec<Row> {
    vec![
        row(&[("region", json!("East")), ("amount", json!(12))]),
        row(&[("region", json!("East")), ("amount", json!(8))]),
        row(&[("region", json!("West")), ("amount", json!(5))]),
    ]
}

/// Tabular-file source over the sales fixture.
pub fn sales_source(id: &str) -> DataSourceDescriptor {
    DataSourceDescriptor {
        id: id.to_string(),
        dialect: Dialect::MySql,
        table: "sales".to_string(),
        schema: None,
        columns: vec![
            ColumnDescriptor { name: "region".to_string(), column_type: SemanticType::String },
            ColumnDescriptor { name: "amount".to_string(), column_type: SemanticType::Number },
        ],
        kind: SourceKind::TabularFile,
        connection: None,
    }
}

/// Live-database variant of the same source.
pub fn live_source(id: &str, dialect: Dialect) -> DataSourceDescriptor {
    DataSourceDescriptor {
        kind: SourceKind::LiveDatabase,
        dialect,
        ..sales_source(id)
    }
}
