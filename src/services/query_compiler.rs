//! Query compiler: chart configuration -> QuerySpec -> dialect SQL text.
//!
//! Compilation is total. An unmappable configuration falls back to the
//! generic xAxis/yAxis mapping and, at worst, compiles to a plain
//! `SELECT * FROM table` preview - it never raises.
//!
//! Identifiers are defended by stripping every character outside
//! `[A-Za-z0-9_.]`; values are always quoted and escaped, never
//! interpolated raw.

use crate::models::{
    AggregationKind, ChartConfig, ChartMapping, ChartType, DataSourceDescriptor, Dialect,
    Dimension, FilterOperator, FilterPredicate, Metric, QuerySpec, SemanticType, SourceKind,
    unique_nonempty,
};

/// Metric/dimension candidates derived from a source descriptor.
#[derive(Debug, Clone, Default)]
pub struct DatasetFields {
    pub metrics: Vec<Metric>,
    pub dimensions: Vec<Dimension>,
}

/// Column names that flag a tabular-file column as a metric candidate even
/// when its declared type is not numeric (uploaded files often carry
/// everything as strings).
const METRIC_NAME_HINTS: [&str; 4] = ["total", "amount", "price", "quantity"];

/// Derive dataset fields from the descriptor: numeric columns become metric
/// candidates, every column is a dimension candidate.
pub fn derive_dataset_fields(source: &DataSourceDescriptor) -> DatasetFields {
    let mut fields = DatasetFields::default();

    for column in &source.columns {
        let name_hints_metric = source.kind == SourceKind::TabularFile && {
            let lower = column.name.to_lowercase();
            METRIC_NAME_HINTS.iter().any(|hint| lower.contains(hint))
        };

        if column.column_type == SemanticType::Number || name_hints_metric {
            fields.metrics.push(Metric {
                name: column.name.clone(),
                field: column.name.clone(),
                aggregation: AggregationKind::Sum,
                format: None,
            });
        }

        fields.dimensions.push(Dimension {
            name: column.name.clone(),
            field: column.name.clone(),
            semantic_type: column.column_type,
        });
    }

    fields
}

/// Translate a chart configuration into a QuerySpec against the given source.
///
/// Deterministic: identical (chart type, config, dataset shape) inputs yield
/// an identical spec.
pub fn translate_chart_config(
    chart_type: ChartType,
    config: &ChartConfig,
    source: &DataSourceDescriptor,
) -> QuerySpec {
    let fields = derive_dataset_fields(source);
    let mapping = ChartMapping::from_config(chart_type, config);
    let aggregation = config.aggregation_kind();

    let (dimension_names, metric_names) = match mapping {
        ChartMapping::Xy { x_axis, y_axis } => (vec![x_axis], vec![y_axis]),
        ChartMapping::CategoryValue { category, value } => (vec![category], vec![value]),
        ChartMapping::SingleValue { metric } => (Vec::new(), vec![metric]),
        ChartMapping::Columns { dimensions } => (dimensions, Vec::new()),
        ChartMapping::Generic { dimension, metric } => {
            let mut dims: Vec<String> = dimension.into_iter().collect();
            let mut mets: Vec<String> = metric.into_iter().collect();
            // Multi-field lists supplement the generic mapping when present.
            dims.extend(config.dimensions.iter().cloned());
            mets.extend(config.metrics.iter().cloned());
            (dims, mets)
        },
    };

    let dimensions = unique_nonempty(&dimension_names)
        .into_iter()
        .map(|field| resolve_dimension(&fields, field))
        .collect::<Vec<_>>();

    let metrics = unique_nonempty(&metric_names)
        .into_iter()
        .map(|field| Metric {
            name: field.clone(),
            field,
            aggregation,
            format: None,
        })
        .collect::<Vec<_>>();

    // Grouped and single-value results stay deterministic: without an
    // explicit sort field, order by the first metric.
    let sort_by = config
        .sort_by
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| metrics.first().map(|m| m.field.clone()));

    QuerySpec {
        table: source.qualified_table(),
        metrics,
        dimensions,
        filters: config.filters.clone(),
        sort_by,
        sort_order: config.sort_order.unwrap_or_default(),
        limit: config.limit,
        offset: config.offset,
    }
}

fn resolve_dimension(fields: &DatasetFields, field: String) -> Dimension {
    fields
        .dimensions
        .iter()
        .find(|d| d.field == field)
        .cloned()
        .unwrap_or(Dimension {
            name: field.clone(),
            field,
            semantic_type: SemanticType::String,
        })
}

/// Render the QuerySpec as SQL for a dialect.
pub fn build_query(spec: &QuerySpec, dialect: Dialect) -> String {
    let mut select_list: Vec<String> = spec
        .dimensions
        .iter()
        .map(|d| sanitize_identifier(&d.field))
        .collect();

    for metric in &spec.metrics {
        let field = sanitize_identifier(&metric.field);
        let expr = match metric.aggregation {
            AggregationKind::CountDistinct => format!("COUNT(DISTINCT {})", field),
            agg => format!("{}({})", agg.sql_fn(), field),
        };
        select_list.push(format!("{} AS {}", expr, field));
    }

    let columns = if select_list.is_empty() { "*".to_string() } else { select_list.join(", ") };

    let top_clause = match (dialect.uses_top_clause(), spec.limit) {
        (true, Some(limit)) => format!("TOP {} ", limit),
        _ => String::new(),
    };

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        top_clause,
        columns,
        sanitize_identifier(&spec.table)
    );

    if !spec.filters.is_empty() {
        let predicates: Vec<String> = spec.filters.iter().map(render_predicate).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if spec.is_grouped() {
        let keys: Vec<String> = spec
            .dimensions
            .iter()
            .map(|d| sanitize_identifier(&d.field))
            .collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&keys.join(", "));
    }

    if let Some(sort_by) = &spec.sort_by {
        let field = sanitize_identifier(sort_by);
        if !field.is_empty() {
            sql.push_str(&format!(" ORDER BY {} {}", field, spec.sort_order.sql_keyword()));
        }
    }

    if !dialect.uses_top_clause()
        && let Some(limit) = spec.limit
    {
        sql.push_str(&format!(" LIMIT {}", limit));
        if let Some(offset) = spec.offset.filter(|o| *o > 0) {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }

    sql
}

/// Strip every character outside `[A-Za-z0-9_.]`. The sole injection
/// defense for identifiers.
pub fn sanitize_identifier(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

fn render_predicate(filter: &FilterPredicate) -> String {
    let field = sanitize_identifier(&filter.field);
    match filter.operator {
        FilterOperator::In => {
            let values = match &filter.value {
                serde_json::Value::Array(items) => {
                    items.iter().map(quote_value).collect::<Vec<_>>().join(", ")
                },
                other => quote_value(other),
            };
            format!("{} IN ({})", field, values)
        },
        FilterOperator::Like => {
            let raw = match &filter.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let pattern = if raw.contains('%') { raw } else { format!("%{}%", raw) };
            format!("{} LIKE '{}'", field, escape_string(&pattern))
        },
        op => format!("{} {} {}", field, op.sql_op(), quote_value(&filter.value)),
    }
}

/// Render a filter value as a SQL literal. Strings are single-quoted with
/// embedded quotes doubled; values never reach the query unescaped.
pub fn quote_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(true) => "TRUE".to_string(),
        serde_json::Value::Bool(false) => "FALSE".to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", escape_string(s)),
        other => format!("'{}'", escape_string(&other.to_string())),
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}
