//! In-process execution for tabular-file sources.
//!
//! Runs the same pipeline the compiled SQL describes, entirely in memory:
//! filter -> group/aggregate -> sort -> limit/offset. Aggregation semantics
//! mirror SQL: avg divides by the per-group contributing-row count, min/max
//! are seeded at +/- infinity so all-negative and all-positive value sets
//! aggregate correctly, and a metrics-only spec collapses the whole table
//! into a single row.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::models::{AggregationKind, FilterOperator, FilterPredicate, QuerySpec, Row, SortOrder};

pub fn execute(spec: &QuerySpec, rows: &[Row]) -> Vec<Row> {
    let filtered: Vec<&Row> = rows
        .iter()
        .filter(|row| spec.filters.iter().all(|f| matches_filter(f, row)))
        .collect();

    let mut result = if spec.metrics.is_empty() {
        project(spec, &filtered)
    } else {
        aggregate(spec, &filtered)
    };

    if let Some(sort_by) = &spec.sort_by {
        sort_rows(&mut result, sort_by, spec.sort_order);
    }

    paginate(result, spec.limit, spec.offset)
}

/// Parse a cell as a number. Accepts JSON numbers and numeric strings, the
/// two shapes tabular-file rows arrive in.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// No metrics: plain projection of the dimension columns (or the full rows
// when no dimensions were mapped either).
fn project(spec: &QuerySpec, rows: &[&Row]) -> Vec<Row> {
    if spec.dimensions.is_empty() {
        return rows.iter().map(|row| (*row).clone()).collect();
    }
    rows.iter()
        .map(|row| {
            let mut out = Row::new();
            for dim in &spec.dimensions {
                out.insert(
                    dim.field.clone(),
                    row.get(&dim.field).cloned().unwrap_or(Value::Null),
                );
            }
            out
        })
        .collect()
}

struct Accumulator {
    sum: f64,
    contributing: u64,
    row_count: u64,
    min: f64,
    max: f64,
    distinct: HashSet<String>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            contributing: 0,
            row_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            distinct: HashSet::new(),
        }
    }

    fn observe(&mut self, value: Option<&Value>) {
        self.row_count += 1;
        let Some(value) = value else { return };
        if let Some(n) = numeric_value(value) {
            self.sum += n;
            self.contributing += 1;
            self.min = self.min.min(n);
            self.max = self.max.max(n);
        }
        if !value.is_null() {
            self.distinct.insert(render_text(value));
        }
    }

    fn finalize(&self, aggregation: AggregationKind) -> Value {
        match aggregation {
            AggregationKind::Sum => number_json(self.sum),
            AggregationKind::Avg => {
                if self.contributing == 0 {
                    Value::Null
                } else {
                    number_json(self.sum / self.contributing as f64)
                }
            },
            AggregationKind::Count => number_json(self.row_count as f64),
            AggregationKind::Min => {
                if self.contributing == 0 { Value::Null } else { number_json(self.min) }
            },
            AggregationKind::Max => {
                if self.contributing == 0 { Value::Null } else { number_json(self.max) }
            },
            AggregationKind::CountDistinct => number_json(self.distinct.len() as f64),
        }
    }
}

struct Group {
    dimension_values: Vec<Value>,
    accumulators: Vec<Accumulator>,
}

fn aggregate(spec: &QuerySpec, rows: &[&Row]) -> Vec<Row> {
    // First-seen group order; the sort pass below decides the final order.
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for row in rows {
        let key: Vec<String> = spec
            .dimensions
            .iter()
            .map(|d| row.get(&d.field).map(render_text).unwrap_or_default())
            .collect();

        let slot = *index.entry(key).or_insert_with_key(|_| {
            groups.push(Group {
                dimension_values: spec
                    .dimensions
                    .iter()
                    .map(|d| row.get(&d.field).cloned().unwrap_or(Value::Null))
                    .collect(),
                accumulators: spec.metrics.iter().map(|_| Accumulator::new()).collect(),
            });
            groups.len() - 1
        });

        for (metric, acc) in spec.metrics.iter().zip(&mut groups[slot].accumulators) {
            acc.observe(row.get(&metric.field));
        }
    }

    // Metrics-only with zero input rows still yields one aggregate row.
    if groups.is_empty() && spec.dimensions.is_empty() {
        groups.push(Group {
            dimension_values: Vec::new(),
            accumulators: spec.metrics.iter().map(|_| Accumulator::new()).collect(),
        });
    }

    groups
        .into_iter()
        .map(|group| {
            let mut out = Row::new();
            for (dim, value) in spec.dimensions.iter().zip(group.dimension_values) {
                out.insert(dim.field.clone(), value);
            }
            for (metric, acc) in spec.metrics.iter().zip(&group.accumulators) {
                out.insert(metric.field.clone(), acc.finalize(metric.aggregation));
            }
            out
        })
        .collect()
}

fn matches_filter(filter: &FilterPredicate, row: &Row) -> bool {
    let cell = row.get(&filter.field).unwrap_or(&Value::Null);
    match filter.operator {
        FilterOperator::Eq => loosely_equal(cell, &filter.value),
        FilterOperator::Ne => !loosely_equal(cell, &filter.value),
        FilterOperator::Gt => compare_numeric(cell, &filter.value, |o| o > 0.0),
        FilterOperator::Lt => compare_numeric(cell, &filter.value, |o| o < 0.0),
        FilterOperator::Gte => compare_numeric(cell, &filter.value, |o| o >= 0.0),
        FilterOperator::Lte => compare_numeric(cell, &filter.value, |o| o <= 0.0),
        FilterOperator::In => match &filter.value {
            Value::Array(items) => items.iter().any(|item| loosely_equal(cell, item)),
            single => loosely_equal(cell, single),
        },
        FilterOperator::Like => {
            let pattern = render_text(&filter.value).to_lowercase();
            let haystack = render_text(cell).to_lowercase();
            like_match(&haystack, &pattern)
        },
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (numeric_value(a), numeric_value(b)) {
        (Some(x), Some(y)) => x == y,
        _ => render_text(a) == render_text(b),
    }
}

fn compare_numeric(a: &Value, b: &Value, check: impl Fn(f64) -> bool) -> bool {
    match (numeric_value(a), numeric_value(b)) {
        (Some(x), Some(y)) => check(x - y),
        _ => false,
    }
}

// Substring semantics matching the compiler's LIKE rendering: a pattern
// without wildcards means "contains"; leading/trailing % anchor the match.
fn like_match(haystack: &str, pattern: &str) -> bool {
    let starts_anchored = !pattern.starts_with('%');
    let ends_anchored = !pattern.ends_with('%');
    let needle = pattern.trim_matches('%');
    match (starts_anchored, ends_anchored) {
        (true, true) => haystack == needle,
        (true, false) => haystack.starts_with(needle),
        (false, true) => haystack.ends_with(needle),
        (false, false) => haystack.contains(needle),
    }
}

fn sort_rows(rows: &mut [Row], sort_by: &str, order: SortOrder) {
    rows.sort_by(|a, b| {
        let left = a.get(sort_by).unwrap_or(&Value::Null);
        let right = b.get(sort_by).unwrap_or(&Value::Null);
        let ordering = match (numeric_value(left), numeric_value(right)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => render_text(left).cmp(&render_text(right)),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn paginate(rows: Vec<Row>, limit: Option<u64>, offset: Option<u64>) -> Vec<Row> {
    let skip = offset.unwrap_or(0) as usize;
    let take = limit.map(|l| l as usize).unwrap_or(usize::MAX);
    rows.into_iter().skip(skip).take(take).collect()
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Integral results render as JSON integers to keep chart payloads clean.
fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
