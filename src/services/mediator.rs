//! Privacy-preserving analysis mediator.
//!
//! Hard boundary: raw row values never cross into the language-model call.
//! The model sees the question, the column/type schema, optionally a
//! handful of synthesized dummy rows, and a terse derived fact - either a
//! coarse label or the locally computed aggregate scalar(s). The chart-ready
//! data is reconstructed from the local result only, never from model
//! output.

use std::sync::Arc;

use serde_json::{Value, json};

use super::llm_client::{LanguageModel, LlmError};
use crate::models::{
    AnalysisResult, ChartDatum, ColumnProfile, GroupTotal, Row, TrendPoint, ValueKind,
};

/// User-visible degradation for any mediation failure.
pub const FALLBACK_ANSWER: &str =
    "Sorry, I couldn't analyze that question. Please try rephrasing it.";

const SYSTEM_PROMPT: &str = "You are a data analyst assistant embedded in a dashboard. \
You receive a user question, the column schema of their dataset, and a derived fact that \
was computed locally from the real data. Answer the question in one or two sentences using \
ONLY the derived fact - never invent, estimate or extrapolate numbers. If the fact does not \
answer the question, say what analysis the user could run instead. Respond with a JSON \
object: {\"answer\": string, \"chart_type\": one of \"bar\", \"line\", \"pie\", \"kpi\", \
\"table\" or null}.";

/// How many leading rows the schema summarizer inspects.
const SAMPLE_PREFIX: usize = 100;

/// Raw record sets are capped before they enter the local result.
const MAX_RECORDS: usize = 20;

#[derive(Debug, Clone)]
pub struct MediatedAnswer {
    pub answer: String,
    pub chart_type: Option<String>,
    pub chart_data: Vec<ChartDatum>,
}

impl MediatedAnswer {
    fn fallback() -> Self {
        Self { answer: FALLBACK_ANSWER.to_string(), chart_type: None, chart_data: Vec::new() }
    }
}

pub struct AnalysisMediator {
    llm: Arc<dyn LanguageModel>,
}

impl AnalysisMediator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Answer a free-text question over the given rows. `precomputed` is the
    /// classified result of an already-executed query, used as-is when the
    /// upstream request carried a chart configuration.
    pub async fn ask(
        &self,
        question: &str,
        rows: &[Row],
        precomputed: Option<AnalysisResult>,
    ) -> MediatedAnswer {
        match self.mediate(question, rows, precomputed).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Analysis mediation degraded to fallback: {}", e);
                MediatedAnswer::fallback()
            },
        }
    }

    async fn mediate(
        &self,
        question: &str,
        rows: &[Row],
        precomputed: Option<AnalysisResult>,
    ) -> Result<MediatedAnswer, LlmError> {
        let profile = summarize_schema(rows);
        let result =
            precomputed.unwrap_or_else(|| analyze_locally(question, rows, &profile));
        let fact = derived_fact(&result);

        let payload = json!({
            "question": question,
            "schema": profile,
            "synthetic_examples": synthesize_dummy_rows(&profile, 3),
            "derived_fact": fact,
        });

        let completion = self
            .llm
            .complete(SYSTEM_PROMPT, &payload.to_string())
            .await?;

        Ok(MediatedAnswer {
            answer: completion.answer,
            chart_type: completion.chart_type,
            chart_data: chart_data(&result),
        })
    }
}

/// Infer a column/type schema from a bounded row prefix.
pub fn summarize_schema(rows: &[Row]) -> Vec<ColumnProfile> {
    let sample = &rows[..rows.len().min(SAMPLE_PREFIX)];
    let mut columns: Vec<String> = Vec::new();
    for row in sample {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    columns
        .into_iter()
        .map(|name| {
            let kind = sample
                .iter()
                .filter_map(|row| row.get(&name))
                .filter(|v| !v.is_null())
                .map(classify_value)
                .reduce(merge_kinds)
                .unwrap_or(ValueKind::String);
            ColumnProfile { name, kind }
        })
        .collect()
}

fn classify_value(value: &Value) -> ValueKind {
    match value {
        Value::Bool(_) => ValueKind::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() { ValueKind::Integer } else { ValueKind::Float }
        },
        Value::String(s) => classify_string(s),
        _ => ValueKind::String,
    }
}

fn classify_string(s: &str) -> ValueKind {
    let trimmed = s.trim();
    if trimmed.parse::<i64>().is_ok() {
        return ValueKind::Integer;
    }
    if trimmed.parse::<f64>().is_ok() {
        return ValueKind::Float;
    }
    if matches!(trimmed.to_lowercase().as_str(), "true" | "false") {
        return ValueKind::Boolean;
    }
    if looks_like_date(trimmed) {
        return ValueKind::Date;
    }
    ValueKind::String
}

// "2024-06-01", "2024/06/01" or anything starting that way.
fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 8
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && (bytes[4] == b'-' || bytes[4] == b'/')
}

fn merge_kinds(a: ValueKind, b: ValueKind) -> ValueKind {
    match (a, b) {
        (x, y) if x == y => x,
        (ValueKind::Integer, ValueKind::Float) | (ValueKind::Float, ValueKind::Integer) => {
            ValueKind::Float
        },
        _ => ValueKind::String,
    }
}

/// Plausible rows generated purely from the type+name heuristic, for
/// structural context in the prompt. Never sampled from real data.
pub fn synthesize_dummy_rows(profile: &[ColumnProfile], count: usize) -> Vec<Row> {
    (1..=count)
        .map(|i| {
            let mut row = Row::new();
            for column in profile {
                row.insert(column.name.clone(), dummy_value(column, i));
            }
            row
        })
        .collect()
}

fn dummy_value(column: &ColumnProfile, i: usize) -> Value {
    let lower = column.name.to_lowercase();
    match column.kind {
        ValueKind::Integer => {
            if lower.contains("id") { Value::from(i as i64) } else { Value::from((i * 7) as i64) }
        },
        ValueKind::Float => Value::from(i as f64 * 10.0 + 0.5),
        ValueKind::Date => Value::String(format!("2024-{:02}-15", i)),
        ValueKind::Boolean => Value::Bool(i % 2 == 0),
        ValueKind::String => {
            if lower.contains("name") {
                Value::String(format!("Sample {} {}", column.name, i))
            } else {
                Value::String(format!("{}_{}", column.name, i))
            }
        },
    }
}

// Ordered keyword rules; first match routes the question.
enum AnalysisRoute {
    Total,
    Average,
    Count,
    Max,
    Min,
    Trend,
    Group,
    Preview,
}

fn route_question(question: &str) -> AnalysisRoute {
    let q = question.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| q.contains(n));
    if has(&["total", "sum"]) {
        AnalysisRoute::Total
    } else if has(&["average", "mean"]) {
        AnalysisRoute::Average
    } else if has(&["count", "how many"]) {
        AnalysisRoute::Count
    } else if has(&["max", "highest"]) {
        AnalysisRoute::Max
    } else if has(&["min", "lowest"]) {
        AnalysisRoute::Min
    } else if has(&["trend", "over time"]) {
        AnalysisRoute::Trend
    } else if has(&["group", "by "]) {
        AnalysisRoute::Group
    } else {
        AnalysisRoute::Preview
    }
}

/// Deterministic analyzer computing the true answer on the real in-memory
/// rows. Runs entirely locally.
pub fn analyze_locally(question: &str, rows: &[Row], profile: &[ColumnProfile]) -> AnalysisResult {
    use super::tabular_engine::numeric_value;

    let numeric_column = pick_numeric_column(question, profile);
    let values = |column: &str| -> Vec<f64> {
        rows.iter()
            .filter_map(|row| row.get(column))
            .filter_map(numeric_value)
            .collect()
    };

    match route_question(question) {
        AnalysisRoute::Total => match numeric_column {
            Some(column) => AnalysisResult::KpiValue {
                value: values(&column).iter().sum(),
                unit: column,
            },
            None => records_preview(rows),
        },
        AnalysisRoute::Average => match numeric_column {
            Some(column) => {
                let vals = values(&column);
                if vals.is_empty() {
                    records_preview(rows)
                } else {
                    AnalysisResult::KpiValue {
                        value: vals.iter().sum::<f64>() / vals.len() as f64,
                        unit: column,
                    }
                }
            },
            None => records_preview(rows),
        },
        AnalysisRoute::Count => AnalysisResult::KpiValue {
            value: rows.len() as f64,
            unit: "records".to_string(),
        },
        AnalysisRoute::Max => match numeric_column {
            Some(column) => match values(&column).into_iter().reduce(f64::max) {
                Some(value) => AnalysisResult::KpiValue { value, unit: column },
                None => records_preview(rows),
            },
            None => records_preview(rows),
        },
        AnalysisRoute::Min => match numeric_column {
            Some(column) => match values(&column).into_iter().reduce(f64::min) {
                Some(value) => AnalysisResult::KpiValue { value, unit: column },
                None => records_preview(rows),
            },
            None => records_preview(rows),
        },
        AnalysisRoute::Trend => match (pick_date_column(profile), numeric_column) {
            (Some(date_column), Some(value_column)) => {
                let mut points = group_sums(rows, &date_column, &value_column);
                points.sort_by(|a, b| a.0.cmp(&b.0));
                AnalysisResult::Trend {
                    points: points
                        .into_iter()
                        .map(|(period, value)| TrendPoint { period, value })
                        .collect(),
                }
            },
            _ => records_preview(rows),
        },
        AnalysisRoute::Group => match (pick_category_column(question, profile), numeric_column) {
            (Some(category), Some(value_column)) => {
                let mut groups = group_sums(rows, &category, &value_column);
                groups.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                });
                AnalysisResult::Grouped {
                    groups: groups
                        .into_iter()
                        .map(|(name, value)| GroupTotal { name, value })
                        .collect(),
                }
            },
            _ => records_preview(rows),
        },
        AnalysisRoute::Preview => records_preview(rows),
    }
}

/// Classify rows an already-executed query produced: a single aggregate
/// cell, a multi-column single row, or a small grouped result are reusable
/// as-is; anything larger is not a derived aggregate and stays local.
pub fn classify_precomputed(rows: &[Row]) -> Option<AnalysisResult> {
    use super::tabular_engine::numeric_value;

    match rows {
        [] => None,
        [row] if row.len() == 1 => {
            let (name, value) = row.iter().next()?;
            Some(AnalysisResult::KpiValue {
                value: numeric_value(value)?,
                unit: name.clone(),
            })
        },
        [row] => Some(AnalysisResult::SingleRow { columns: row.clone() }),
        rows if rows.len() <= MAX_RECORDS => {
            let groups: Vec<GroupTotal> = rows
                .iter()
                .filter_map(|row| {
                    let mut name = None;
                    let mut value = None;
                    for (key, cell) in row {
                        match numeric_value(cell) {
                            Some(n) if value.is_none() => value = Some(n),
                            None if name.is_none() => {
                                name = Some(cell.as_str().unwrap_or(key.as_str()).to_string())
                            },
                            _ => {},
                        }
                    }
                    Some(GroupTotal { name: name?, value: value? })
                })
                .collect();
            if groups.len() == rows.len() { Some(AnalysisResult::Grouped { groups }) } else { None }
        },
        _ => None,
    }
}

fn records_preview(rows: &[Row]) -> AnalysisResult {
    AnalysisResult::Records { rows: rows.iter().take(MAX_RECORDS).cloned().collect() }
}

fn group_sums(rows: &[Row], key_column: &str, value_column: &str) -> Vec<(String, f64)> {
    use super::tabular_engine::numeric_value;

    let mut order: Vec<String> = Vec::new();
    let mut sums: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    for row in rows {
        let key = row
            .get(key_column)
            .and_then(|v| v.as_str().map(String::from).or_else(|| Some(v.to_string())))
            .unwrap_or_default();
        let value = row.get(value_column).and_then(numeric_value).unwrap_or(0.0);
        if !sums.contains_key(&key) {
            order.push(key.clone());
        }
        *sums.entry(key).or_insert(0.0) += value;
    }
    order
        .into_iter()
        .map(|key| {
            let value = sums[&key];
            (key, value)
        })
        .collect()
}

fn pick_numeric_column(question: &str, profile: &[ColumnProfile]) -> Option<String> {
    let q = question.to_lowercase();
    let numeric: Vec<&ColumnProfile> =
        profile.iter().filter(|c| c.kind.is_numeric()).collect();
    numeric
        .iter()
        .find(|c| q.contains(&c.name.to_lowercase()))
        .or_else(|| numeric.first())
        .map(|c| c.name.clone())
}

fn pick_date_column(profile: &[ColumnProfile]) -> Option<String> {
    profile
        .iter()
        .find(|c| c.kind == ValueKind::Date)
        .or_else(|| {
            profile.iter().find(|c| {
                let lower = c.name.to_lowercase();
                lower.contains("date") || lower.contains("time")
            })
        })
        .map(|c| c.name.clone())
}

fn pick_category_column(question: &str, profile: &[ColumnProfile]) -> Option<String> {
    let q = question.to_lowercase();
    let categorical: Vec<&ColumnProfile> = profile
        .iter()
        .filter(|c| c.kind == ValueKind::String)
        .collect();
    categorical
        .iter()
        .find(|c| q.contains(&c.name.to_lowercase()))
        .or_else(|| categorical.first())
        .map(|c| c.name.clone())
}

/// The terse fact that crosses the LLM boundary. Aggregate scalars are
/// allowed; raw record sets degrade to a coarse label with no values.
fn derived_fact(result: &AnalysisResult) -> String {
    match result {
        AnalysisResult::KpiValue { value, unit } => {
            format!("locally computed aggregate: {} = {}", unit, format_number(*value))
        },
        AnalysisResult::SingleRow { columns } => {
            let parts: Vec<String> = columns
                .iter()
                .map(|(k, v)| format!("{} = {}", k, render_scalar(v)))
                .collect();
            format!("locally computed summary row: {}", parts.join(", "))
        },
        AnalysisResult::Trend { points } => {
            let parts: Vec<String> = points
                .iter()
                .take(12)
                .map(|p| format!("{} = {}", p.period, format_number(p.value)))
                .collect();
            format!("locally computed trend over {} periods: {}", points.len(), parts.join(", "))
        },
        AnalysisResult::Grouped { groups } => {
            let parts: Vec<String> = groups
                .iter()
                .take(10)
                .map(|g| format!("{} = {}", g.name, format_number(g.value)))
                .collect();
            format!("locally computed totals for {} groups: {}", groups.len(), parts.join(", "))
        },
        AnalysisResult::Records { rows } => {
            format!("a table of {} matching records is available locally", rows.len())
        },
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{:.2}", n)
    }
}

/// Chart-ready data reconstructed from the local result only.
fn chart_data(result: &AnalysisResult) -> Vec<ChartDatum> {
    use super::tabular_engine::numeric_value;

    match result {
        AnalysisResult::KpiValue { value, unit } => {
            vec![ChartDatum { name: unit.clone(), value: *value }]
        },
        AnalysisResult::SingleRow { columns } => columns
            .iter()
            .filter_map(|(name, v)| {
                numeric_value(v).map(|value| ChartDatum { name: name.clone(), value })
            })
            .collect(),
        AnalysisResult::Trend { points } => points
            .iter()
            .map(|p| ChartDatum { name: p.period.clone(), value: p.value })
            .collect(),
        AnalysisResult::Grouped { groups } => groups
            .iter()
            .map(|g| ChartDatum { name: g.name.clone(), value: g.value })
            .collect(),
        AnalysisResult::Records { .. } => Vec::new(),
    }
}
