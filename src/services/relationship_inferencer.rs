//! Heuristic cross-table relationship inference.
//!
//! Pairwise, name-based discovery used to auto-join independently selected
//! tables. Output is advisory: every relationship carries its confidence
//! score, and join generation takes an explicit confidence floor so
//! low-confidence matches are never auto-joined without caller opt-in.

use std::collections::{HashMap, HashSet};

use crate::models::{Relationship, RelationshipKind, TableSchema};

/// Generic column names that match across unrelated tables far too often
/// to be join evidence on their own.
const NAME_MATCH_STOPLIST: [&str; 6] = ["id", "name", "created_at", "updated_at", "status", "type"];

const FK_CONFIDENCE: f64 = 0.9;
const NAME_MATCH_CONFIDENCE: f64 = 0.7;
const PATTERN_CONFIDENCE: f64 = 0.8;

/// Infer relationships across all unordered table pairs, deduplicated by
/// direction-insensitive column pair (highest confidence wins), sorted
/// confidence-descending.
pub fn infer_relationships(tables: &[TableSchema]) -> Vec<Relationship> {
    let mut best: HashMap<(String, String, String, String), Relationship> = HashMap::new();

    for (i, left) in tables.iter().enumerate() {
        for right in tables.iter().skip(i + 1) {
            for candidate in infer_pair(left, right) {
                let key = pair_key(&candidate);
                match best.get(&key) {
                    Some(existing) if existing.confidence >= candidate.confidence => {},
                    _ => {
                        best.insert(key, candidate);
                    },
                }
            }
        }
    }

    let mut relationships: Vec<Relationship> = best.into_values().collect();
    relationships.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.left_table.cmp(&b.left_table))
            .then_with(|| a.left_column.cmp(&b.left_column))
    });
    relationships
}

// Both directions of one unordered pair.
fn infer_pair(a: &TableSchema, b: &TableSchema) -> Vec<Relationship> {
    let mut found = Vec::new();
    directed_passes(a, b, &mut found);
    directed_passes(b, a, &mut found);
    exact_name_pass(a, b, &mut found);
    found
}

fn directed_passes(from: &TableSchema, to: &TableSchema, found: &mut Vec<Relationship>) {
    let to_name = to.name.to_lowercase();
    let to_columns: Vec<String> = to.columns.iter().map(|c| c.to_lowercase()).collect();

    for column in &from.columns {
        let lower = column.to_lowercase();
        let Some(base) = lower.strip_suffix("_id") else { continue };
        if base.is_empty() {
            continue;
        }

        // Foreign-key pattern: orders.customer_id -> customers.id
        if tables_related(&to_name, base) && to_columns.iter().any(|c| c == "id") {
            found.push(Relationship {
                left_table: from.name.clone(),
                left_column: column.clone(),
                right_table: to.name.clone(),
                right_column: "id".to_string(),
                confidence: FK_CONFIDENCE,
                kind: RelationshipKind::PrimaryForeign,
            });
        }

        // Pattern match: the other side is `id` or repeats the base name,
        // and the other table's name relates to the base.
        if tables_related(&to_name, base) {
            for (idx, to_column) in to_columns.iter().enumerate() {
                if to_column == "id" || to_column == base {
                    found.push(Relationship {
                        left_table: from.name.clone(),
                        left_column: column.clone(),
                        right_table: to.name.clone(),
                        right_column: to.columns[idx].clone(),
                        confidence: PATTERN_CONFIDENCE,
                        kind: RelationshipKind::Pattern,
                    });
                }
            }
        }
    }
}

fn exact_name_pass(a: &TableSchema, b: &TableSchema, found: &mut Vec<Relationship>) {
    let b_columns: HashSet<String> = b.columns.iter().map(|c| c.to_lowercase()).collect();

    for column in &a.columns {
        let lower = column.to_lowercase();
        if NAME_MATCH_STOPLIST.contains(&lower.as_str()) {
            continue;
        }
        if b_columns.contains(&lower) {
            found.push(Relationship {
                left_table: a.name.clone(),
                left_column: column.clone(),
                right_table: b.name.clone(),
                right_column: column.clone(),
                confidence: NAME_MATCH_CONFIDENCE,
                kind: RelationshipKind::NameMatch,
            });
        }
    }
}

// Substring relation with naive plural tolerance: "customers" relates to
// "customer", "order_items" relates to "item".
fn tables_related(table_name: &str, base: &str) -> bool {
    if table_name.contains(base) || base.contains(table_name) {
        return true;
    }
    let singular = table_name.strip_suffix('s').unwrap_or(table_name);
    singular.contains(base) || base.contains(singular)
}

// Direction-insensitive dedup key.
fn pair_key(rel: &Relationship) -> (String, String, String, String) {
    let left = (rel.left_table.to_lowercase(), rel.left_column.to_lowercase());
    let right = (rel.right_table.to_lowercase(), rel.right_column.to_lowercase());
    if left <= right {
        (left.0, left.1, right.0, right.1)
    } else {
        (right.0, right.1, left.0, left.1)
    }
}

/// Greedily grow a connected join tree from `start_table`, one LEFT JOIN per
/// newly reachable table. Relationships below `min_confidence` never join;
/// tables no qualifying relationship reaches are silently omitted (they
/// remain visible in the relationship list itself).
pub fn generate_join_clauses(
    relationships: &[Relationship],
    start_table: &str,
    min_confidence: f64,
) -> Vec<String> {
    let mut joined: HashSet<String> = HashSet::new();
    joined.insert(start_table.to_lowercase());
    let mut clauses = Vec::new();

    loop {
        let next = relationships.iter().find(|rel| {
            rel.confidence >= min_confidence
                && joined.contains(&rel.left_table.to_lowercase())
                    != joined.contains(&rel.right_table.to_lowercase())
        });

        let Some(rel) = next else { break };

        let (new_table, clause) = if joined.contains(&rel.left_table.to_lowercase()) {
            (
                rel.right_table.to_lowercase(),
                format!(
                    "LEFT JOIN {} ON {}.{} = {}.{}",
                    rel.right_table,
                    rel.left_table,
                    rel.left_column,
                    rel.right_table,
                    rel.right_column
                ),
            )
        } else {
            (
                rel.left_table.to_lowercase(),
                format!(
                    "LEFT JOIN {} ON {}.{} = {}.{}",
                    rel.left_table,
                    rel.right_table,
                    rel.right_column,
                    rel.left_table,
                    rel.left_column
                ),
            )
        };

        joined.insert(new_table);
        clauses.push(clause);
    }

    clauses
}
