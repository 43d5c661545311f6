use crate::models::{RelationshipKind, TableSchema};
use crate::services::{generate_join_clauses, infer_relationships};

fn table(name: &str, columns: &[&str]) -> TableSchema {
    TableSchema {
        name: name.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
    }
}

#[test]
fn test_foreign_key_pattern_scores_highest() {
    let tables = vec![
        table("orders", &["id", "customer_id", "total"]),
        table("customers", &["id", "name"]),
    ];

    let relationships = infer_relationships(&tables);

    let fk = relationships
        .iter()
        .find(|r| r.left_column == "customer_id")
        .unwrap();
    assert_eq!(fk.left_table, "orders");
    assert_eq!(fk.right_table, "customers");
    assert_eq!(fk.right_column, "id");
    assert_eq!(fk.kind, RelationshipKind::PrimaryForeign);
    assert_eq!(fk.confidence, 0.9);
}

#[test]
fn test_inference_is_symmetric_in_table_order() {
    let a = vec![
        table("orders", &["id", "customer_id"]),
        table("customers", &["id", "name"]),
    ];
    let b = vec![
        table("customers", &["id", "name"]),
        table("orders", &["id", "customer_id"]),
    ];

    let first = infer_relationships(&a);
    let second = infer_relationships(&b);
    assert_eq!(first, second);
}

#[test]
fn test_exact_name_match_skips_stoplist_columns() {
    let tables = vec![
        table("orders", &["id", "name", "status", "warehouse_code"]),
        table("shipments", &["id", "name", "status", "warehouse_code"]),
    ];

    let relationships = infer_relationships(&tables);

    // Only warehouse_code survives; id/name/status are too generic.
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].left_column, "warehouse_code");
    assert_eq!(relationships[0].kind, RelationshipKind::NameMatch);
    assert_eq!(relationships[0].confidence, 0.7);
}

#[test]
fn test_duplicate_pairs_keep_highest_confidence() {
    // customer_id -> customers.id matches both the FK pass (0.9) and the
    // pattern pass (0.8); only the 0.9 relationship may survive dedup.
    let tables = vec![
        table("orders", &["customer_id"]),
        table("customers", &["id"]),
    ];

    let relationships = infer_relationships(&tables);

    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].confidence, 0.9);
    assert_eq!(relationships[0].kind, RelationshipKind::PrimaryForeign);
}

#[test]
fn test_results_sorted_confidence_descending() {
    let tables = vec![
        table("orders", &["id", "customer_id", "warehouse_code"]),
        table("customers", &["id", "warehouse_code"]),
    ];

    let relationships = infer_relationships(&tables);

    assert!(relationships.len() >= 2);
    for pair in relationships.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
}

#[test]
fn test_unrelated_tables_produce_nothing() {
    let tables = vec![
        table("products", &["sku", "price"]),
        table("employees", &["badge", "department"]),
    ];
    assert!(infer_relationships(&tables).is_empty());
}

#[test]
fn test_plural_table_name_tolerance() {
    let tables = vec![
        table("order_items", &["id", "product_id"]),
        table("products", &["id", "title"]),
    ];

    let relationships = infer_relationships(&tables);
    let fk = relationships
        .iter()
        .find(|r| r.kind == RelationshipKind::PrimaryForeign)
        .unwrap();
    assert_eq!(fk.left_column, "product_id");
    assert_eq!(fk.right_table, "products");
}

#[test]
fn test_join_clauses_chain_from_start_table() {
    let tables = vec![
        table("orders", &["id", "customer_id", "product_id"]),
        table("customers", &["id", "name"]),
        table("products", &["id", "title"]),
    ];
    let relationships = infer_relationships(&tables);

    let clauses = generate_join_clauses(&relationships, "orders", 0.8);

    assert_eq!(clauses.len(), 2);
    assert!(clauses.iter().any(|c| c == "LEFT JOIN customers ON orders.customer_id = customers.id"));
    assert!(clauses.iter().any(|c| c == "LEFT JOIN products ON orders.product_id = products.id"));
}

#[test]
fn test_join_clauses_respect_confidence_floor() {
    let tables = vec![
        table("orders", &["id", "warehouse_code"]),
        table("shipments", &["id", "warehouse_code"]),
    ];
    let relationships = infer_relationships(&tables);
    assert_eq!(relationships.len(), 1);

    // The 0.7 name match never joins at the default 0.8 floor.
    assert!(generate_join_clauses(&relationships, "orders", 0.8).is_empty());
    assert_eq!(generate_join_clauses(&relationships, "orders", 0.7).len(), 1);
}

#[test]
fn test_unreachable_tables_are_omitted_from_joins() {
    let tables = vec![
        table("orders", &["id", "customer_id"]),
        table("customers", &["id"]),
        table("inventory", &["sku", "count"]),
    ];
    let relationships = infer_relationships(&tables);

    let clauses = generate_join_clauses(&relationships, "orders", 0.8);
    assert_eq!(clauses.len(), 1);
    assert!(!clauses.iter().any(|c| c.contains("inventory")));
}

#[test]
fn test_joins_never_revisit_a_table() {
    let tables = vec![
        table("orders", &["id", "customer_id"]),
        table("customers", &["id", "customer_id"]),
    ];
    let relationships = infer_relationships(&tables);

    let clauses = generate_join_clauses(&relationships, "orders", 0.5);
    assert_eq!(clauses.len(), 1);
}
