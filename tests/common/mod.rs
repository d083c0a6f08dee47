//! Shared setup for integration tests: an in-memory SQLite database with a
//! small order book, and the matching schema registry.

#![allow(dead_code)]

use std::sync::Arc;

use preboot_query::db::sqlite_helpers::vec_to_json;
use preboot_query::{
    Database, DatabaseConfig, EngineConfig, EntitySchema, FieldType, Projection, QueryEngine,
    SchemaRegistry, Value,
};

pub const ACME: &str = "acme";
pub const GLOBEX: &str = "globex";
pub const FIRST_REF: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

const SCHEMA: &str = r#"
CREATE TABLE categories (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    parent_code TEXT
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    status TEXT NOT NULL,
    amount REAL NOT NULL,
    flagged INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    external_ref TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    priorities TEXT NOT NULL DEFAULT '[]',
    category_code TEXT
);
CREATE TABLE order_items (
    id INTEGER PRIMARY KEY,
    order_id INTEGER NOT NULL,
    product_code TEXT NOT NULL,
    quantity INTEGER NOT NULL
);
"#;

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .register_entity(
            EntitySchema::new("Order", "orders")
                .field("id", "id", FieldType::Integer)
                .field("tenantId", "tenant_id", FieldType::Text)
                .field("status", "status", FieldType::Text)
                .field("amount", "amount", FieldType::Real)
                .field("flagged", "flagged", FieldType::Boolean)
                .field("createdAt", "created_at", FieldType::Timestamp)
                .field("externalRef", "external_ref", FieldType::Uuid)
                .field("tags", "tags", FieldType::TextArray)
                .field("priorities", "priorities", FieldType::IntegerArray)
                .nested("orderItems", "OrderItem", "id", "order_id")
                .reference("category", "Category", "category_code", "code"),
        )
        .register_entity(
            EntitySchema::new("OrderItem", "order_items")
                .field("id", "id", FieldType::Integer)
                .field("productCode", "product_code", FieldType::Text)
                .field("quantity", "quantity", FieldType::Integer),
        )
        .register_entity(
            EntitySchema::new("Category", "categories")
                .field("id", "id", FieldType::Integer)
                .field("code", "code", FieldType::Text)
                .field("name", "name", FieldType::Text)
                .reference("parent", "Category", "parent_code", "code"),
        )
        .register_projection(
            Projection::new("OrderItem", "OrderItemLine")
                .field("code", "productCode")
                .field("qty", "quantity")
                .computed("label", |r| {
                    Value::Text(format!(
                        "{} x{}",
                        r.str("code").unwrap_or("?"),
                        r.i64("qty").unwrap_or(0)
                    ))
                }),
        )
        .register_projection(
            Projection::new("Order", "OrderSummary")
                .field("id", "id")
                .field("status", "status")
                .field("amount", "amount")
                .field("categoryName", "category.name")
                .field("parentCategory", "category.parent.name")
                .collection("items", "orderItems", "OrderItemLine")
                .computed("size", |r| {
                    let amount = r.f64("amount").unwrap_or(0.0);
                    Value::Text(if amount > 1000.0 { "LARGE" } else { "SMALL" }.to_string())
                }),
        )
        .freeze()
        .expect("test schema is valid")
}

/// Orders 1..=20 belong to `acme`, 21..=25 to `globex`.
///
/// acme: every fourth order is COMPLETED, the rest PENDING; amount is
/// `id * 100`; even ids are flagged; `created_at` is 2024-01-<id>;
/// odd ids are in Sci-Fi (child of Books), even ids in Books.
pub async fn seed(db: &Database) {
    let pool = db.pool();
    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(pool).await.unwrap();
    }

    sqlx::query(
        "INSERT INTO categories (id, code, name, parent_code) VALUES \
         (1, 'BOOK', 'Books', NULL), (2, 'SCIFI', 'Sci-Fi', 'BOOK')",
    )
    .execute(pool)
    .await
    .unwrap();

    for id in 1..=25i64 {
        let (tenant, status) = if id <= 20 {
            (ACME, if id % 4 == 0 { "COMPLETED" } else { "PENDING" })
        } else {
            (GLOBEX, "COMPLETED")
        };
        let tags: Vec<&str> = match id {
            1 => vec!["urgent", "gift"],
            2 => vec!["gift"],
            _ => vec![],
        };
        let priorities: Vec<i64> = if id == 3 { vec![1, 5] } else { vec![] };
        let created_at = format!("2024-01-{:02}T00:00:00Z", id);

        sqlx::query(
            "INSERT INTO orders (id, tenant_id, status, amount, flagged, created_at, \
             external_ref, tags, priorities, category_code) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(tenant)
        .bind(status)
        .bind(id as f64 * 100.0)
        .bind(id % 2 == 0)
        .bind(created_at)
        .bind((id == 1).then_some(FIRST_REF))
        .bind(vec_to_json(&tags))
        .bind(vec_to_json(&priorities))
        .bind(if id % 2 == 1 { "SCIFI" } else { "BOOK" })
        .execute(pool)
        .await
        .unwrap();
    }

    // Inserted out of key order; children come back ordered by their key.
    for (id, order_id, code, qty) in [
        (101, 1, "PROD-B", 2),
        (100, 1, "PROD-A", 1),
        (102, 2, "PROD-A", 5),
        (103, 21, "PROD-A", 1),
    ] {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_code, quantity) VALUES (?, ?, ?, ?)",
        )
        .bind(id as i64)
        .bind(order_id as i64)
        .bind(code)
        .bind(qty as i64)
        .execute(pool)
        .await
        .unwrap();
    }
}

/// A seeded in-memory database and an engine over it.
pub async fn setup() -> (Database, QueryEngine) {
    let db = Database::connect(&DatabaseConfig::default())
        .await
        .expect("in-memory database");
    seed(&db).await;

    let config = EngineConfig::default();
    let executor = db.executor(config.stream_buffer);
    let engine = QueryEngine::new(Arc::new(registry()), config, executor);
    (db, engine)
}

pub fn ids(records: &[preboot_query::Record]) -> Vec<i64> {
    records.iter().filter_map(|r| r.i64("id")).collect()
}
