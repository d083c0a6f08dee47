//! Shared schema used by unit tests.

use crate::record::Value;
use crate::schema::{EntitySchema, FieldType, Projection, RegistryBuilder, SchemaRegistry};

pub(crate) fn order_builder() -> RegistryBuilder {
    RegistryBuilder::new()
        .with_max_join_depth(3)
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
                .collection("items", "orderItems", "OrderItemLine")
                .computed("size", |r| {
                    let amount = r.f64("amount").unwrap_or(0.0);
                    Value::Text(if amount > 1000.0 { "LARGE" } else { "SMALL" }.to_string())
                }),
        )
}

pub(crate) fn order_registry() -> SchemaRegistry {
    order_builder().freeze().expect("fixture schema is valid")
}
