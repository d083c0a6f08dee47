//! Unpaged streaming tests
//!
//! The test database has a single pooled connection, so a stream that kept
//! its connection after being dropped would block every later query.

mod common;

use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;

use common::{ACME, setup};
use preboot_query::{FilterCriteria, SearchParams, SortDirection, TenantScope};

#[tokio::test]
async fn test_stream_yields_every_scoped_record_in_order() {
    let (_db, engine) = setup().await;
    engine.set_predicate_provider(TenantScope::new("tenantId", ACME));

    // Paging fields are ignored when streaming.
    let params = SearchParams::new().with_page(3, 2);
    let records: Vec<_> = engine
        .stream("Order", None, &params)
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;

    let ids: Vec<i64> = records.iter().filter_map(|r| r.i64("id")).collect();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_stream_assembles_projection_collections() {
    let (_db, engine) = setup().await;
    let params = SearchParams::new()
        .with_criteria(FilterCriteria::lte("id", 2))
        .sorted_by("amount", SortDirection::Desc);

    let records: Vec<_> = engine
        .stream("Order", Some("OrderSummary"), &params)
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].i64("id"), Some(2));
    assert_eq!(records[0].records("items").len(), 1);
    assert_eq!(records[1].i64("id"), Some(1));

    let codes: Vec<_> = records[1]
        .records("items")
        .iter()
        .filter_map(|item| item.str("code"))
        .collect();
    assert_eq!(codes, vec!["PROD-A", "PROD-B"]);
}

#[tokio::test]
async fn test_dropped_stream_releases_its_connection() {
    let (_db, engine) = setup().await;

    let mut stream = engine.stream("Order", None, &SearchParams::new()).unwrap();
    let first = stream.next().await.expect("at least one record").unwrap();
    assert_eq!(first.i64("id"), Some(1));
    drop(stream);

    let page = tokio::time::timeout(
        Duration::from_secs(5),
        engine.search("Order", None, &SearchParams::new().with_page(0, 1)),
    )
    .await
    .expect("connection returned to the pool")
    .unwrap();
    assert_eq!(page.total_elements, 25);
}

#[tokio::test]
async fn test_stream_compile_errors_are_immediate() {
    let (_db, engine) = setup().await;
    let params = SearchParams::new().with_criteria(FilterCriteria::eq("missing", 1));
    assert!(engine.stream("Order", None, &params).is_err());
}
