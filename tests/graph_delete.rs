//! Recursive Delete Tests
//!
//! - a row without child arrays is a target: it and all stored descendants go
//! - a row with child arrays is a path: it stays, only the listed children go
//! - best-effort runs report per-item failures; atomic runs roll back

mod common;

use aerograph::{GraphError, GraphOptions};
use common::{count, fixture, graph, products_model, rows, suppliers_model, Fixture};
use serde_json::json;

async fn seed(fx: &Fixture) {
    let request = graph(json!({
        "suppliers": [{
            "id": "s1",
            "name": "Acme",
            "products": [{
                "id": "p1",
                "name": "Lamp",
                "variants": [
                    {"id": "v1", "label": "S", "prices": [{"amount": 5}, {"amount": 6}]},
                    {"id": "v2", "label": "M"}
                ]
            }]
        }]
    }));
    fx.engine.create(&suppliers_model(), &request).await.unwrap();
}

#[tokio::test]
async fn test_target_row_takes_its_descendants() {
    let fx = fixture().await;
    seed(&fx).await;

    let result = fx
        .engine
        .delete(&products_model(), &graph(json!({"products": [{"id": "p1"}]})), &GraphOptions::default())
        .await
        .unwrap();

    assert!(!result.has_failures());
    assert_eq!(result.deleted_ids("products"), vec![&json!("p1")]);
    assert_eq!(result.deleted_ids("variants").len(), 2);
    assert_eq!(result.deleted_ids("prices").len(), 2);

    assert_eq!(count(&fx.db, "products").await, 0);
    assert_eq!(count(&fx.db, "variants").await, 0);
    assert_eq!(count(&fx.db, "prices").await, 0);
    assert_eq!(count(&fx.db, "suppliers").await, 1);
}

#[tokio::test]
async fn test_path_row_is_kept() {
    let fx = fixture().await;
    seed(&fx).await;

    let request = graph(json!({"products": [{"id": "p1", "variants": [{"id": "v1"}]}]}));
    let result = fx
        .engine
        .delete(&products_model(), &request, &GraphOptions::default())
        .await
        .unwrap();

    assert!(result.outcomes("products").is_empty());
    assert_eq!(result.deleted_ids("variants"), vec![&json!("v1")]);
    assert_eq!(result.deleted_ids("prices").len(), 2);

    assert_eq!(count(&fx.db, "products").await, 1);
    let variants = rows(&fx.db, "variants").await;
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0]["id"], json!("v2"));
    assert_eq!(count(&fx.db, "prices").await, 0);
}

#[tokio::test]
async fn test_rows_reached_twice_are_deleted_once() {
    let fx = fixture().await;
    seed(&fx).await;

    let request = graph(json!({
        "products": [{"id": "p1"}],
        "variants": [{"id": "v1"}, {"id": "v1"}]
    }));
    let result = fx
        .engine
        .delete(&products_model(), &request, &GraphOptions::default())
        .await
        .unwrap();

    assert!(!result.has_failures());
    assert_eq!(result.outcomes("variants").len(), 2);
    assert_eq!(result.outcomes("prices").len(), 2);
}

#[tokio::test]
async fn test_best_effort_reports_failures() {
    let fx = fixture().await;
    seed(&fx).await;

    let request = graph(json!({"variants": [{"id": "ghost"}, {"id": "v2"}]}));
    let result = fx
        .engine
        .delete(&products_model(), &request, &GraphOptions::default())
        .await
        .unwrap();

    assert!(result.has_failures());
    let outcomes = result.outcomes("variants");
    let ghost = outcomes.iter().find(|o| o.id == json!("ghost")).unwrap();
    assert!(!ghost.is_deleted());
    assert!(ghost.error.as_deref().unwrap().contains("Record not found"));
    assert_eq!(result.deleted_ids("variants"), vec![&json!("v2")]);
    assert_eq!(count(&fx.db, "variants").await, 1);

    let body = serde_json::to_value(&result).unwrap();
    assert!(body["deleteData"]["variants"].is_array());
}

#[tokio::test]
async fn test_atomic_delete_rolls_back_on_failure() {
    let fx = fixture().await;
    seed(&fx).await;

    let options = GraphOptions {
        atomic_delete: true,
        ..GraphOptions::default()
    };
    let request = graph(json!({"variants": [{"id": "v2"}, {"id": "ghost"}]}));
    let err = fx
        .engine
        .delete(&products_model(), &request, &options)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert!(matches!(err, GraphError::Operation { ref table, .. } if table == "variants"));
    assert_eq!(count(&fx.db, "variants").await, 2);

    let result = fx
        .engine
        .delete(&products_model(), &graph(json!({"products": [{"id": "p1"}]})), &options)
        .await
        .unwrap();
    assert_eq!(result.deleted_ids("products").len(), 1);
    assert_eq!(count(&fx.db, "variants").await, 0);
}

#[tokio::test]
async fn test_soft_delete_hides_parent() {
    let fx = fixture().await;
    seed(&fx).await;

    let options = GraphOptions {
        soft_delete: true,
        ..GraphOptions::default()
    };
    let result = fx
        .engine
        .delete(&products_model(), &graph(json!({"products": [{"id": "p1"}]})), &options)
        .await
        .unwrap();
    assert!(!result.has_failures());

    // products carries deleted_at; variants has no such column and goes for good
    let products = rows(&fx.db, "products").await;
    assert_eq!(products.len(), 1);
    assert!(products[0]["deleted_at"].is_string());
    assert_eq!(count(&fx.db, "variants").await, 0);

    let read = fx
        .engine
        .read(&products_model(), &graph(json!({"products": [{"id": "p1"}]})), &GraphOptions::default())
        .await
        .unwrap();
    assert_eq!(read.rows("products")[0]["_not_found"], json!(true));
}

#[tokio::test]
async fn test_target_without_id_is_rejected() {
    let fx = fixture().await;
    seed(&fx).await;

    let err = fx
        .engine
        .delete(&products_model(), &graph(json!({"products": [{"name": "Lamp"}]})), &GraphOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::MissingId(ref t) if t == "products"));
    assert_eq!(count(&fx.db, "products").await, 1);
}

#[tokio::test]
async fn test_child_table_listed_before_parent() {
    let options = [
        GraphOptions::default(),
        GraphOptions {
            atomic_delete: true,
            ..GraphOptions::default()
        },
    ];

    for options in options {
        let fx = fixture().await;
        seed(&fx).await;

        // products reference suppliers, so p1 must go before s1
        let request = graph(json!({
            "products": [{"id": "p1"}],
            "suppliers": [{"id": "s1"}]
        }));
        let result = fx
            .engine
            .delete(&suppliers_model(), &request, &options)
            .await
            .unwrap();

        assert!(!result.has_failures());
        assert_eq!(result.deleted_ids("suppliers"), vec![&json!("s1")]);
        assert_eq!(result.deleted_ids("products"), vec![&json!("p1")]);
        assert_eq!(count(&fx.db, "suppliers").await, 0);
        assert_eq!(count(&fx.db, "products").await, 0);
        assert_eq!(count(&fx.db, "variants").await, 0);
    }
}
