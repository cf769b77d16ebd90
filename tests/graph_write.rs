//! Recursive Write Tests
//!
//! - every child's foreign key equals its parent's key, at every depth
//! - a failure anywhere rolls back the whole call
//! - update calls create rows that do not exist yet

mod common;

use aerograph::{GraphAction, GraphError, GraphOptions, ResultGraph};
use common::{count, fixture, graph, products_model, rows, suppliers_model};
use serde_json::json;

#[tokio::test]
async fn test_three_level_create_links_every_level() {
    let fx = fixture().await;
    let model = products_model();

    let request = graph(json!({
        "products": [{
            "name": "Lamp",
            "price": 10,
            "variants": [
                {"label": "S", "prices": [{"amount": 5}, {"amount": 6, "currency": "USD"}]},
                {"label": "M", "prices": [{"amount": 7}]}
            ]
        }]
    }));
    let result = fx.engine.create(&model, &request).await.unwrap();

    assert_eq!(result.created("products").len(), 1);
    assert_eq!(result.created("variants").len(), 2);
    assert_eq!(result.created("prices").len(), 3);
    assert!(result.update_data.is_empty());

    let product = &rows(&fx.db, "products").await[0];
    assert_eq!(product["status"], json!("draft"));

    let variants = rows(&fx.db, "variants").await;
    assert_eq!(variants.len(), 2);
    for variant in &variants {
        assert_eq!(variant["product_ref"], product["id"]);
    }

    let prices = rows(&fx.db, "prices").await;
    assert_eq!(prices.len(), 3);
    let small = variants.iter().find(|v| v["label"] == json!("S")).unwrap();
    let medium = variants.iter().find(|v| v["label"] == json!("M")).unwrap();
    assert_eq!(prices[0]["variant_id"], small["id"]);
    assert_eq!(prices[1]["variant_id"], small["id"]);
    assert_eq!(prices[2]["variant_id"], medium["id"]);
    assert_eq!(prices[0]["currency"], json!("EUR"));
    assert_eq!(prices[1]["currency"], json!("USD"));
}

#[tokio::test]
async fn test_grandchild_validation_failure_rolls_back_everything() {
    let fx = fixture().await;
    let model = products_model();

    let request = graph(json!({
        "products": [{
            "name": "Lamp",
            "variants": [
                {"label": "S", "prices": [{"amount": 5}]},
                {"label": "M", "prices": [{"amount": -1}]}
            ]
        }]
    }));
    let err = fx.engine.create(&model, &request).await.unwrap_err();

    assert_eq!(err.status_code(), 422);
    assert!(matches!(
        err,
        GraphError::Operation { ref table, ref action, .. } if table == "prices" && action == "create"
    ));
    assert!(matches!(
        err.root_cause(),
        GraphError::ValidationFailed { field, .. } if field == "amount"
    ));

    assert_eq!(count(&fx.db, "products").await, 0);
    assert_eq!(count(&fx.db, "variants").await, 0);
    assert_eq!(count(&fx.db, "prices").await, 0);
}

#[tokio::test]
async fn test_update_creates_new_children() {
    let fx = fixture().await;
    let model = products_model();

    let created = fx
        .engine
        .create(
            &model,
            &graph(json!({"products": [{"id": "p1", "name": "Lamp", "variants": [{"id": "v1", "label": "S"}]}]})),
        )
        .await
        .unwrap();
    assert_eq!(created.created("variants").len(), 1);

    let request = graph(json!({
        "products": [{
            "id": "p1",
            "name": "Lamp 2",
            "variants": [
                {"id": "v1", "label": "S2"},
                {"label": "XL", "prices": [{"amount": 9}]}
            ]
        }]
    }));
    let result = fx.engine.update(&model, &request).await.unwrap();

    assert_eq!(result.updated("products").len(), 1);
    assert_eq!(result.updated("products")[0]["name"], json!("Lamp 2"));
    assert_eq!(result.updated("variants").len(), 1);
    assert_eq!(result.created("variants").len(), 1);
    assert_eq!(result.created("prices").len(), 1);

    let variants = rows(&fx.db, "variants").await;
    assert_eq!(variants.len(), 2);
    assert!(variants.iter().all(|v| v["product_ref"] == json!("p1")));
    assert_eq!(variants[0]["label"], json!("S2"));

    let new_variant = &result.created("variants")[0];
    assert_eq!(rows(&fx.db, "prices").await[0]["variant_id"], new_variant["id"]);
}

#[tokio::test]
async fn test_update_of_unknown_id_creates() {
    let fx = fixture().await;
    let model = products_model();

    let result = fx
        .engine
        .update(&model, &graph(json!({"products": [{"id": "fresh", "name": "New"}]})))
        .await
        .unwrap();
    assert_eq!(result.created("products")[0]["id"], json!("fresh"));
    assert!(result.updated("products").is_empty());
}

#[tokio::test]
async fn test_key_only_parent_is_navigated_not_rewritten() {
    let fx = fixture().await;
    let model = products_model();
    fx.engine
        .create(
            &model,
            &graph(json!({"products": [{"id": "p1", "name": "Lamp", "variants": [{"id": "v1", "label": "S"}]}]})),
        )
        .await
        .unwrap();

    let result = fx
        .engine
        .update(
            &model,
            &graph(json!({"products": [{"id": "p1", "variants": [{"id": "v1", "label": "L"}]}]})),
        )
        .await
        .unwrap();

    assert_eq!(result.updated("products")[0]["name"], json!("Lamp"));
    assert_eq!(rows(&fx.db, "variants").await[0]["label"], json!("L"));
}

#[tokio::test]
async fn test_create_of_existing_key_conflicts() {
    let fx = fixture().await;
    let model = products_model();
    let request = graph(json!({"products": [{"id": "p1", "name": "Lamp"}]}));

    fx.engine.create(&model, &request).await.unwrap();
    let err = fx.engine.create(&model, &request).await.unwrap_err();

    assert!(matches!(err.root_cause(), GraphError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
    assert_eq!(count(&fx.db, "products").await, 1);
}

#[tokio::test]
async fn test_partial_update_validates_present_fields_only() {
    let fx = fixture().await;
    let model = products_model();
    fx.engine
        .create(&model, &graph(json!({"products": [{"id": "p1", "name": "Lamp", "price": 3}]})))
        .await
        .unwrap();

    fx.engine
        .update(&model, &graph(json!({"products": [{"id": "p1", "price": 4}]})))
        .await
        .unwrap();

    let err = fx
        .engine
        .update(&model, &graph(json!({"products": [{"id": "p1", "name": ""}]})))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
    assert_eq!(rows(&fx.db, "products").await[0]["name"], json!("Lamp"));
}

#[tokio::test]
async fn test_explicit_foreign_key() {
    let fx = fixture().await;
    let model = suppliers_model();

    let result = fx
        .engine
        .create(
            &model,
            &graph(json!({"suppliers": [{"name": "Acme", "products": [{"name": "Lamp", "supplier_id": "spoofed"}]}]})),
        )
        .await
        .unwrap();

    let supplier = &result.created("suppliers")[0];
    let product = &rows(&fx.db, "products").await[0];
    assert_eq!(product["supplier_id"], supplier["id"]);
}

#[tokio::test]
async fn test_unknown_fields_and_null_children_are_ignored() {
    let fx = fixture().await;
    let model = products_model();

    let result = fx
        .engine
        .create(
            &model,
            &graph(json!({"products": [{"name": "Lamp", "colour": "red", "variants": null}]})),
        )
        .await
        .unwrap();
    assert!(!result.created("products")[0].contains_key("colour"));
    assert_eq!(count(&fx.db, "variants").await, 0);
}

#[tokio::test]
async fn test_process_request_validation() {
    let fx = fixture().await;
    let model = products_model();
    let options = GraphOptions::default();

    let err = fx
        .engine
        .process_request(&model, &json!({"products": []}), "upsert", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownAction(_)));

    let err = fx
        .engine
        .process_request(&model, &json!({"orders": [{"id": 1}]}), "create", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownTable(_)));
    assert_eq!(err.status_code(), 400);

    let err = fx
        .engine
        .process_request(&model, &json!({"products": {"name": "Lamp"}}), "create", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidPayload(_)));

    let result = fx
        .engine
        .process_graph_operation(
            &model,
            &graph(json!({"products": [{"name": "Lamp"}]})),
            GraphAction::Create,
            &options,
        )
        .await
        .unwrap();
    let body = serde_json::to_value(&result).unwrap();
    assert!(matches!(result, ResultGraph::Write(_)));
    assert_eq!(body["createData"]["products"][0]["name"], json!("Lamp"));
}

#[tokio::test]
async fn test_top_level_tables_written_in_request_order() {
    let fx = fixture().await;
    let model = suppliers_model();

    let request: serde_json::Value = serde_json::from_str(
        r#"{
            "suppliers": [{"id": "s9", "name": "Acme"}],
            "products": [{"id": "p9", "name": "Lamp", "supplier_id": "s9"}]
        }"#,
    )
    .unwrap();
    let result = fx
        .engine
        .process_request(&model, &request, "create", &GraphOptions::default())
        .await
        .unwrap();

    let ResultGraph::Write(result) = result else {
        panic!("expected a write result");
    };
    assert_eq!(result.created("suppliers").len(), 1);
    assert_eq!(result.created("products")[0]["supplier_id"], json!("s9"));
    assert_eq!(rows(&fx.db, "products").await[0]["supplier_id"], json!("s9"));
}
