//! Shared fixture for the graph integration suites
//!
//! suppliers ──(explicit supplier_id)──▶ products ──(references)──▶ variants ──(naming)──▶ prices

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use aerograph::executor::{QueryExecutor, Row, SqliteDatabase, Statement};
use aerograph::file_storage::{FileStore, LocalBackend};
use aerograph::model::{DefaultValue, EntityModel, FieldValidator, FileAttachment};
use aerograph::{GraphEngine, RequestGraph};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const SCHEMA: &str = r#"
CREATE TABLE suppliers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    contract_path TEXT,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    sku TEXT UNIQUE,
    price REAL,
    status TEXT,
    image_path TEXT,
    supplier_id TEXT REFERENCES suppliers(id),
    created_at TEXT,
    updated_at TEXT,
    deleted_at TEXT
);
CREATE TABLE variants (
    id TEXT PRIMARY KEY,
    product_ref TEXT REFERENCES products(id),
    label TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    variant_id TEXT,
    amount REAL NOT NULL,
    currency TEXT
);
"#;

// 1x1 RGBA PNG
pub const PNG_1X1: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct Fixture {
    pub engine: GraphEngine<SqliteDatabase>,
    pub db: SqliteDatabase,
    pub storage: TempDir,
}

pub async fn fixture() -> Fixture {
    let db = SqliteDatabase::open_memory().unwrap();
    db.execute_batch(SCHEMA).await.unwrap();
    let storage = TempDir::new().expect("Failed to create temp dir");
    let files = FileStore::new(LocalBackend::new(storage.path()));
    Fixture {
        engine: GraphEngine::new(db.clone(), files),
        db,
        storage,
    }
}

pub fn prices_model() -> Arc<EntityModel> {
    EntityModel::builder("prices")
        .required(["amount"])
        .validate("amount", FieldValidator::Min(0.0))
        .default_value("currency", DefaultValue::constant(json!("EUR")))
        .build()
}

pub fn variants_model() -> Arc<EntityModel> {
    EntityModel::builder("variants")
        .required(["label"])
        .child(prices_model())
        .build()
}

pub fn products_model() -> Arc<EntityModel> {
    EntityModel::builder("products")
        .required(["name"])
        .validate("price", FieldValidator::Min(0.0))
        .default_value("status", DefaultValue::constant(json!("draft")))
        .attachment(FileAttachment::new("image_path", "products/{id}").images_only())
        .child(variants_model())
        .build()
}

pub fn suppliers_model() -> Arc<EntityModel> {
    EntityModel::builder("suppliers")
        .required(["name"])
        .attachment(FileAttachment::new("contract_path", "suppliers/{id}").file_types(["contracts"]))
        .child_with_key(products_model(), "supplier_id")
        .build()
}

pub fn graph(value: Value) -> RequestGraph {
    value.as_object().cloned().expect("request graph must be an object")
}

pub async fn rows(db: &SqliteDatabase, table: &str) -> Vec<Row> {
    db.query(&Statement::new(format!("SELECT * FROM {} ORDER BY rowid", table)))
        .await
        .unwrap()
}

pub async fn count(db: &SqliteDatabase, table: &str) -> usize {
    rows(db, table).await.len()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([20, 120, 220])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Files under the storage root, relative and sorted
pub fn stored_files(root: &std::path::Path) -> Vec<String> {
    fn walk(dir: &std::path::Path, root: &std::path::Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.push(rel);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
