//! File-store client against an in-process mock store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rpc_worker::{FileStore, FileStoreError};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Store {
    files: Arc<Mutex<HashMap<String, Value>>>,
}

fn info(id: &str, name: &str, path: &str, expires_at: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "size": 5,
        "sha256": "abc123",
        "path": path,
        "created_at": 1_700_000_000,
        "expires_at": expires_at,
    })
}

async fn import(State(store): State<Store>, Json(body): Json<Value>) -> Json<Value> {
    let id = "f-1".to_string();
    let entry = info(
        &id,
        body["name"].as_str().unwrap_or_default(),
        body["path"].as_str().unwrap_or_default(),
        if body["ttl"] == 0 { 0 } else { 1_700_003_600 },
    );
    store.files.lock().unwrap().insert(id.clone(), entry);
    Json(json!({ "id": id }))
}

async fn list(
    State(store): State<Store>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut files: Vec<Value> = store.files.lock().unwrap().values().cloned().collect();
    if query.get("include_expired").map(String::as_str) == Some("true") {
        files.push(info("old", "expired.bin", "/blobs/old", 1));
    }
    Json(json!({ "files": files }))
}

async fn fetch(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if id == "teapot" {
        return Err((StatusCode::IM_A_TEAPOT, "short and stout".to_string()));
    }
    match store.files.lock().unwrap().get(&id) {
        Some(entry) => Ok(Json(entry.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            json!({"error": format!("file not found: {id}")}).to_string(),
        )),
    }
}

async fn update(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut files = store.files.lock().unwrap();
    let entry = files.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = body.get("name") {
        entry["name"] = name.clone();
    }
    if let Some(ttl) = body.get("ttl").and_then(Value::as_i64) {
        entry["expires_at"] = json!(if ttl == 0 { 0 } else { 1_700_000_000 + ttl });
    }
    Ok(Json(entry.clone()))
}

async fn remove(State(store): State<Store>, Path(id): Path<String>) -> StatusCode {
    match store.files.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn spawn_store() -> String {
    let app = Router::new()
        .route("/v1/store", get(list).post(import))
        .route("/v1/store/:id", get(fetch).patch(update).delete(remove))
        .with_state(Store::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_file_lifecycle() {
    let base = spawn_store().await;
    let store = FileStore::new(&base).unwrap();

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"hello").unwrap();

    let id = store.import_file(file.path(), None, 0).await.unwrap();
    assert_eq!(id, "f-1");

    let info = store.info(&id).await.unwrap();
    let expected_name = file.path().file_name().unwrap().to_string_lossy();
    assert_eq!(info.name, expected_name);
    assert!(info.is_permanent());
    assert!(std::path::Path::new(&info.path).is_absolute());
    assert_eq!(
        store.get_path(&id).await.unwrap(),
        std::fs::canonicalize(file.path()).unwrap()
    );

    let renamed = store.rename(&id, "greeting.txt").await.unwrap();
    assert_eq!(renamed.name, "greeting.txt");

    let expiring = store.set_ttl(&id, 60).await.unwrap();
    assert_eq!(expiring.expires_at, 1_700_000_060);

    assert_eq!(store.list(false).await.unwrap().len(), 1);
    assert_eq!(store.list(true).await.unwrap().len(), 2);

    store.delete(&id).await.unwrap();
    assert!(store.list(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_name_and_ttl() {
    let base = spawn_store().await;
    let store = FileStore::new(&base).unwrap();

    let file = tempfile::NamedTempFile::new().unwrap();
    let id = store
        .import_file(file.path(), Some("out.png"), 3600)
        .await
        .unwrap();

    let info = store.info(&id).await.unwrap();
    assert_eq!(info.name, "out.png");
    assert!(!info.is_permanent());
}

#[tokio::test]
async fn test_error_mapping() {
    let base = spawn_store().await;
    let store = FileStore::new(&base).unwrap();

    match store.info("nope").await.unwrap_err() {
        FileStoreError::Server(message) => assert_eq!(message, "file not found: nope"),
        other => panic!("unexpected error: {other:?}"),
    }

    match store.info("teapot").await.unwrap_err() {
        FileStoreError::Http { status, reason } => {
            assert_eq!(status, 418);
            assert_eq!(reason, "I'm a teapot");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = store.delete("nope").await.unwrap_err();
    assert!(matches!(err, FileStoreError::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_store() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = FileStore::new(&format!("http://{addr}")).unwrap();
    let err = store.list(false).await.unwrap_err();
    assert!(matches!(err, FileStoreError::Connection(_)));
}
