//! Fixture seeding against a mock search backend

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use osd_e2e::fixtures::{FixtureDescriptor, FixtureLoader, BULK_CHUNK_SIZE};
use osd_e2e::{E2eError, RunConfig};

/// Request as the backend saw it, after unwrapping the console proxy
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    proxied: bool,
    xsrf: bool,
    authorized: bool,
}

#[derive(Default)]
struct Backend {
    indices: BTreeMap<String, u64>,
    requests: Vec<Seen>,
    reject_bulk: bool,
}

type Shared = Arc<Mutex<Backend>>;

async fn handle(
    State(backend): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let proxied = uri.path() == "/api/console/proxy";
    let (method, target) = if proxied {
        (
            query.get("method").cloned().unwrap_or_default(),
            query.get("path").cloned().unwrap_or_default(),
        )
    } else {
        (method.to_string(), uri.path().to_string())
    };
    let path = target
        .trim_start_matches('/')
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string();

    let mut backend = backend.lock();
    backend.requests.push(Seen {
        method: method.clone(),
        path: path.clone(),
        proxied,
        xsrf: headers.contains_key("osd-xsrf"),
        authorized: headers.contains_key("authorization"),
    });

    let segments: Vec<&str> = path.split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("PUT", [index]) => {
            if backend.indices.contains_key(*index) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"type": "resource_already_exists_exception"}, "status": 400})),
                );
            }
            backend.indices.insert(index.to_string(), 0);
            (StatusCode::OK, Json(json!({"acknowledged": true})))
        }
        ("PUT", [_, "_mapping"]) => (StatusCode::OK, Json(json!({"acknowledged": true}))),
        ("POST", ["_bulk"]) => {
            let actions: Vec<Value> = body
                .lines()
                .step_by(2)
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect();
            if backend.reject_bulk {
                let items: Vec<Value> = actions
                    .iter()
                    .map(|_| json!({"index": {"status": 400, "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [bytes]"}}}))
                    .collect();
                return (StatusCode::OK, Json(json!({"errors": true, "items": items})));
            }
            for action in &actions {
                let index = action["index"]["_index"].as_str().unwrap_or_default().to_string();
                *backend.indices.entry(index).or_insert(0) += 1;
            }
            (StatusCode::OK, Json(json!({"errors": false, "items": []})))
        }
        ("GET", [index, "_count"]) => match backend.indices.get(*index) {
            Some(count) => (StatusCode::OK, Json(json!({"count": count}))),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"type": "index_not_found_exception"}, "status": 404})),
            ),
        },
        ("DELETE", [index]) => match backend.indices.remove(*index) {
            Some(_) => (StatusCode::OK, Json(json!({"acknowledged": true}))),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"type": "index_not_found_exception"}, "status": 404})),
            ),
        },
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "unexpected request"}))),
    }
}

async fn spawn_backend(backend: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(handle).with_state(backend);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

/// Fixture directory with a mapping and three raw documents
fn fixture_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "mappings.json",
        r#"{"settings": {"number_of_shards": 1}, "mappings": {"properties": {"extension": {"type": "keyword"}}}}"#,
    );
    write(
        dir.path(),
        "data.json",
        r#"{"extension": "jpg", "bytes": 1024}
{"extension": "css", "bytes": 512}
{"extension": "jpg", "bytes": 2048}
"#,
    );
    dir
}

fn descriptor() -> FixtureDescriptor {
    FixtureDescriptor::new("logstash-2015.09.22")
        .mapping("mappings.json")
        .data("data.json")
}

async fn setup(configure: impl FnOnce(&mut RunConfig)) -> (Shared, FixtureLoader, TempDir) {
    let backend = Shared::default();
    let url = spawn_backend(backend.clone()).await;

    let mut config = RunConfig::default();
    config.opensearch_url = url.clone();
    config.base_url = url;
    configure(&mut config);

    let dir = fixture_dir();
    let loader = FixtureLoader::new(&config, dir.path()).unwrap();
    (backend, loader, dir)
}

#[tokio::test]
async fn test_load_creates_index_and_bulk_inserts() {
    let (backend, loader, _dir) = setup(|_| {}).await;

    let report = loader.load(&descriptor()).await.unwrap();
    assert_eq!(report.documents, 3);
    assert!(!report.skipped);
    assert_eq!(loader.count("logstash-2015.09.22").await.unwrap(), 3);

    let seen: Vec<(String, String)> = backend
        .lock()
        .requests
        .iter()
        .map(|r| (r.method.clone(), r.path.clone()))
        .collect();
    assert_eq!(seen[0], ("PUT".to_string(), "logstash-2015.09.22".to_string()));
    assert_eq!(seen[1], ("POST".to_string(), "_bulk".to_string()));
    assert!(backend.lock().requests.iter().all(|r| !r.proxied && !r.authorized));
}

#[tokio::test]
async fn test_existing_index_gets_mapping_update() {
    let (backend, loader, _dir) = setup(|_| {}).await;
    backend.lock().indices.insert("logstash-2015.09.22".to_string(), 0);

    loader.load(&descriptor()).await.unwrap();

    let paths: Vec<String> = backend.lock().requests.iter().map(|r| r.path.clone()).collect();
    assert!(paths.contains(&"logstash-2015.09.22/_mapping".to_string()));
}

#[tokio::test]
async fn test_bulk_item_errors_fail_the_seed() {
    let (backend, loader, _dir) = setup(|_| {}).await;
    backend.lock().reject_bulk = true;

    let err = loader.load(&descriptor()).await.unwrap_err();
    match err {
        E2eError::Seed { index, status, body } => {
            assert_eq!(index, "logstash-2015.09.22");
            assert_eq!(status, 200);
            assert!(body.contains("mapper_parsing_exception"));
        }
        other => panic!("expected a seed error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_documents_are_sent_in_chunks() {
    let (backend, loader, dir) = setup(|_| {}).await;
    let docs: String = (0..BULK_CHUNK_SIZE + 1)
        .map(|i| format!("{{\"n\": {i}}}\n"))
        .collect();
    write(dir.path(), "many.json", &docs);

    let report = loader
        .load(&FixtureDescriptor::new("many").data("many.json"))
        .await
        .unwrap();
    assert_eq!(report.documents, BULK_CHUNK_SIZE + 1);

    let bulks = backend
        .lock()
        .requests
        .iter()
        .filter(|r| r.path == "_bulk")
        .count();
    assert_eq!(bulks, 2);
    assert_eq!(loader.count("many").await.unwrap(), (BULK_CHUNK_SIZE + 1) as u64);
}

#[tokio::test]
async fn test_import_if_needed_skips_populated_index() {
    let (backend, loader, _dir) = setup(|_| {}).await;
    backend.lock().indices.insert("logstash-2015.09.22".to_string(), 14_005);

    let mut fixture = descriptor();
    fixture.if_needed = true;
    let report = loader.seed(&fixture).await.unwrap();
    assert!(report.skipped);
    assert_eq!(report.documents, 0);
    assert!(backend.lock().requests.iter().all(|r| r.path != "_bulk"));
}

#[tokio::test]
async fn test_import_if_needed_loads_missing_index() {
    let (_backend, loader, _dir) = setup(|_| {}).await;

    let report = loader.import_if_needed(&descriptor()).await.unwrap();
    assert!(!report.skipped);
    assert_eq!(report.documents, 3);
}

#[tokio::test]
async fn test_delete_and_count_of_missing_index() {
    let (_backend, loader, _dir) = setup(|_| {}).await;

    loader.delete_index("nope").await.unwrap();
    assert!(matches!(
        loader.count("nope").await,
        Err(E2eError::Seed { status: 404, .. })
    ));

    loader.load(&descriptor()).await.unwrap();
    loader.delete_index("logstash-2015.09.22").await.unwrap();
    assert!(loader.count("logstash-2015.09.22").await.is_err());
}

#[tokio::test]
async fn test_missing_data_file_is_a_fixture_error() {
    let (_backend, loader, _dir) = setup(|_| {}).await;

    let err = loader
        .load(&FixtureDescriptor::new("x").data("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Fixture { ref path, .. } if path.ends_with("absent.json")));
}

#[tokio::test]
async fn test_doc_for_another_index_is_rejected_before_any_request() {
    let (backend, loader, dir) = setup(|_| {}).await;
    write(
        dir.path(),
        "stray.json",
        r#"{"type": "doc", "value": {"index": "logstash-2015.09.20", "id": "1", "source": {"bytes": 1}}}"#,
    );

    let fixture = descriptor().data("stray.json");
    let err = loader.load(&fixture).await.unwrap_err();
    assert!(matches!(err, E2eError::Fixture { ref reason, .. } if reason.contains("logstash-2015.09.20")));
    assert!(backend.lock().requests.is_empty());
    assert!(backend.lock().indices.is_empty());
}

#[tokio::test]
async fn test_proxy_mode_routes_through_console_proxy() {
    let (backend, loader, _dir) = setup(|config| {
        config.features.endpoint_with_proxy = true;
        config.opensearch_url = "http://127.0.0.1:1".to_string();
    })
    .await;

    loader.load(&descriptor()).await.unwrap();
    assert_eq!(loader.count("logstash-2015.09.22").await.unwrap(), 3);

    let backend = backend.lock();
    assert!(backend.requests.iter().all(|r| r.proxied && r.xsrf));
    assert_eq!(backend.requests[0].method, "PUT");
}

#[tokio::test]
async fn test_credentials_sent_only_with_security() {
    let (backend, loader, _dir) = setup(|config| {
        config.features.security_enabled = true;
    })
    .await;

    loader.delete_index("anything").await.unwrap();
    assert!(backend.lock().requests[0].authorized);
}
