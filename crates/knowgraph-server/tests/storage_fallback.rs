//! End-to-end storage tests — the coordinator against a live reference backend.
//!
//! Each test starts the backend on an ephemeral port behind a switch that
//! answers 503 while "offline", so fallback and recovery run over real HTTP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use knowgraph_core::{GraphRecord, NodeRecord};
use knowgraph_server::{build_router, AppState, GraphRepository};
use knowgraph_store::{
    AvailabilityProbe, LocalStore, MemoryKeyValueStore, Notice, RemoteStore, StorageCoordinator,
    StorageMode,
};

struct Backend {
    api_url: String,
    online: Arc<AtomicBool>,
}

impl Backend {
    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

async fn spawn_backend() -> Backend {
    let online = Arc::new(AtomicBool::new(true));
    let gate = online.clone();

    let state = Arc::new(AppState::new(GraphRepository::in_memory()));
    let app = build_router(state).layer(middleware::from_fn(move |req: Request, next: Next| {
        let gate = gate.clone();
        async move {
            if gate.load(Ordering::SeqCst) {
                next.run(req).await
            } else {
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
        }
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        api_url: format!("http://{}/api", addr),
        online,
    }
}

async fn coordinator_for(backend: &Backend, probe_interval: Duration) -> StorageCoordinator {
    let remote = RemoteStore::new(&backend.api_url, Duration::from_secs(5)).unwrap();
    let probe = AvailabilityProbe::new(&remote, Duration::from_secs(2));
    let local = LocalStore::new(Arc::new(MemoryKeyValueStore::new()));
    StorageCoordinator::start(remote, local, probe, probe_interval).await
}

fn demo() -> GraphRecord {
    GraphRecord::new("Demo").with_node(NodeRecord::new("1", "A"))
}

#[tokio::test]
async fn test_startup_probe_picks_remote() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;
    assert_eq!(coordinator.mode(), StorageMode::Remote);

    backend.set_online(false);
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;
    assert_eq!(coordinator.mode(), StorageMode::Local);
}

#[tokio::test]
async fn test_save_online_then_list() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;

    let saved = coordinator.save_graph(&demo()).await.unwrap();
    assert_eq!(saved.served_by, StorageMode::Remote);
    assert!(saved.notice.is_none());
    let id = saved.value.id.clone().unwrap();
    assert!(!id.starts_with("local-"));
    assert!(saved.value.created_at.is_some());
    assert_eq!(saved.value.created_at, saved.value.updated_at);

    let listed = coordinator.list_graphs().await.unwrap().value;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id.as_deref(), Some(id.as_str()));
    assert!(listed[0].same_content(&demo()));
}

#[tokio::test]
async fn test_rename_keeps_identity_and_advances_updated_at() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;

    let saved = coordinator.save_graph(&demo()).await.unwrap().value;
    let mut renamed = saved.clone();
    renamed.name = "X".into();
    coordinator.save_graph(&renamed).await.unwrap();

    let id = saved.id.clone().unwrap();
    let loaded = coordinator.load_graph(&id).await.unwrap().value;
    assert_eq!(loaded.name, "X");
    assert_eq!(loaded.id, saved.id);
    assert_eq!(loaded.created_at, saved.created_at);
    assert!(loaded.updated_at > saved.updated_at);
    assert_eq!(coordinator.list_graphs().await.unwrap().value.len(), 1);
}

#[tokio::test]
async fn test_delete_then_load_is_not_found() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;

    let id = coordinator.save_graph(&demo()).await.unwrap().value.id.unwrap();
    assert!(coordinator.delete_graph(&id).await.unwrap().value);

    let err = coordinator.load_graph(&id).await.unwrap_err();
    assert!(err.is_not_found());
    // a remote 404 is not an outage
    assert_eq!(coordinator.mode(), StorageMode::Remote);

    assert!(!coordinator.delete_graph("missing").await.unwrap().value);
    assert!(coordinator.list_graphs().await.unwrap().value.is_empty());
}

#[tokio::test]
async fn test_save_while_offline_falls_back_to_local() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;
    assert_eq!(coordinator.mode(), StorageMode::Remote);

    backend.set_online(false);
    let saved = coordinator.save_graph(&demo()).await.unwrap();

    assert_eq!(coordinator.mode(), StorageMode::Local);
    assert_eq!(saved.served_by, StorageMode::Local);
    match &saved.notice {
        Some(Notice::FellBack { reason }) => assert!(reason.contains("503")),
        other => panic!("expected fallback notice, got {:?}", other),
    }
    let id = saved.value.id.clone().unwrap();
    assert!(id.starts_with("local-"));
    assert!(coordinator.local().contains(&id));
}

#[tokio::test]
async fn test_probe_cycle_recovers_without_migrating() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;

    backend.set_online(false);
    let local_copy = coordinator.save_graph(&demo()).await.unwrap().value;
    assert_eq!(coordinator.mode(), StorageMode::Local);

    assert!(!coordinator.run_probe_cycle().await);
    assert_eq!(coordinator.mode(), StorageMode::Local);

    backend.set_online(true);
    let mut notices = coordinator.notices();
    assert!(coordinator.run_probe_cycle().await);
    assert_eq!(coordinator.mode(), StorageMode::Remote);
    assert_eq!(notices.try_recv().unwrap(), Notice::Recovered);

    // local data untouched, and the next list comes from the server
    let local = coordinator.local().list().unwrap();
    assert_eq!(local, vec![local_copy]);
    let listed = coordinator.list_graphs().await.unwrap();
    assert_eq!(listed.served_by, StorageMode::Remote);
    assert!(listed.value.is_empty());
}

#[tokio::test]
async fn test_background_probe_switches_back() {
    let backend = spawn_backend().await;
    let coordinator = Arc::new(coordinator_for(&backend, Duration::from_millis(50)).await);
    let task = coordinator.spawn_recovery_probe();

    backend.set_online(false);
    coordinator.list_graphs().await.unwrap();
    assert_eq!(coordinator.mode(), StorageMode::Local);

    let mut mode = coordinator.subscribe();
    backend.set_online(true);
    tokio::time::timeout(Duration::from_secs(5), mode.wait_for(|m| *m == StorageMode::Remote))
        .await
        .expect("probe did not recover in time")
        .unwrap();

    drop(mode);
    drop(coordinator);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("probe task outlived coordinator")
        .unwrap();
}

#[tokio::test]
async fn test_forced_modes() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;

    coordinator.force_mode(StorageMode::Local);
    let saved = coordinator.save_graph(&demo()).await.unwrap();
    assert_eq!(saved.served_by, StorageMode::Local);
    assert!(saved.notice.is_none());

    // forcing remote does not probe: the next call simply goes to the server
    backend.set_online(false);
    coordinator.force_mode(StorageMode::Remote);
    assert_eq!(coordinator.mode(), StorageMode::Remote);
    let listed = coordinator.list_graphs().await.unwrap();
    assert_eq!(listed.served_by, StorageMode::Local);
    assert_eq!(listed.value.len(), 1);
}

#[tokio::test]
async fn test_import_without_name_changes_nothing() {
    let backend = spawn_backend().await;
    let coordinator = coordinator_for(&backend, Duration::from_secs(30)).await;

    let err = coordinator
        .import_graph(r#"{"description": "no name", "nodes": [], "edges": []}"#)
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(coordinator.mode(), StorageMode::Remote);
    assert!(coordinator.list_graphs().await.unwrap().value.is_empty());
    assert!(coordinator.local().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_sending_both_timestamp_spellings_stays_remote() {
    let app = axum::Router::new().route(
        "/api/graphs/{id}",
        axum::routing::get(|| async {
            axum::Json(serde_json::json!({
                "id": "g1",
                "name": "Both",
                "nodes": [],
                "edges": [],
                "createdAt": "2024-05-01T10:00:00Z",
                "created_at": "2024-05-01T10:00:00Z",
                "updatedAt": "2024-05-02T10:00:00Z",
                "updated_at": "2024-05-02T10:00:00Z"
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let remote = RemoteStore::new(&format!("http://{}/api", addr), Duration::from_secs(5)).unwrap();
    let probe = AvailabilityProbe::new(&remote, Duration::from_secs(2));
    let local = LocalStore::new(Arc::new(MemoryKeyValueStore::new()));
    let coordinator =
        StorageCoordinator::new(remote, local, probe, Duration::from_secs(30), StorageMode::Remote);

    let loaded = coordinator.load_graph("g1").await.unwrap();
    assert_eq!(loaded.served_by, StorageMode::Remote);
    assert!(loaded.notice.is_none());
    assert!(loaded.value.updated_at > loaded.value.created_at);
    assert_eq!(coordinator.mode(), StorageMode::Remote);
}

#[tokio::test]
async fn test_liveness_and_error_bodies() {
    let backend = spawn_backend().await;
    let client = reqwest::Client::new();

    let head = client
        .head(format!("{}/graphs", backend.api_url))
        .send()
        .await
        .unwrap();
    assert_eq!(head.status(), reqwest::StatusCode::OK);

    let missing = client
        .get(format!("{}/graphs/nope", backend.api_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Graph not found");

    let created = client
        .put(format!("{}/graphs/fixed-id", backend.api_url))
        .json(&serde_json::json!({ "name": "Put", "nodes": [], "edges": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = created.json().await.unwrap();
    assert_eq!(body["id"], "fixed-id");
    assert!(body["createdAt"].is_string());
    assert!(body.get("created_at").is_none());

    let rejected = client
        .post(format!("{}/graphs", backend.api_url))
        .json(&serde_json::json!({ "name": "", "nodes": [], "edges": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
}
