//! REST client checks against a fake cluster HTTP server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use stowage_cluster::{
    ClusterBlobStore, ClusterConfig, ClusterError, PinningCluster, RestClientConfig,
    RestClusterClient,
};
use stowage_store::{BlobId, BlobStore, ErrorKind};
use tokio::sync::mpsc;

const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

#[derive(Default)]
struct FakeState {
    add_queries: Vec<HashMap<String, String>>,
    auth_headers: Vec<String>,
    content: HashMap<String, Vec<u8>>,
}

type Shared = Arc<Mutex<FakeState>>;

fn record_auth(state: &Shared, headers: &HeaderMap) {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        state
            .lock()
            .unwrap()
            .auth_headers
            .push(value.to_str().unwrap_or_default().to_owned());
    }
}

async fn id(State(state): State<Shared>, headers: HeaderMap) -> Json<serde_json::Value> {
    record_auth(&state, &headers);
    Json(json!({
        "id": "12D3KooWFake",
        "peername": "fake-0",
        "version": "1.1.0",
        "cluster_peers": ["12D3KooWFake", "12D3KooWOther"],
    }))
}

async fn add(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    state.add_queries.push(query.clone());
    if query.get("name").map(String::as_str) == Some("reject") {
        return (
            StatusCode::OK,
            "{\"code\":500,\"message\":\"not enough peers\"}\n",
        )
            .into_response();
    }

    // The multipart body carries the raw payload between its boundaries.
    let payload = extract_payload(&body);
    state.content.insert(CID.to_owned(), payload);

    let name = query.get("name").cloned().unwrap_or_default();
    let lines = [
        json!({"name": name, "bytes": 128}).to_string(),
        json!({"name": name, "cid": {"/": CID}, "size": body.len()}).to_string(),
    ];
    (StatusCode::OK, lines.join("\n")).into_response()
}

fn extract_payload(body: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(body);
    let start = text.find("\r\n\r\n").map(|i| i + 4).unwrap_or(0);
    let end = text.rfind("\r\n--").unwrap_or(text.len());
    body[start..end.max(start)].to_vec()
}

async fn cat(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Response {
    let arg = query.get("arg").cloned().unwrap_or_default();
    match state.lock().unwrap().content.get(&arg) {
        Some(data) => (StatusCode::OK, data.clone()).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"Message": "block was not found locally (offline)", "Code": 0, "Type": "error"})),
        )
            .into_response(),
    }
}

async fn spawn_fake() -> (SocketAddr, Shared) {
    let state = Shared::default();
    let app = Router::new()
        .route("/id", get(id))
        .route("/add", post(add))
        .route("/proxy/api/v0/cat", post(cat))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn client_config(addr: SocketAddr) -> RestClientConfig {
    RestClientConfig {
        api_url: format!("http://{addr}"),
        proxy_url: format!("http://{addr}/proxy"),
        ..RestClientConfig::default()
    }
}

#[tokio::test]
async fn id_decodes_identity_and_sends_basic_auth() {
    let (addr, state) = spawn_fake().await;
    let config = RestClientConfig {
        username: Some("admin".into()),
        password: Some("secret".into()),
        ..client_config(addr)
    };
    let client = RestClusterClient::new(&config).unwrap();

    let identity = client.id().await.unwrap();
    assert_eq!(identity.peername, "fake-0");
    assert_eq!(identity.cluster_peers.len(), 2);

    let auth = state.lock().unwrap().auth_headers.clone();
    assert_eq!(auth.len(), 1);
    assert!(auth[0].starts_with("Basic "));
}

#[tokio::test]
async fn store_roundtrip_over_http() {
    let (addr, state) = spawn_fake().await;
    let dir = tempfile::tempdir().unwrap();
    let client = RestClusterClient::new(&client_config(addr)).unwrap();
    let config = ClusterConfig {
        temp_dir: dir.path().to_path_buf(),
        local: true,
        ..ClusterConfig::default().with_replication(-1, -1)
    };
    let store = ClusterBlobStore::connect(client, config).await.unwrap();

    let id = store.put(b"hello over http").await.unwrap();
    assert_eq!(id.as_bytes(), CID.as_bytes());
    assert_eq!(store.get(&id).await.unwrap(), b"hello over http");

    let query = state.lock().unwrap().add_queries[0].clone();
    assert_eq!(query["replication-min"], "-1");
    assert_eq!(query["replication-max"], "-1");
    assert_eq!(query["local"], "true");
    assert_eq!(query["stream-channels"], "true");
    assert!(uuid::Uuid::parse_str(&query["name"]).is_ok());
}

#[tokio::test]
async fn missing_content_is_not_found() {
    let (addr, _state) = spawn_fake().await;
    let dir = tempfile::tempdir().unwrap();
    let client = RestClusterClient::new(&client_config(addr)).unwrap();
    let config = ClusterConfig {
        temp_dir: dir.path().to_path_buf(),
        ..ClusterConfig::default()
    };
    let store = ClusterBlobStore::connect(client, config).await.unwrap();

    let err = store
        .get(&BlobId::from(b"QmNothingHere".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn streamed_error_object_fails_the_add() {
    let (addr, _state) = spawn_fake().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload");
    std::fs::write(&path, b"x").unwrap();

    let client = RestClusterClient::new(&client_config(addr)).unwrap();
    let params = stowage_cluster::AddParams {
        name: "reject".into(),
        ..Default::default()
    };
    let (tx, _rx) = mpsc::channel(4);
    let err = client.add(&[path], &params, tx).await.unwrap_err();
    assert!(matches!(err, ClusterError::Api { code: 500, .. }), "{err}");
}

#[tokio::test]
async fn unreachable_cluster_fails_connect() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let client = RestClusterClient::new(&client_config(addr)).unwrap();
    let config = ClusterConfig {
        temp_dir: dir.path().to_path_buf(),
        ..ClusterConfig::default()
    };
    let err = ClusterBlobStore::connect(client, config).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
