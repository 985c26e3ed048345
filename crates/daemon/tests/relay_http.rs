//! End-to-end scenarios against the relay router, one simulated peer per
//! connect-info address.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use common::prelude::{ObjectCatalog, PresenceRegistry, SharedKey};
use lanrelay_daemon::http_server::{self, api::upload::UploadResponse};
use lanrelay_daemon::relay::{BlobStore, FileListing, FileRelay};
use lanrelay_daemon::ServiceState;

const BOUNDARY: &str = "relay-test-boundary";

struct Relay {
    state: ServiceState,
    key: SharedKey,
    _dir: TempDir,
}

impl Relay {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let key = SharedKey::generate();
        let relay = FileRelay::new(
            BlobStore::open(dir.path().join("uploads")).unwrap(),
            ObjectCatalog::new(),
            PresenceRegistry::new(Duration::from_secs(30)),
            key.clone(),
        );
        Self {
            state: ServiceState::new(relay, None),
            key,
            _dir: dir,
        }
    }

    /// The router as seen by a peer connecting from `ip`
    fn as_peer(&self, ip: [u8; 4]) -> Router {
        self.as_peer_with_limit(ip, http_server::MAX_UPLOAD_SIZE_BYTES)
    }

    fn as_peer_with_limit(&self, ip: [u8; 4], max_upload_bytes: usize) -> Router {
        let config = http_server::Config::new(SocketAddr::from(([127, 0, 0, 1], 5000)))
            .with_max_upload_bytes(max_upload_bytes);
        http_server::router(config, self.state.clone())
            .layer(MockConnectInfo(SocketAddr::from((ip, 40000))))
    }
}

fn multipart_body(file: Option<(&str, &[u8])>, recipient: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(recipient) = recipient {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"recipient\"\r\n\r\n{recipient}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(file: Option<(&str, &[u8])>, recipient: Option<&str>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(file, recipient)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn upload(relay: &Relay, from: [u8; 4], name: &str, data: &[u8], to: Option<&str>) -> UploadResponse {
    let response = relay
        .as_peer(from)
        .oneshot(upload_request(Some((name, data)), to))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn list(relay: &Relay, who: [u8; 4], query: &str) -> Vec<FileListing> {
    let response = relay
        .as_peer(who)
        .oneshot(get(&format!("/get_files{query}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn upload_without_recipient_is_for_everyone() {
    let relay = Relay::new();
    let uploaded = upload(&relay, [10, 0, 0, 1], "hello.txt", b"hello everyone", None).await;
    assert_eq!(uploaded.file.recipient.as_str(), "Everyone");
    assert_eq!(uploaded.file.original_name, "hello.txt");

    let stranger = [10, 0, 0, 99];
    let files = list(&relay, stranger, "").await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, uploaded.file.name);

    let response = relay
        .as_peer(stranger)
        .oneshot(get(&format!("/download/{}", uploaded.file.name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(&uploaded.file.name));

    let blob = body_bytes(response).await;
    assert_eq!(blob.len() as u64, uploaded.file.size);
    assert_eq!(relay.key.decrypt(&blob).unwrap(), b"hello everyone");
}

#[tokio::test]
async fn addressed_upload_is_hidden_from_others() {
    let relay = Relay::new();
    let (x, y, z) = ([10, 0, 0, 1], [10, 0, 0, 2], [10, 0, 0, 3]);

    let uploaded = upload(&relay, x, "secret.txt", b"just for y", Some("10.0.0.2")).await;
    assert_eq!(uploaded.file.sender.as_str(), "10.0.0.1");
    assert_eq!(uploaded.file.recipient.as_str(), "10.0.0.2");

    assert_eq!(list(&relay, y, "").await.len(), 1);
    let response = relay
        .as_peer(y)
        .oneshot(get(&format!("/download/{}", uploaded.file.name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(relay.key.decrypt(&body_bytes(response).await).unwrap(), b"just for y");

    assert!(list(&relay, z, "").await.is_empty());
    let response = relay
        .as_peer(z)
        .oneshot(get(&format!("/download/{}", uploaded.file.name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_object_is_404() {
    let relay = Relay::new();
    let response = relay
        .as_peer([10, 0, 0, 1])
        .oneshot(get("/download/nothing_00000000.enc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn bad_uploads_are_400() {
    let relay = Relay::new();
    let peer = relay.as_peer([10, 0, 0, 1]);

    let no_file = peer
        .clone()
        .oneshot(upload_request(None, Some("Everyone")))
        .await
        .unwrap();
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

    let empty_name = peer
        .clone()
        .oneshot(upload_request(Some(("", &b"data"[..])), None))
        .await
        .unwrap();
    assert_eq!(empty_name.status(), StatusCode::BAD_REQUEST);

    let empty_file = peer
        .oneshot(upload_request(Some(("a.txt", &b""[..])), None))
        .await
        .unwrap();
    assert_eq!(empty_file.status(), StatusCode::BAD_REQUEST);
    assert_eq!(empty_file.headers()[header::CONTENT_TYPE], "text/plain");

    assert!(list(&relay, [10, 0, 0, 1], "").await.is_empty());
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let relay = Relay::new();
    let peer = relay.as_peer_with_limit([10, 0, 0, 1], 1024);

    let response = peer
        .oneshot(upload_request(Some(("big.bin", &vec![0u8; 64 * 1024][..])), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

    assert!(list(&relay, [10, 0, 0, 1], "").await.is_empty());
}

#[tokio::test]
async fn listing_sorts_by_size() {
    let relay = Relay::new();
    let me = [10, 0, 0, 1];
    for (name, len) in [("three", 290), ("one", 90), ("two", 190)] {
        upload(&relay, me, name, &vec![1u8; len], None).await;
    }

    let names = |files: Vec<FileListing>| {
        files
            .into_iter()
            .map(|f| f.original_name)
            .collect::<Vec<_>>()
    };

    let asc = list(&relay, me, "?sort=size&order=asc").await;
    assert_eq!(names(asc), vec!["one", "two", "three"]);

    let desc = list(&relay, me, "?sort=size&order=desc").await;
    assert_eq!(names(desc), vec!["three", "two", "one"]);

    let by_name = names(list(&relay, me, "?sort=name").await);
    assert_eq!(names(list(&relay, me, "?sort=flavour").await), by_name);
    assert_eq!(names(list(&relay, me, "?sort=SIZE&order=desc").await), {
        let mut reversed = by_name.clone();
        reversed.reverse();
        reversed
    });
}

#[tokio::test]
async fn get_ips_reports_recent_callers() {
    let relay = Relay::new();
    list(&relay, [10, 0, 0, 7], "").await;

    let response = relay
        .as_peer([10, 0, 0, 3])
        .oneshot(get("/get_ips"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let peers: Vec<String> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(peers, vec!["10.0.0.3", "10.0.0.7"]);
}

#[tokio::test]
async fn status_routes_and_fallback() {
    let relay = Relay::new();
    let peer = relay.as_peer([127, 0, 0, 1]);

    for path in ["/_status/livez", "/_status/readyz", "/_status/version"] {
        let response = peer.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
    }

    let response = peer
        .oneshot(
            Request::builder()
                .uri("/no/such/route")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
