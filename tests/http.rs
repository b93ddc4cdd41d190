//! HTTP tests for the image fetcher and the CDN uploader.
//!
//! Each test starts an in-process axum server on `127.0.0.1:0` standing in
//! for the image host or the storage zone, and records what it received.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::Router;
use chrono::Datelike;
use post_migrate::config::{RemoteConfig, SourceConfig};
use post_migrate::fetch::{FetchError, HttpImageFetcher};
use post_migrate::traits::{ImageFetcher, ObjectStore};
use post_migrate::upload::{BunnyUploader, UploadError};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

#[derive(Clone, Debug)]
struct Recorded {
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// ─── Image host ─────────────────────────────────────────────────────

async fn image_host(
    State(rec): State<Recorder>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Vec<u8>) {
    rec.requests.lock().unwrap().push(Recorded {
        path: name.clone(),
        headers,
        body: Vec::new(),
    });
    match name.as_str() {
        "abc.png" => (StatusCode::OK, b"\x89PNG fake".to_vec()),
        "xyz" => (StatusCode::OK, b"jpeg bytes".to_vec()),
        _ => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

async fn start_image_host() -> (SocketAddr, Recorder) {
    let rec = Recorder::default();
    let router = Router::new()
        .route("/{name}", get(image_host))
        .with_state(rec.clone());
    (serve(router).await, rec)
}

fn source_config() -> SourceConfig {
    let headers: BTreeMap<String, String> = [
        ("User-Agent", "Mozilla/5.0 test"),
        ("Referer", "https://blog.example.com/"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    SourceConfig {
        host: "i.imgur.com".into(),
        timeout_secs: 5,
        headers,
    }
}

#[tokio::test]
async fn fetch_saves_file_with_browser_headers() {
    let (addr, rec) = start_image_host().await;
    let dir = TempDir::new().unwrap();
    let fetcher = HttpImageFetcher::new(&source_config()).unwrap();

    let name = fetcher
        .fetch(&format!("http://{}/abc.png", addr), dir.path())
        .await
        .unwrap();
    assert_eq!(name, "abc.png");
    assert_eq!(std::fs::read(dir.path().join("abc.png")).unwrap(), b"\x89PNG fake");

    let requests = rec.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers["user-agent"], "Mozilla/5.0 test");
    assert_eq!(requests[0].headers["referer"], "https://blog.example.com/");
}

#[tokio::test]
async fn fetch_without_extension_appends_default() {
    let (addr, _rec) = start_image_host().await;
    let dir = TempDir::new().unwrap();
    let fetcher = HttpImageFetcher::new(&source_config()).unwrap();

    let name = fetcher
        .fetch(&format!("http://{}/xyz", addr), dir.path())
        .await
        .unwrap();
    assert_eq!(name, "xyz.jpg");
    assert!(dir.path().join("xyz.jpg").exists());
}

#[tokio::test]
async fn fetch_404_is_status_error_and_writes_nothing() {
    let (addr, _rec) = start_image_host().await;
    let dir = TempDir::new().unwrap();
    let fetcher = HttpImageFetcher::new(&source_config()).unwrap();

    let err = fetcher
        .fetch(&format!("http://{}/missing.png", addr), dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn fetch_unreachable_host_is_transport_error() {
    let dir = TempDir::new().unwrap();
    let fetcher = HttpImageFetcher::new(&source_config()).unwrap();
    let err = fetcher
        .fetch("http://127.0.0.1:1/abc.png", dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
}

#[tokio::test]
async fn fetch_skips_existing_file() {
    let (addr, rec) = start_image_host().await;
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("abc.png"), b"from an earlier run").unwrap();
    let fetcher = HttpImageFetcher::new(&source_config()).unwrap();

    let name = fetcher
        .fetch(&format!("http://{}/abc.png", addr), dir.path())
        .await
        .unwrap();
    assert_eq!(name, "abc.png");
    assert!(rec.requests.lock().unwrap().is_empty());
}

// ─── Storage zone ───────────────────────────────────────────────────

async fn storage_zone(
    State(rec): State<Recorder>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let authorized = headers
        .get("AccessKey")
        .is_some_and(|v| v.as_bytes() == b"secret");
    rec.requests.lock().unwrap().push(Recorded {
        path,
        headers,
        body: body.to_vec(),
    });
    if authorized {
        StatusCode::CREATED
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn start_storage_zone() -> (SocketAddr, Recorder) {
    let rec = Recorder::default();
    let router = Router::new()
        .route("/{*path}", put(storage_zone))
        .with_state(rec.clone());
    (serve(router).await, rec)
}

fn remote_config(addr: SocketAddr) -> RemoteConfig {
    RemoteConfig {
        endpoint: format!("http://{}", addr),
        zone: "zone".into(),
        public_host: "cdn.example.com".into(),
        category: "blogs/imgur".into(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn upload_puts_under_category_and_year() {
    let (addr, rec) = start_storage_zone().await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("abc.png");
    std::fs::write(&local, b"png bytes").unwrap();

    let uploader = BunnyUploader::new(&remote_config(addr), "secret").unwrap();
    let url = uploader
        .upload(&local, "https://i.imgur.com/abc.png")
        .await
        .unwrap();

    let year = chrono::Utc::now().year();
    assert_eq!(
        url,
        format!("https://cdn.example.com/blogs/imgur/{}/abc.png", year)
    );

    let requests = rec.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.path, format!("zone/blogs/imgur/{}/abc.png", year));
    assert_eq!(req.body, b"png bytes");
    assert_eq!(req.headers["content-type"], "image/png");
    let checksum = req.headers["checksum"].to_str().unwrap();
    assert_eq!(checksum.len(), 64);
    assert_eq!(checksum, checksum.to_ascii_uppercase());
}

#[tokio::test]
async fn upload_omits_unknown_content_type() {
    let (addr, rec) = start_storage_zone().await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("clip.mp4");
    std::fs::write(&local, b"not an image").unwrap();

    let uploader = BunnyUploader::new(&remote_config(addr), "secret").unwrap();
    uploader
        .upload(&local, "https://i.imgur.com/clip.mp4")
        .await
        .unwrap();

    let requests = rec.requests.lock().unwrap();
    assert!(requests[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn upload_of_bare_name_sends_no_content_type() {
    let (addr, rec) = start_storage_zone().await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("xyz.jpg");
    std::fs::write(&local, b"GIF89a").unwrap();

    let uploader = BunnyUploader::new(&remote_config(addr), "secret").unwrap();
    let url = uploader
        .upload(&local, "https://i.imgur.com/xyz")
        .await
        .unwrap();
    assert!(url.ends_with("/xyz.jpg"));

    let requests = rec.requests.lock().unwrap();
    assert!(requests[0].path.ends_with("/xyz.jpg"));
    assert!(requests[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn upload_rejected_is_status_error() {
    let (addr, _rec) = start_storage_zone().await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("abc.png");
    std::fs::write(&local, b"png bytes").unwrap();

    let uploader = BunnyUploader::new(&remote_config(addr), "wrong").unwrap();
    let err = uploader
        .upload(&local, "https://i.imgur.com/abc.png")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Status { status: 401, .. }));
}
