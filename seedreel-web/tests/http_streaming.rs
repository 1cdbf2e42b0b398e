//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use futures::StreamExt;
use seedreel_core::SessionManager;
use seedreel_core::config::SessionConfig;
use seedreel_core::engine::{MockEngine, MockFile};
use seedreel_core::session::{SessionSource, StatusUpdate, TelemetrySink};
use seedreel_web::{AppState, router};
use tower::ServiceExt;

const MAGNET: &str = "magnet:?xt=urn:btih:abababababababababababababababababababab";
const MIB: u64 = 1024 * 1024;

struct Fixture {
    app: Router,
    manager: Arc<SessionManager>,
    id: String,
}

async fn fixture(files: Vec<MockFile>) -> Fixture {
    let config = SessionConfig {
        telemetry_interval: Duration::from_secs(60),
        cleanup_delay: Duration::ZERO,
        resolve_timeout: Duration::from_secs(1),
    };
    let manager = Arc::new(SessionManager::new(Arc::new(MockEngine::new(files)), config));
    let sink: Arc<dyn TelemetrySink> = Arc::new(|_update: StatusUpdate| {});
    let id = manager
        .start(SessionSource::Locator(MAGNET.to_string()), sink)
        .await
        .unwrap()
        .id;

    Fixture {
        app: router(AppState::new(manager.clone(), None)),
        manager,
        id,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_range(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_range_request_returns_partial_content() {
    let f = fixture(vec![
        MockFile::new("video.mkv", 500 * MIB),
        MockFile::new("subs.srt", 64),
    ])
    .await;

    let response = f
        .app
        .oneshot(get_range(&format!("/stream/{}", f.id), "bytes=0-99"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 0-99/524288000"
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/x-matroska");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 100);
}

#[tokio::test]
async fn test_full_request_is_complete() {
    let f = fixture(vec![MockFile::new("clip.mp4", 70_000)]).await;

    let response = f
        .app
        .oneshot(get(&format!("/stream/{}", f.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "70000");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 70_000);
}

#[tokio::test]
async fn test_head_reports_length_without_body() {
    let f = fixture(vec![MockFile::new("clip.webm", 4096)]).await;

    let request = Request::builder()
        .method(Method::HEAD)
        .uri(format!("/stream/{}", f.id))
        .body(Body::empty())
        .unwrap();
    let response = f.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "4096");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_unknown_stream_is_not_found() {
    let f = fixture(vec![MockFile::new("clip.mp4", 10)]).await;

    let response = f.app.oneshot(get("/stream/bm9wZQ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Video not found");
}

#[tokio::test]
async fn test_range_past_end_is_unsatisfiable() {
    let f = fixture(vec![MockFile::new("clip.mp4", 1000)]).await;

    let response = f
        .app
        .oneshot(get_range(&format!("/stream/{}", f.id), "bytes=1000-"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
}

#[tokio::test]
async fn test_subtitles_are_served_as_vtt() {
    let f = fixture(vec![
        MockFile::new("movie.mp4", 1000),
        MockFile::with_data("movie.srt", &b"1\n00:00:01,500 --> 00:00:02,000\nHello\n"[..]),
    ])
    .await;

    let response = f
        .app
        .clone()
        .oneshot(get(&format!("/subtitles/{}/0", f.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/vtt");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        &body[..],
        b"WEBVTT\n\n1\n00:00:01.500 --> 00:00:02.000\nHello\n"
    );

    for index in ["1", "abc"] {
        let response = f
            .app
            .clone()
            .oneshot(get(&format!("/subtitles/{}/{index}", f.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_health_counts_sessions() {
    let f = fixture(vec![MockFile::new("movie.mp4", 1000)]).await;

    let response = f.app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["activeSessions"], 1);

    f.manager.teardown(&f.id).await;
    let response = f.app.oneshot(get("/health")).await.unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["activeSessions"], 0);
}

#[tokio::test]
async fn test_disconnect_mid_stream_keeps_session_usable() {
    let f = fixture(vec![MockFile::new("movie.mp4", 10 * MIB)]).await;

    let response = f
        .app
        .clone()
        .oneshot(get(&format!("/stream/{}", f.id)))
        .await
        .unwrap();
    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    drop(body);

    assert_eq!(f.manager.active_sessions(), 1);

    let response = f
        .app
        .oneshot(get_range(&format!("/stream/{}", f.id), "bytes=0-9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let again = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&again[..], &first[..10]);
}

#[tokio::test]
async fn test_root_without_public_dir_is_not_found() {
    let f = fixture(vec![MockFile::new("movie.mp4", 1000)]).await;
    let response = f.app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_dir_serves_player_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>player</html>").unwrap();
    std::fs::write(dir.path().join("client.js"), "console.log(1)").unwrap();

    let f = fixture(vec![MockFile::new("movie.mp4", 1000)]).await;
    let app = router(AppState::new(f.manager.clone(), Some(dir.path().to_path_buf())));

    let index = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    let body = to_bytes(index.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<html>player</html>");

    let script = app.oneshot(get("/client.js")).await.unwrap();
    assert_eq!(script.status(), StatusCode::OK);
}
