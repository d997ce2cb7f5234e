use super::*;
use std::collections::HashMap;

use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::json;

// =============================================================
// Fake REST server
// =============================================================

fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c == "session=tok")
}

async fn status_full() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "",
        "data": {
            "chat_room_enabled": false,
            "chat_room_message_limit": 50,
            "chat_room_max_message_length": 200,
            "system_name": "New API"
        }
    }))
}

async fn status_sparse() -> Json<serde_json::Value> {
    Json(json!({"success": true, "data": {"system_name": "New API"}}))
}

async fn count(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if !has_session(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": "无权进行此操作，未登录"})))
            .into_response();
    }
    let n = if params.get("room").map(String::as_str) == Some("global") { 42 } else { 0 };
    Json(json!({"success": true, "data": {"count": n}})).into_response()
}

async fn upload(headers: HeaderMap, body: axum::body::Bytes) -> Json<serde_json::Value> {
    let multipart = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    let has_file = String::from_utf8_lossy(&body).contains("name=\"file\"");
    if multipart && has_file {
        Json(json!({"success": true, "data": {"url": "/api/chat/images/2025-01-01/abc.png"}}))
    } else {
        Json(json!({"success": false, "message": "no file"}))
    }
}

async fn broken() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream down").into_response()
}

async fn start_server(sparse_status: bool) -> String {
    let status_route = if sparse_status { get(status_sparse) } else { get(status_full) };
    let app = Router::new()
        .route("/api/status", status_route)
        .route("/api/chat/count", get(count))
        .route("/api/chat/images", post(upload))
        .route("/broken/api/status", get(broken));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base: &str, token: Option<&str>) -> ApiClient {
    ApiClient::new(Endpoint::parse(base).unwrap(), token).unwrap()
}

// =============================================================
// Tests
// =============================================================

#[tokio::test]
async fn status_reads_chat_room_fields() {
    let base = start_server(false).await;
    let status = client(&base, None).status().await.unwrap();
    assert_eq!(status, ChatRoomStatus { enabled: false, message_limit: 50, max_message_length: 200 });
}

#[tokio::test]
async fn status_defaults_when_fields_absent() {
    let base = start_server(true).await;
    let status = client(&base, None).status().await.unwrap();
    assert_eq!(
        status,
        ChatRoomStatus {
            enabled: true,
            message_limit: DEFAULT_MESSAGE_LIMIT,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    );
}

#[tokio::test]
async fn count_sends_session_cookie() {
    let base = start_server(false).await;
    assert_eq!(client(&base, Some("tok")).message_count("global").await.unwrap(), 42);
    assert_eq!(client(&base, Some("tok")).message_count("  ").await.unwrap(), 42);
}

#[tokio::test]
async fn count_without_session_surfaces_server_message() {
    let base = start_server(false).await;
    let err = client(&base, None).message_count("global").await.unwrap_err();
    assert!(matches!(err, FeedError::Api(ref m) if m.contains("未登录")), "got {err:?}");
}

#[tokio::test]
async fn non_json_error_falls_back_to_status() {
    let base = start_server(false).await;
    let err = client(&format!("{base}/broken"), None).status().await.unwrap_err();
    assert!(matches!(err, FeedError::Api(ref m) if m.contains("502")), "got {err:?}");
}

#[tokio::test]
async fn upload_returns_url() {
    let base = start_server(false).await;
    let url = client(&base, Some("tok"))
        .upload_image("a.png", "image/png", vec![0x89, b'P', b'N', b'G'])
        .await
        .unwrap();
    assert_eq!(url, "/api/chat/images/2025-01-01/abc.png");
}

#[tokio::test]
async fn upload_rejects_non_images_before_sending() {
    // Nothing listens here; validation must fail first.
    let api = client("http://127.0.0.1:9", None);
    let err = api.upload_image("a.txt", "text/plain", b"hi".to_vec()).await.unwrap_err();
    assert!(matches!(err, FeedError::InvalidImage(_)));

    let err = api
        .upload_image("big.png", "image/png", vec![0; MAX_IMAGE_BYTES + 1])
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::InvalidImage(_)));
}

#[tokio::test]
async fn upload_file_rejects_unknown_extension() {
    let api = client("http://127.0.0.1:9", None);
    let err = api.upload_image_file(Path::new("notes.txt")).await.unwrap_err();
    assert!(matches!(err, FeedError::InvalidImage(_)));
}

#[test]
fn content_type_from_extension() {
    assert_eq!(image_content_type(Path::new("a.PNG")), Some("image/png"));
    assert_eq!(image_content_type(Path::new("dir/b.jpeg")), Some("image/jpeg"));
    assert_eq!(image_content_type(Path::new("c.webp")), Some("image/webp"));
    assert_eq!(image_content_type(Path::new("d")), None);
    assert_eq!(image_content_type(Path::new("e.exe")), None);
}

#[test]
fn validate_image_limits() {
    assert!(validate_image("image/gif", MAX_IMAGE_BYTES).is_ok());
    assert!(validate_image("image/gif", MAX_IMAGE_BYTES + 1).is_err());
    assert!(validate_image("application/pdf", 10).is_err());
}
