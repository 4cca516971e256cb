//! `TelegramNotifier` against a local stand-in for the Bot API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};

use media_relay::config::TelegramConfig;
use media_relay::notify::{Notifier, SendError, TelegramNotifier};

#[derive(Clone, Default)]
struct FakeApi {
    /// (method, raw body) of every request.
    calls: Arc<Mutex<Vec<(String, String)>>>,
    rate_limited_once: Arc<AtomicU32>,
}

async fn handle(
    State(api): State<FakeApi>,
    Path((_bot, method)): Path<(String, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let body_text = String::from_utf8_lossy(&body).into_owned();
    api.calls.lock().push((method.clone(), body_text.clone()));

    match method.as_str() {
        "sendVideo" if body_text.contains("slow.mp4") => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, Json(json!({"ok": true, "result": {}})))
        }
        "sendVideo" if body_text.contains("broken.mp4") => (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: VIDEO_INVALID"})),
        ),
        "sendMessage" if api.rate_limited_once.fetch_add(1, Ordering::SeqCst) == 0 => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 0",
                "parameters": {"retry_after": 0}
            })),
        ),
        "getUpdates" => (
            StatusCode::OK,
            Json(json!({"ok": true, "result": [{
                "update_id": 41,
                "message": {
                    "message_id": 1,
                    "chat": {"id": 99, "type": "private"},
                    "from": {"id": 5, "is_bot": false, "first_name": "Al", "username": "al"},
                    "text": "https://v.example/x"
                }
            }]})),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({"ok": true, "result": {"message_id": 1}})),
        ),
    }
}

async fn start_fake_api() -> (FakeApi, String, tokio::task::JoinHandle<()>) {
    let api = FakeApi::default();
    let app: Router = Router::new()
        .route("/{bot}/{method}", post(handle))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (api, format!("http://{addr}"), server)
}

fn notifier(base_url: &str, upload_timeout_secs: u64) -> TelegramNotifier {
    TelegramNotifier::new(&TelegramConfig {
        bot_token: "123:ABC".to_string(),
        api_base_url: base_url.to_string(),
        upload_timeout_secs,
        poll_timeout_secs: 1,
    })
    .unwrap()
}

fn artifact(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really a video").unwrap();
    path
}

#[tokio::test]
async fn rich_media_is_uploaded_as_multipart_video() {
    let (api, base, server) = start_fake_api().await;
    let dir = tempfile::tempdir().unwrap();
    let path = artifact(dir.path(), "clip.mp4");

    notifier(&base, 30)
        .send_rich_media(42, &path, "Here is your video (about 0.0 MB)")
        .await
        .unwrap();

    let calls = api.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    let (method, body) = &calls[0];
    assert_eq!(method, "sendVideo");
    assert!(body.contains("name=\"video\""));
    assert!(body.contains("filename=\"clip.mp4\""));
    assert!(body.contains("Here is your video"));
    assert!(body.contains("not really a video"));
    server.abort();
}

#[tokio::test]
async fn generic_file_uses_send_document() {
    let (api, base, server) = start_fake_api().await;
    let dir = tempfile::tempdir().unwrap();
    let path = artifact(dir.path(), "clip.mp4");

    notifier(&base, 30)
        .send_generic_file(42, &path, "caption")
        .await
        .unwrap();

    let calls = api.calls.lock().clone();
    assert_eq!(calls[0].0, "sendDocument");
    assert!(calls[0].1.contains("name=\"document\""));
    server.abort();
}

#[tokio::test]
async fn api_errors_carry_code_and_description() {
    let (_api, base, server) = start_fake_api().await;
    let dir = tempfile::tempdir().unwrap();
    let path = artifact(dir.path(), "broken.mp4");

    let err = notifier(&base, 30)
        .send_rich_media(42, &path, "caption")
        .await
        .unwrap_err();

    match err {
        SendError::Api { code, description } => {
            assert_eq!(code, 400);
            assert!(description.contains("VIDEO_INVALID"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn slow_upload_surfaces_as_timeout() {
    let (_api, base, server) = start_fake_api().await;
    let dir = tempfile::tempdir().unwrap();
    let path = artifact(dir.path(), "slow.mp4");

    let err = notifier(&base, 1)
        .send_rich_media(42, &path, "caption")
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    server.abort();
}

#[tokio::test]
async fn missing_artifact_is_an_io_error() {
    let (api, base, server) = start_fake_api().await;

    let err = notifier(&base, 30)
        .send_rich_media(42, std::path::Path::new("/no/such/clip.mp4"), "caption")
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::Io(_)));
    assert!(api.calls.lock().is_empty());
    server.abort();
}

#[tokio::test]
async fn text_is_retried_after_rate_limit() {
    let (api, base, server) = start_fake_api().await;

    notifier(&base, 30).send_text(42, "hello").await.unwrap();

    let calls = api.calls.lock().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(m, _)| m == "sendMessage"));
    let payload: Value = serde_json::from_str(&calls[1].1).unwrap();
    assert_eq!(payload["chat_id"], 42);
    assert_eq!(payload["text"], "hello");
    server.abort();
}

#[tokio::test]
async fn updates_are_decoded() {
    let (api, base, server) = start_fake_api().await;

    let updates = notifier(&base, 30).get_updates(Some(40)).await.unwrap();

    assert_eq!(updates.len(), 1);
    let message = updates[0].message.as_ref().unwrap();
    assert_eq!(message.chat.id, 99);
    assert_eq!(message.text.as_deref(), Some("https://v.example/x"));

    let calls = api.calls.lock().clone();
    let payload: Value = serde_json::from_str(&calls[0].1).unwrap();
    assert_eq!(payload["offset"], 40);
    server.abort();
}
