mod common;

use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use common::*;
use sea_orm::TransactionTrait;
use tower::util::ServiceExt;

async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header("host", "localhost")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ilmspace-{name}-{}", uuid::Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn test_static_and_media_cache_headers() {
    let static_root = scratch_dir("static");
    let media_root = scratch_dir("media");
    std::fs::write(static_root.join("app.css"), "body{}").unwrap();
    std::fs::write(media_root.join("thumb.txt"), "thumb").unwrap();

    let state = setup_state(&[
        ("STATIC_ROOT", static_root.to_str().unwrap()),
        ("MEDIA_ROOT", media_root.to_str().unwrap()),
    ])
    .await;
    let app = app(&state);

    let response = get(&app, "/static/app.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=2592000, immutable"
    );

    let response = get(&app, "/media/thumb.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=604800");

    // API responses are not marked cacheable
    let response = get(&app, "/health").await;
    assert!(response.headers().get(header::CACHE_CONTROL).is_none());

    let _ = std::fs::remove_dir_all(static_root);
    let _ = std::fs::remove_dir_all(media_root);
}

#[tokio::test]
async fn test_slow_request_times_out() {
    let state = setup_state(&[("REQUEST_TIMEOUT", "1")]).await;
    let app = app(&state);

    // The in-memory database has a single connection; holding it open
    // stalls any handler that needs the database.
    let held = state.db().begin().await.unwrap();
    let response = get(&app, "/api/courses").await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    held.rollback().await.unwrap();

    let response = get(&app, "/api/courses").await;
    assert_eq!(response.status(), StatusCode::OK);
}
