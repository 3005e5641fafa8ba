mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use ilmspace::auth::{create_jwt, decode_jwt, hash_password, verify_password};
use ilmspace::domain::Role;
use ilmspace::models::user;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn test_password_hashing() {
    let password = "super_secret_password";
    let hash = hash_password(password).expect("Failed to hash password");

    assert_ne!(password, hash);
    assert!(verify_password(password, &hash).unwrap());
    assert!(!verify_password("wrong_password", &hash).unwrap());
}

#[tokio::test]
async fn test_jwt_creation_and_verification() {
    let token = create_jwt(7, "STUDENT", "signing-key").expect("Failed to create JWT");
    assert!(!token.is_empty());

    let claims = decode_jwt(&token, "signing-key").expect("Failed to verify JWT");
    assert_eq!(claims.sub, "7");
    assert_eq!(claims.role, "STUDENT");
}

#[tokio::test]
async fn test_disallowed_host_is_rejected() {
    let state = setup_state(&[]).await;
    let app = app(&state);

    let request = Request::builder()
        .uri("/api/health")
        .header("host", "evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Port suffixes are ignored
    let request = Request::builder()
        .uri("/api/health")
        .header("host", "127.0.0.1:8000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wildcard_subdomains_are_allowed() {
    let state = setup_state(&[("ALLOWED_HOSTS", ".ilmspace.uz")]).await;
    let app = app(&state);

    let request = Request::builder()
        .uri("/health/")
        .header("host", "api.ilmspace.uz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let state = setup_state(&[]).await;
    let app = app(&state);

    for (method, uri) in [
        ("GET", "/api/auth/me"),
        ("GET", "/api/student/dashboard"),
        ("GET", "/api/admin/dashboard"),
        ("GET", "/api/payments/transactions"),
    ] {
        let (status, body) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["success"], false);
    }

    let (status, _) = send(&app, "GET", "/api/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let student = create_user(state.db(), "+998900000100", Role::Student).await;

    let forged = create_jwt(student.id, "ADMIN", "someone-elses-key").unwrap();
    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_guards() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let student = create_user(state.db(), "+998900000101", Role::Student).await;
    let author = create_user(state.db(), "+998900000102", Role::Author).await;
    let admin = create_user(state.db(), "+998900000103", Role::Admin).await;

    let (status, _) = send(
        &app,
        "GET",
        "/api/admin/dashboard",
        Some(&token_for(&state, &student)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "GET",
        "/api/admin/dashboard",
        Some(&token_for(&state, &author)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        "/api/admin/dashboard",
        Some(&token_for(&state, &admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dashboard"]["total_users"], 3);

    let (status, _) = send(
        &app,
        "POST",
        "/api/categories",
        Some(&token_for(&state, &author)),
        Some(json!({ "name": "Programming" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_flag_grants_admin_access() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let staff = create_user(state.db(), "+998900000104", Role::Student).await;
    let mut active: user::ActiveModel = staff.into();
    active.is_staff = Set(true);
    let staff = active.update(state.db()).await.unwrap();

    let (status, _) = send(
        &app,
        "GET",
        "/api/admin/moderation/queue",
        Some(&token_for(&state, &staff)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_inactive_account_is_forbidden() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let student = create_user(state.db(), "+998900000105", Role::Student).await;
    let token = token_for(&state, &student);

    let mut active: user::ActiveModel = student.into();
    active.is_active = Set(false);
    active.update(state.db()).await.unwrap();

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "identifier": "+998900000105", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_author_balance_is_private() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let author = create_user(state.db(), "+998900000106", Role::Author).await;
    let other = create_user(state.db(), "+998900000107", Role::Student).await;
    let uri = format!("/api/authors/{}", author.id);

    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["author"]["balance"].is_null());

    let (_, body) = send(&app, "GET", &uri, Some(&token_for(&state, &other)), None).await;
    assert!(body["author"]["balance"].is_null());

    let (_, body) = send(&app, "GET", &uri, Some(&token_for(&state, &author)), None).await;
    assert_eq!(body["author"]["balance"]["available_balance"], 0);
}

#[tokio::test]
async fn test_internal_errors_are_not_leaked() {
    let state = setup_state(&[]).await;
    let app = app(&state);

    let (status, body) = send(&app, "GET", "/api/courses/does-not-exist", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_malformed_bodies_use_error_envelope() {
    let state = setup_state(&[]).await;
    let app = app(&state);

    let cases = [
        (Some("application/json"), "{not json"),
        (Some("application/json"), r#"{"phone_number": 42}"#),
        (Some("application/json"), "{}"),
        (None, r#"{"phone_number": "+998901234567"}"#),
    ];
    for (content_type, raw) in cases {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/auth/register/request-otp")
            .header("host", "localhost");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let request = builder.body(Body::from(raw)).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{raw}");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("JSON envelope");
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }
}
