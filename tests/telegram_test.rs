mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use ilmspace::domain::Role;
use ilmspace::models::{social_auth, user};
use ilmspace::modules::telegram::bot::{ACCOUNT_LINKED, NO_PENDING_REGISTRATION, WELCOME_BACK};
use ilmspace::modules::telegram::{OtpNotifier, OutgoingMessage, TelegramNotifier};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{Value, json};
use tower::util::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "12345:TEST";
const SECRET: &str = "hook-secret";

fn bot_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} }))
}

async fn webhook(app: &Router, secret: Option<&str>, update: Value) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/telegram/webhook")
        .header("host", "localhost")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-telegram-bot-api-secret-token", secret);
    }
    let request = builder.body(Body::from(update.to_string())).unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

fn contact_update(chat_id: i64, phone: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "chat": { "id": chat_id },
            "from": { "id": chat_id },
            "contact": { "phone_number": phone, "user_id": chat_id }
        }
    })
}

fn start_update(chat_id: i64) -> Value {
    json!({
        "update_id": 2,
        "message": {
            "chat": { "id": chat_id },
            "from": { "id": chat_id },
            "text": "/start"
        }
    })
}

#[tokio::test]
async fn test_notifier_posts_send_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 42, "text": "hello" })))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&server.uri(), TOKEN);
    notifier
        .send(OutgoingMessage::text(42, "hello"))
        .await
        .expect("message delivered");
}

#[tokio::test]
async fn test_notifier_surfaces_bot_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "ok": false, "description": "Bad Request: chat not found" })),
        )
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&server.uri(), TOKEN);
    let err = notifier
        .send(OutgoingMessage::text(1, "hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("chat not found"));
}

#[tokio::test]
async fn test_webhook_requires_secret() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let state = setup_state(&[
        ("BOT_TOKEN", TOKEN),
        ("TELEGRAM_API_URL", &uri),
        ("TELEGRAM_WEBHOOK_SECRET", SECRET),
    ])
    .await;
    let app = app(&state);

    assert_eq!(webhook(&app, None, start_update(7)).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
        webhook(&app, Some("wrong"), start_update(7)).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_contact_delivers_registration_code() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let state = setup_state(&[
        ("BOT_TOKEN", TOKEN),
        ("TELEGRAM_API_URL", &uri),
        ("TELEGRAM_WEBHOOK_SECRET", SECRET),
    ])
    .await;
    let app = app(&state);

    // Nothing requested yet
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_string_contains("No pending registration"))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&server)
        .await;
    assert!(NO_PENDING_REGISTRATION.contains("No pending registration"));
    let status = webhook(&app, Some(SECRET), contact_update(900, "998901234500")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        "POST",
        "/api/auth/register/request-otp",
        None,
        Some(json!({ "phone_number": "+998901234500" })),
    )
    .await;
    let code = body["otp"]["debug_code"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 900 })))
        .and(body_string_contains(code.as_str()))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&server)
        .await;
    let status = webhook(&app, Some(SECRET), contact_update(900, "998901234500")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_contact_links_existing_account() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let state = setup_state(&[("BOT_TOKEN", TOKEN), ("TELEGRAM_API_URL", &uri)]).await;
    let app = app(&state);
    let student = create_user(state.db(), "+998901234501", Role::Student).await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 901, "text": ACCOUNT_LINKED })))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&server)
        .await;
    let status = webhook(&app, None, contact_update(901, "+998901234501")).await;
    assert_eq!(status, StatusCode::OK);

    let linked = user::Entity::find_by_id(student.id)
        .one(state.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.telegram_id, Some(901));

    let links = social_auth::Entity::find()
        .filter(social_auth::Column::UserId.eq(student.id))
        .all(state.db())
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].provider, "TELEGRAM");
    assert_eq!(links[0].provider_user_id, "901");

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token_for(&state, &student)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["social_auths"][0]["provider"], "TELEGRAM");
    assert!(body["social_auths"][0].get("access_token").is_none());

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 901, "text": WELCOME_BACK })))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&server)
        .await;
    let status = webhook(&app, None, start_update(901)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_code_is_pushed_to_linked_chat() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let state = setup_state(&[("BOT_TOKEN", TOKEN), ("TELEGRAM_API_URL", &uri)]).await;
    let app = app(&state);

    let student = create_user(state.db(), "+998901234502", Role::Student).await;
    let mut active: user::ActiveModel = student.into();
    active.telegram_id = Set(Some(902));
    active.update(state.db()).await.unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 902 })))
        .and(body_string_contains("login code"))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login/request-otp",
        None,
        Some(json!({ "phone_number": "+998901234502" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = body["otp"]["debug_code"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login/verify-otp",
        None,
        Some(json!({ "phone_number": "+998901234502", "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    // Codes are single use
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login/verify-otp",
        None,
        Some(json!({ "phone_number": "+998901234502", "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_telegram_identity_links_one_account() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let state = setup_state(&[("BOT_TOKEN", TOKEN), ("TELEGRAM_API_URL", &uri)]).await;
    let app = app(&state);
    let first = create_user(state.db(), "+998901234503", Role::Student).await;
    let second = create_user(state.db(), "+998901234504", Role::Student).await;

    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(bot_ok())
        .mount(&server)
        .await;

    let status = webhook(&app, None, contact_update(903, "+998901234503")).await;
    assert_eq!(status, StatusCode::OK);
    let status = webhook(&app, None, contact_update(903, "+998901234504")).await;
    assert_eq!(status, StatusCode::OK);

    let first = user::Entity::find_by_id(first.id).one(state.db()).await.unwrap().unwrap();
    let second = user::Entity::find_by_id(second.id).one(state.db()).await.unwrap().unwrap();
    assert_eq!(first.telegram_id, Some(903));
    assert_eq!(second.telegram_id, None);

    let links = social_auth::Entity::find()
        .filter(social_auth::Column::ProviderUserId.eq("903"))
        .all(state.db())
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].user_id, first.id);
}
