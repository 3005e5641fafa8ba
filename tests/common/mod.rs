#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use ilmspace::auth::{create_jwt, hash_password};
use ilmspace::config::Config;
use ilmspace::db;
use ilmspace::domain::Role;
use ilmspace::infrastructure::AppState;
use ilmspace::models::{course, lesson, user};
use ilmspace::server::build_app;
use ilmspace::utils::time;
use ilmspace::services::builder_service::{self, LessonInput, ModuleInput, NewCourse};
use ilmspace::services::moderation_service::{self, ApprovalInput, AuditContext};
use ilmspace::services::{author_service, payment_service};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tower::util::ServiceExt;

pub const CLICK_SECRET: &str = "click-test-secret";

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DEBUG".to_string(), "true".to_string()),
        ("SECRET_KEY".to_string(), "test-secret".to_string()),
        ("CLICK_SECRET_KEY".to_string(), CLICK_SECRET.to_string()),
        ("CLICK_MERCHANT_ID".to_string(), "click-merchant".to_string()),
        ("CLICK_SERVICE_ID".to_string(), "77".to_string()),
        ("PAYME_MERCHANT_ID".to_string(), "payme-merchant".to_string()),
        ("PAYME_SECRET_KEY".to_string(), "payme-test-secret".to_string()),
        ("UZUM_MERCHANT_ID".to_string(), "uzum-merchant".to_string()),
        ("UZUM_SECRET_KEY".to_string(), "uzum-test-secret".to_string()),
    ]);
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

/// Fresh database with seeded gateways, wrapped in an app state.
pub async fn setup_state(overrides: &[(&str, &str)]) -> AppState {
    let config = test_config(overrides);
    let db = setup_test_db().await;
    payment_service::seed_gateways(&db, &config)
        .await
        .expect("Failed to seed gateways");
    AppState::new(db, config)
}

pub fn app(state: &AppState) -> Router {
    build_app(state.clone())
}

/// Inserts an active, phone-verified account. Authors also get their
/// profile and balance rows.
pub async fn create_user(db: &DatabaseConnection, phone: &str, role: Role) -> user::Model {
    let now = time::now();
    let account = user::ActiveModel {
        phone_number: Set(Some(phone.to_string())),
        email: Set(None),
        password_hash: Set(hash_password("password123").unwrap()),
        first_name: Set("Test".to_string()),
        last_name: Set(role.as_str().to_lowercase()),
        age: Set(Some(30)),
        telegram_id: Set(None),
        role: Set(role.as_str().to_string()),
        is_staff: Set(role == Role::Admin),
        is_active: Set(true),
        phone_verified: Set(true),
        email_verified: Set(false),
        date_joined: Set(now.clone()),
        last_login: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user");

    if role == Role::Author {
        author_service::ensure_records(db, account.id)
            .await
            .expect("Failed to create author records");
    }
    account
}

pub fn token_for(state: &AppState, account: &user::Model) -> String {
    create_jwt(account.id, &account.role, &state.config.secret_key).unwrap()
}

/// A published course with one module of `lessons` lessons, the first one
/// a free preview.
pub async fn published_course(
    db: &DatabaseConnection,
    author: &user::Model,
    admin: &user::Model,
    title: &str,
    price: i64,
    lessons: usize,
) -> (course::Model, Vec<lesson::Model>) {
    let draft = builder_service::create_course(
        db,
        author,
        NewCourse {
            title: title.to_string(),
            description: "A thorough course".to_string(),
            short_description: "Short".to_string(),
            price,
            level: None,
            language: None,
            requirements: String::new(),
            what_you_will_learn: String::new(),
            trailer_url: String::new(),
            thumbnail: None,
            category_ids: vec![],
        },
    )
    .await
    .expect("create course");

    let module = builder_service::add_module(
        db,
        author,
        draft.id,
        ModuleInput {
            title: "Basics".to_string(),
            description: String::new(),
        },
    )
    .await
    .expect("add module");

    let mut created = Vec::new();
    for i in 0..lessons {
        let lesson = builder_service::add_lesson(
            db,
            author,
            module.id,
            LessonInput {
                title: format!("Lesson {}", i + 1),
                description: String::new(),
                video_url: format!("https://videos.example/{}", i + 1),
                duration_minutes: 10,
                text_content: String::new(),
                is_preview: i == 0,
            },
        )
        .await
        .expect("add lesson");
        created.push(lesson);
    }

    builder_service::submit_for_review(db, author, draft.id)
        .await
        .expect("submit");
    let course = moderation_service::approve_course(
        db,
        admin,
        &AuditContext::default(),
        draft.id,
        ApprovalInput::default(),
    )
    .await
    .expect("approve");

    (course, created)
}

/// Send a request through the full app. Returns the status and the parsed
/// JSON body (`Null` when the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "localhost");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
