mod common;

use axum::http::StatusCode;
use common::*;
use ilmspace::domain::{ActionType, Role};
use ilmspace::models::{course_moderation, user, user_moderation};
use ilmspace::services::builder_service::{self, LessonInput, ModuleInput, NewCourse};
use ilmspace::services::moderation_service::{self, AuditContext, LogEntry};
use ilmspace::utils::time;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;

/// A course sitting in the moderation queue
async fn pending_course(db: &sea_orm::DatabaseConnection, author: &user::Model) -> i32 {
    let course = builder_service::create_course(
        db,
        author,
        NewCourse {
            title: "Web Design".to_string(),
            description: String::new(),
            short_description: String::new(),
            price: 0,
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
    .unwrap();
    let module = builder_service::add_module(
        db,
        author,
        course.id,
        ModuleInput {
            title: "Intro".to_string(),
            description: String::new(),
        },
    )
    .await
    .unwrap();
    builder_service::add_lesson(
        db,
        author,
        module.id,
        LessonInput {
            title: "Layouts".to_string(),
            description: String::new(),
            video_url: String::new(),
            duration_minutes: 5,
            text_content: "Flexbox".to_string(),
            is_preview: false,
        },
    )
    .await
    .unwrap();
    builder_service::submit_for_review(db, author, course.id)
        .await
        .unwrap();
    course.id
}

#[tokio::test]
async fn test_reject_and_resubmit() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let author = create_user(db, "+998902000001", Role::Author).await;
    let admin = create_user(db, "+998902000002", Role::Admin).await;
    let admin_token = token_for(&state, &admin);
    let course_id = pending_course(db, &author).await;

    let reject = format!("/api/admin/courses/{course_id}/reject");
    let (status, _) = send(&app, "POST", &reject, Some(&admin_token), Some(json!({ "reason": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        &reject,
        Some(&admin_token),
        Some(json!({ "reason": "Audio is inaudible" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["status"], "REJECTED");

    let record = course_moderation::Entity::find()
        .filter(course_moderation::Column::CourseId.eq(course_id))
        .order_by_desc(course_moderation::Column::Id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "REJECTED");
    assert_eq!(record.rejection_reason, "Audio is inaudible");
    assert_eq!(record.reviewer_id, Some(admin.id));

    // Rejected courses may be submitted again
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/builder/courses/{course_id}/submit"),
        Some(&token_for(&state, &author)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["status"], "PENDING");

    let (_, body) = send(
        &app,
        "GET",
        "/api/admin/logs?action_type=COURSE_REJECTED",
        Some(&admin_token),
        None,
    )
    .await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["affected_course_id"], course_id);
}

#[tokio::test]
async fn test_request_changes_returns_to_draft() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let author = create_user(db, "+998902000003", Role::Author).await;
    let admin = create_user(db, "+998902000004", Role::Admin).await;
    let course_id = pending_course(db, &author).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/courses/{course_id}/request-changes"),
        Some(&token_for(&state, &admin)),
        Some(json!({ "changes": "Add a course description" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["status"], "DRAFT");

    let record = course_moderation::Entity::find()
        .filter(course_moderation::Column::CourseId.eq(course_id))
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "CHANGES_REQUESTED");
    assert_eq!(record.changes_requested, "Add a course description");
}

#[tokio::test]
async fn test_approval_quality_score_is_bounded() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let author = create_user(db, "+998902000005", Role::Author).await;
    let admin = create_user(db, "+998902000006", Role::Admin).await;
    let course_id = pending_course(db, &author).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/admin/courses/{course_id}/approve"),
        Some(&token_for(&state, &admin)),
        Some(json!({ "quality_score": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_archive_hides_course() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let author = create_user(db, "+998902000007", Role::Author).await;
    let admin = create_user(db, "+998902000008", Role::Admin).await;
    let (course, _) = published_course(db, &author, &admin, "Old Course", 0, 1).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/courses/{}/archive", course.id),
        Some(&token_for(&state, &admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["status"], "ARCHIVED");

    let (status, _) = send(&app, "GET", &format!("/api/courses/{}", course.slug), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ban_and_unban() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let admin = create_user(db, "+998902000009", Role::Admin).await;
    let student = create_user(db, "+998902000010", Role::Student).await;
    let admin_token = token_for(&state, &admin);
    let student_token = token_for(&state, &student);
    let moderate = format!("/api/admin/users/{}/moderate", student.id);

    // Temporary bans need a duration
    let (status, _) = send(
        &app,
        "POST",
        &moderate,
        Some(&admin_token),
        Some(json!({ "action": "BAN", "reason": "SPAM", "details": "Link spam in reviews" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        &moderate,
        Some(&admin_token),
        Some(json!({
            "action": "BAN",
            "reason": "SPAM",
            "details": "Link spam in reviews",
            "is_permanent": true,
            "evidence_urls": ["https://ilmspace.uz/reviews/1"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_is_active"], false);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        &moderate,
        Some(&admin_token),
        Some(json!({ "action": "UNBAN", "reason": "OTHER", "details": "Appeal accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_is_active"], true);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/admin/logs", Some(&admin_token), None).await;
    let actions: Vec<&str> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["action_type"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"USER_BANNED"));
    assert!(actions.contains(&"USER_UNBANNED"));
}

#[tokio::test]
async fn test_admin_cannot_moderate_self() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let admin = create_user(state.db(), "+998902000011", Role::Admin).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/admin/users/{}/moderate", admin.id),
        Some(&token_for(&state, &admin)),
        Some(json!({ "action": "WARNING", "reason": "OTHER", "details": "test" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_duration_is_rejected() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let admin = create_user(db, "+998902000021", Role::Admin).await;
    let student = create_user(db, "+998902000022", Role::Student).await;
    let uri = format!("/api/admin/users/{}/moderate", student.id);
    let token = token_for(&state, &admin);

    for days in [9_000_000_000_000_000_i64, i64::MAX, moderation_service::MAX_SANCTION_DAYS + 1] {
        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(&token),
            Some(json!({
                "action": "SUSPEND",
                "reason": "SPAM",
                "details": "Link spam",
                "duration_days": days,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{days}");
        assert_eq!(body["success"], false);
    }

    let sanctions = user_moderation::Entity::find()
        .filter(user_moderation::Column::UserId.eq(student.id))
        .all(db)
        .await
        .unwrap();
    assert!(sanctions.is_empty());
    let account = user::Entity::find_by_id(student.id).one(db).await.unwrap().unwrap();
    assert!(account.is_active);
}

#[tokio::test]
async fn test_expired_suspension_is_lifted() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let admin = create_user(db, "+998902000012", Role::Admin).await;
    let student = create_user(db, "+998902000013", Role::Student).await;
    let student_token = token_for(&state, &student);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/admin/users/{}/moderate", student.id),
        Some(&token_for(&state, &admin)),
        Some(json!({
            "action": "SUSPEND",
            "reason": "HARASSMENT",
            "details": "Rude comments",
            "duration_days": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Move the expiry into the past
    let sanction = user_moderation::Entity::find()
        .filter(user_moderation::Column::UserId.eq(student.id))
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert!(sanction.expires_at.is_some());
    let mut active: user_moderation::ActiveModel = sanction.into();
    active.expires_at = Set(Some(time::to_db(
        chrono::Utc::now() - chrono::Duration::hours(1),
    )));
    active.update(db).await.unwrap();

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&student_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_active"], true);
}

#[tokio::test]
async fn test_author_verification() {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let admin = create_user(db, "+998902000014", Role::Admin).await;
    let author = create_user(db, "+998902000015", Role::Author).await;
    let admin_token = token_for(&state, &admin);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/authors/{}/verify", author.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["is_verified"], true);
    assert!(body["profile"]["verified_at"].is_string());

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/admin/authors/{}/unverify", author.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(body["profile"]["is_verified"], false);
}

#[tokio::test]
async fn test_log_records_request_context() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "+998902000016", Role::Admin).await;
    let ctx = AuditContext {
        ip: Some("203.0.113.7".to_string()),
        user_agent: "integration-test".to_string(),
    };

    let entry = moderation_service::log_action(
        &db,
        admin.id,
        &ctx,
        LogEntry::new(ActionType::ConfigChanged, "Changed something").data(json!({ "k": 1 })),
    )
    .await
    .unwrap();
    assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(entry.user_agent, "integration-test");

    let logs = moderation_service::list_logs(&db, Some(ActionType::ConfigChanged), 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    let data: serde_json::Value = serde_json::from_str(&logs[0].additional_data).unwrap();
    assert_eq!(data["k"], 1);
}
