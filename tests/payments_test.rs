mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use ilmspace::domain::Role;
use ilmspace::infrastructure::AppState;
use ilmspace::models::{course, course_enrollment, transaction, user};
use ilmspace::modules::gateways::{callback_payload, sign};
use ilmspace::services::author_service;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use tower::util::ServiceExt;

struct Market {
    state: AppState,
    app: Router,
    author: user::Model,
    admin: user::Model,
    student: user::Model,
    course: course::Model,
}

const PRICE: i64 = 10_000_000;

async fn market() -> Market {
    let state = setup_state(&[]).await;
    let app = app(&state);
    let db = state.db();
    let author = create_user(db, "+998901000001", Role::Author).await;
    let admin = create_user(db, "+998901000002", Role::Admin).await;
    let student = create_user(db, "+998901000003", Role::Student).await;
    let (course, _) = published_course(db, &author, &admin, "Data Science", PRICE, 2).await;
    Market {
        state,
        app,
        author,
        admin,
        student,
        course,
    }
}

async fn callback(app: &Router, gateway: &str, body: Value, signature: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/payments/callback/{gateway}"))
        .header("host", "localhost")
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn signed_success(transaction_id: &str, amount: i64) -> (Value, String) {
    let payload = callback_payload(transaction_id, "CLICK-42", amount, "success");
    let signature = sign(CLICK_SECRET, &payload).unwrap();
    (
        json!({
            "transaction_id": transaction_id,
            "gateway_transaction_id": "CLICK-42",
            "amount": amount,
            "status": "success",
        }),
        signature,
    )
}

async fn start_checkout(m: &Market, gateway: &str) -> (StatusCode, Value) {
    send(
        &m.app,
        "POST",
        &format!("/api/courses/{}/checkout", m.course.slug),
        Some(&token_for(&m.state, &m.student)),
        Some(json!({ "gateway": gateway })),
    )
    .await
}

/// Checkout plus a signed success callback; returns the enrollment id.
async fn purchase(m: &Market) -> i32 {
    let (_, body) = start_checkout(m, "CLICK").await;
    let txn_id = body["transaction"]["transaction_id"].as_str().unwrap().to_string();
    let (payload, signature) = signed_success(&txn_id, PRICE);
    let (status, _) = callback(&m.app, "click", payload, &signature).await;
    assert_eq!(status, StatusCode::OK);

    course_enrollment::Entity::find()
        .filter(course_enrollment::Column::CourseId.eq(m.course.id))
        .filter(course_enrollment::Column::StudentId.eq(m.student.id))
        .one(m.state.db())
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn test_checkout_and_signed_callback() {
    let m = market().await;

    let (status, body) = start_checkout(&m, "CLICK").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction"]["status"], "PENDING");
    assert_eq!(body["transaction"]["amount"], PRICE);
    let url = body["checkout_url"].as_str().unwrap();
    assert!(url.starts_with("https://my.click.uz/services/pay?"));
    assert!(url.contains("service_id=77"));
    let txn_id = body["transaction"]["transaction_id"].as_str().unwrap().to_string();
    assert!(txn_id.starts_with("TXN-"));

    // Tampered amount
    let (payload, signature) = signed_success(&txn_id, PRICE);
    let mut tampered = payload.clone();
    tampered["amount"] = json!(1);
    let (status, _) = callback(&m.app, "click", tampered, &signature).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = callback(&m.app, "click", payload.clone(), &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");

    let enrollment = course_enrollment::Entity::find()
        .filter(course_enrollment::Column::StudentId.eq(m.student.id))
        .one(m.state.db())
        .await
        .unwrap()
        .expect("enrollment created");
    assert_eq!(enrollment.price_paid, PRICE);

    // Default platform commission is 20%
    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 8_000_000);
    assert_eq!(balance.lifetime_earnings, 8_000_000);

    // Replayed callback changes nothing
    let (status, body) = callback(&m.app, "click", payload, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");
    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 8_000_000);

    let (status, _) = start_checkout(&m, "CLICK").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(
        &m.app,
        "GET",
        "/api/payments/transactions",
        Some(&token_for(&m.state, &m.student)),
        None,
    )
    .await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_callback_for_unknown_transaction() {
    let m = market().await;
    let (payload, signature) = signed_success("TXN-20240101000000-DEADBEEF", PRICE);
    let (status, _) = callback(&m.app, "click", payload, &signature).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_callback_marks_transaction() {
    let m = market().await;
    let (_, body) = start_checkout(&m, "CLICK").await;
    let txn_id = body["transaction"]["transaction_id"].as_str().unwrap().to_string();

    let payload = callback_payload(&txn_id, "", PRICE, "failed");
    let signature = sign(CLICK_SECRET, &payload).unwrap();
    let (status, body) = callback(
        &m.app,
        "click",
        json!({ "transaction_id": txn_id, "amount": PRICE, "status": "failed" }),
        &signature,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "FAILED");

    let enrolled = course_enrollment::Entity::find()
        .filter(course_enrollment::Column::StudentId.eq(m.student.id))
        .one(m.state.db())
        .await
        .unwrap();
    assert!(enrolled.is_none());
}

#[tokio::test]
async fn test_free_course_cannot_be_checked_out() {
    let m = market().await;
    let (free, _) = published_course(m.state.db(), &m.author, &m.admin, "Free Intro", 0, 1).await;

    let (status, _) = send(
        &m.app,
        "POST",
        &format!("/api/courses/{}/checkout", free.slug),
        Some(&token_for(&m.state, &m.student)),
        Some(json!({ "gateway": "CLICK" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_disabled_gateway_is_unavailable() {
    let m = market().await;
    let admin_token = token_for(&m.state, &m.admin);

    let (status, body) = send(
        &m.app,
        "PUT",
        "/api/admin/gateways/payme",
        Some(&admin_token),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gateway"]["is_active"], false);
    assert_eq!(body["gateway"]["has_secret"], true);

    let (status, _) = start_checkout(&m, "PAYME").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&m.app, "GET", "/api/admin/gateways", Some(&admin_token), None).await;
    assert_eq!(body["gateways"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_course_commission_rule_applies() {
    let m = market().await;
    let admin_token = token_for(&m.state, &m.admin);

    let (status, _) = send(
        &m.app,
        "POST",
        "/api/admin/commissions",
        Some(&admin_token),
        Some(json!({ "course_id": m.course.id, "commission_percentage": 150.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &m.app,
        "POST",
        "/api/admin/commissions",
        Some(&admin_token),
        Some(json!({ "course_id": m.course.id, "commission_percentage": 10.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    purchase(&m).await;

    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 9_000_000);

    let purchase_txn = transaction::Entity::find()
        .filter(transaction::Column::TransactionType.eq("COURSE_PURCHASE"))
        .one(m.state.db())
        .await
        .unwrap()
        .unwrap();
    let metadata: Value = serde_json::from_str(&purchase_txn.metadata).unwrap();
    assert_eq!(metadata["platform_fee"], 1_000_000);
    assert_eq!(metadata["author_share"], 9_000_000);
}

#[tokio::test]
async fn test_refund_flow() {
    let m = market().await;
    let enrollment_id = purchase(&m).await;
    let student_token = token_for(&m.state, &m.student);
    let admin_token = token_for(&m.state, &m.admin);

    let (status, _) = send(
        &m.app,
        "POST",
        "/api/refunds",
        Some(&student_token),
        Some(json!({ "enrollment_id": enrollment_id, "reason": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &m.app,
        "POST",
        "/api/refunds",
        Some(&student_token),
        Some(json!({ "enrollment_id": enrollment_id, "reason": "Not what I expected" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["refund"]["amount"], PRICE);
    let refund_id = body["refund"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &m.app,
        "POST",
        "/api/refunds",
        Some(&student_token),
        Some(json!({ "enrollment_id": enrollment_id, "reason": "Again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &m.app,
        "POST",
        &format!("/api/admin/refunds/{refund_id}/approve"),
        Some(&admin_token),
        Some(json!({ "notes": "ok" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refund"]["status"], "COMPLETED");

    let enrollment = course_enrollment::Entity::find_by_id(enrollment_id)
        .one(m.state.db())
        .await
        .unwrap();
    assert!(enrollment.is_none());

    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 0);

    let statuses: Vec<String> = transaction::Entity::find()
        .all(m.state.db())
        .await
        .unwrap()
        .into_iter()
        .map(|t| format!("{}:{}", t.transaction_type, t.status))
        .collect();
    assert!(statuses.contains(&"COURSE_PURCHASE:REFUNDED".to_string()));
    assert!(statuses.contains(&"REFUND:SUCCESS".to_string()));

    let course = course::Entity::find_by_id(m.course.id)
        .one(m.state.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.enrollment_count, 0);

    let (_, body) = send(&m.app, "GET", "/api/admin/logs?action_type=REFUND_APPROVED", Some(&admin_token), None).await;
    assert_eq!(body["logs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_refund_of_someone_elses_enrollment() {
    let m = market().await;
    let enrollment_id = purchase(&m).await;
    let stranger = create_user(m.state.db(), "+998901000004", Role::Student).await;

    let (status, _) = send(
        &m.app,
        "POST",
        "/api/refunds",
        Some(&token_for(&m.state, &stranger)),
        Some(json!({ "enrollment_id": enrollment_id, "reason": "Mine now" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payout_lifecycle() {
    let m = market().await;
    purchase(&m).await;
    let author_token = token_for(&m.state, &m.author);
    let admin_token = token_for(&m.state, &m.admin);

    let (status, _) = send(
        &m.app,
        "POST",
        "/api/author/payouts",
        Some(&author_token),
        Some(json!({ "amount": 9_000_000, "method": "BANK_TRANSFER" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &m.app,
        "POST",
        "/api/author/payouts",
        Some(&author_token),
        Some(json!({
            "amount": 3_000_000,
            "method": "BANK_TRANSFER",
            "payment_details": { "account": "20208000900123456789" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payout"]["status"], "PENDING");
    let payout_id = body["payout"]["id"].as_i64().unwrap();

    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 5_000_000);
    assert_eq!(balance.pending_balance, 3_000_000);

    // Must be approved before it can complete
    let complete = format!("/api/admin/payouts/{payout_id}/complete");
    let (status, _) = send(&m.app, "POST", &complete, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &m.app,
        "POST",
        &format!("/api/admin/payouts/{payout_id}/approve"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout"]["status"], "PROCESSING");

    let (status, body) = send(
        &m.app,
        "POST",
        &complete,
        Some(&admin_token),
        Some(json!({ "transaction_id": "BANK-REF-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout"]["status"], "COMPLETED");
    assert_eq!(body["payout"]["transaction_id"], "BANK-REF-1");

    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.pending_balance, 0);
    assert_eq!(balance.total_withdrawn, 3_000_000);

    let (_, body) = send(&m.app, "GET", "/api/author/payouts", Some(&author_token), None).await;
    assert_eq!(body["payouts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_payout_returns_funds() {
    let m = market().await;
    purchase(&m).await;
    let author_token = token_for(&m.state, &m.author);

    let (_, body) = send(
        &m.app,
        "POST",
        "/api/author/payouts",
        Some(&author_token),
        Some(json!({ "amount": 8_000_000, "method": "CLICK" })),
    )
    .await;
    let payout_id = body["payout"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &m.app,
        "POST",
        &format!("/api/admin/payouts/{payout_id}/reject"),
        Some(&token_for(&m.state, &m.admin)),
        Some(json!({ "notes": "Card details invalid" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout"]["status"], "REJECTED");

    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 8_000_000);
    assert_eq!(balance.pending_balance, 0);
}

#[tokio::test]
async fn test_admin_mark_success() {
    let m = market().await;
    let (_, body) = start_checkout(&m, "UZUM").await;
    let id = body["transaction"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &m.app,
        "POST",
        &format!("/api/admin/transactions/{id}/mark-success"),
        Some(&token_for(&m.state, &m.admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["status"], "SUCCESS");
    assert!(body["transaction"]["enrollment_id"].is_number());

    let (_, body) = send(
        &m.app,
        "GET",
        "/api/admin/dashboard",
        Some(&token_for(&m.state, &m.admin)),
        None,
    )
    .await;
    assert_eq!(body["dashboard"]["total_revenue"], PRICE);
}

#[tokio::test]
async fn test_concurrent_success_callbacks_credit_once() {
    let m = market().await;
    let (_, body) = start_checkout(&m, "CLICK").await;
    let txn_id = body["transaction"]["transaction_id"].as_str().unwrap().to_string();
    let (payload, signature) = signed_success(&txn_id, PRICE);

    let (first, second) = tokio::join!(
        callback(&m.app, "click", payload.clone(), &signature),
        callback(&m.app, "click", payload, &signature),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(first.1["status"], "SUCCESS");
    assert_eq!(second.1["status"], "SUCCESS");

    let balance = author_service::balance_for(m.state.db(), m.author.id).await.unwrap();
    assert_eq!(balance.available_balance, 8_000_000);
    assert_eq!(balance.lifetime_earnings, 8_000_000);

    let enrollments = course_enrollment::Entity::find()
        .filter(course_enrollment::Column::StudentId.eq(m.student.id))
        .all(m.state.db())
        .await
        .unwrap();
    assert_eq!(enrollments.len(), 1);
}

#[tokio::test]
async fn test_uzum_checkout_url_carries_uzs() {
    let m = market().await;
    let (status, body) = start_checkout(&m, "UZUM").await;
    assert_eq!(status, StatusCode::CREATED);
    let url = body["checkout_url"].as_str().unwrap();
    assert!(url.starts_with("https://checkout.uzum.uz/checkout?"));
    assert!(url.contains("merchant_id=uzum-merchant"));
    assert!(url.contains("amount=100000.00"));
}

#[tokio::test]
async fn test_unconfigured_gateway_is_unavailable() {
    let state = setup_state(&[("UZUM_MERCHANT_ID", ""), ("CLICK_SERVICE_ID", "")]).await;
    let app = app(&state);
    let db = state.db();
    let author = create_user(db, "+998901000011", Role::Author).await;
    let admin = create_user(db, "+998901000012", Role::Admin).await;
    let student = create_user(db, "+998901000013", Role::Student).await;
    let (course, _) = published_course(db, &author, &admin, "Go Basics", PRICE, 1).await;
    let token = token_for(&state, &student);

    for gateway in ["UZUM", "CLICK"] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/courses/{}/checkout", course.slug),
            Some(&token),
            Some(json!({ "gateway": gateway })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{gateway}");
        assert_eq!(body["success"], false);
    }

    let pending = transaction::Entity::find().all(db).await.unwrap();
    assert!(pending.is_empty());
}
