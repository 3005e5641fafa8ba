//! Enrollment, the lesson player, progress and certificates

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::AppResult;
use crate::infrastructure::AppState;
use crate::infrastructure::auth::{CurrentUser, OptionalUser};
use crate::services::enrollment_service::{self, ProgressUpdate};
use crate::services::homework_service;

pub async fn enroll(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = enrollment_service::enroll(state.db(), &account, &slug).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "created": outcome.created,
            "enrollment": outcome.enrollment,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LearnQuery {
    pub lesson: Option<i32>,
}

pub async fn learn(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(slug): Path<String>,
    Query(query): Query<LearnQuery>,
) -> AppResult<Json<Value>> {
    let view = enrollment_service::learn(state.db(), viewer.as_ref(), &slug, query.lesson).await?;
    Ok(Json(json!({ "success": true, "learn": view })))
}

pub async fn update_progress(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(lesson_id): Path<i32>,
    AppJson(payload): AppJson<ProgressUpdate>,
) -> AppResult<Json<Value>> {
    let progress =
        enrollment_service::update_progress(state.db(), &account, lesson_id, payload).await?;
    Ok(Json(json!({
        "success": true,
        "watch_percentage": progress.watch_percentage,
        "progress": progress,
    })))
}

pub async fn mark_complete(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(lesson_id): Path<i32>,
) -> AppResult<Json<Value>> {
    let outcome = enrollment_service::mark_complete(state.db(), &account, lesson_id).await?;
    Ok(Json(json!({
        "success": true,
        "progress_percentage": outcome.progress_percentage,
        "course_completed": outcome.course_completed,
        "certificate": outcome.certificate,
    })))
}

#[derive(Debug, Deserialize)]
pub struct HomeworkRequest {
    pub content: String,
}

pub async fn submit_homework(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(lesson_id): Path<i32>,
    AppJson(payload): AppJson<HomeworkRequest>,
) -> AppResult<Json<Value>> {
    let submission =
        homework_service::submit_homework(state.db(), &account, lesson_id, payload.content).await?;
    Ok(Json(json!({ "success": true, "submission": submission })))
}

#[utoipa::path(
    get,
    path = "/api/certificates/{certificate_id}",
    params(("certificate_id" = String, Path, description = "ILMSPACE-XXXXXXXXXXXX")),
    responses(
        (status = 200, description = "Certificate is genuine"),
        (status = 404, description = "Unknown certificate")
    )
)]
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(certificate_id): Path<String>,
) -> AppResult<Json<Value>> {
    let certificate = enrollment_service::verify_certificate(state.db(), &certificate_id).await?;
    Ok(Json(json!({ "success": true, "certificate": certificate })))
}
