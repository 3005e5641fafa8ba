//! Author course builder and homework review

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::{AppResult, Role};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::{CurrentUser, require_role};
use crate::services::builder_service::{
    self, CourseUpdate, LessonInput, LessonUpdate, ModuleInput, NewCourse,
};
use crate::services::homework_service::{self, AssignmentInput, GradeInput};

fn authoring(account: &crate::models::user::Model) -> AppResult<()> {
    require_role(account, &[Role::Author, Role::Admin])
}

pub async fn my_courses(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let courses = builder_service::my_courses(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "courses": courses })))
}

pub async fn create_course(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<NewCourse>,
) -> AppResult<impl IntoResponse> {
    authoring(&account)?;
    let course = builder_service::create_course(state.db(), &account, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "course": course })),
    ))
}

pub async fn get_course(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let view = builder_service::builder_view(state.db(), &account, id).await?;
    Ok(Json(json!({
        "success": true,
        "course": view.course,
        "categories": view.categories,
        "modules": view.modules,
    })))
}

pub async fn update_course(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CourseUpdate>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let course = builder_service::update_course(state.db(), &account, id, payload).await?;
    Ok(Json(json!({ "success": true, "course": course })))
}

pub async fn submit_for_review(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let course = builder_service::submit_for_review(state.db(), &account, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Course submitted for review",
        "course": course,
    })))
}

pub async fn add_module(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(course_id): Path<i32>,
    AppJson(payload): AppJson<ModuleInput>,
) -> AppResult<impl IntoResponse> {
    authoring(&account)?;
    let module = builder_service::add_module(state.db(), &account, course_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "module": module })),
    ))
}

pub async fn edit_module(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ModuleInput>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let module = builder_service::edit_module(state.db(), &account, id, payload).await?;
    Ok(Json(json!({ "success": true, "module": module })))
}

pub async fn delete_module(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    builder_service::delete_module(state.db(), &account, id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn add_lesson(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(module_id): Path<i32>,
    AppJson(payload): AppJson<LessonInput>,
) -> AppResult<impl IntoResponse> {
    authoring(&account)?;
    let lesson = builder_service::add_lesson(state.db(), &account, module_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "lesson": lesson })),
    ))
}

pub async fn edit_lesson(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<LessonUpdate>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let lesson = builder_service::edit_lesson(state.db(), &account, id, payload).await?;
    Ok(Json(json!({ "success": true, "lesson": lesson })))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    builder_service::delete_lesson(state.db(), &account, id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn upsert_assignment(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(lesson_id): Path<i32>,
    AppJson(payload): AppJson<AssignmentInput>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let assignment =
        homework_service::upsert_assignment(state.db(), &account, lesson_id, payload).await?;
    Ok(Json(json!({ "success": true, "assignment": assignment })))
}

pub async fn list_submissions(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(assignment_id): Path<i32>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let submissions =
        homework_service::list_submissions(state.db(), &account, assignment_id).await?;
    Ok(Json(json!({ "success": true, "submissions": submissions })))
}

pub async fn grade_submission(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(submission_id): Path<i32>,
    AppJson(payload): AppJson<GradeInput>,
) -> AppResult<Json<Value>> {
    authoring(&account)?;
    let submission =
        homework_service::grade_submission(state.db(), &account, submission_id, payload).await?;
    Ok(Json(json!({ "success": true, "submission": submission })))
}
