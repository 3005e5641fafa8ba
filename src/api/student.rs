//! Student profile, dashboard and certificates

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::AppResult;
use crate::infrastructure::AppState;
use crate::infrastructure::auth::CurrentUser;
use crate::services::student_service;

#[derive(Debug, Deserialize)]
pub struct BioUpdate {
    #[serde(default)]
    pub bio: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let profile = student_service::get_profile(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<BioUpdate>,
) -> AppResult<Json<Value>> {
    let profile = student_service::update_bio(state.db(), &account, payload.bio).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let dashboard =
        student_service::dashboard(state.db(), state.category_repo.as_ref(), &account).await?;
    Ok(Json(json!({ "success": true, "dashboard": dashboard })))
}

pub async fn certificates(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let certificates = student_service::list_certificates(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "certificates": certificates })))
}
