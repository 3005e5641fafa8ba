//! Author profile, dashboard and payouts

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
use crate::infrastructure::auth::{CurrentUser, OptionalUser, is_admin, require_role};
use crate::services::author_service::{self, AuthorProfileUpdate};
use crate::services::dashboard_service;
use crate::services::payout_service::{self, PayoutRequest};

/// Public profile. The balance is only shown to its owner and admins.
pub async fn get_author(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    let mut view = author_service::get_profile(state.db(), id).await?;
    let privileged = viewer
        .as_ref()
        .is_some_and(|v| v.id == id || is_admin(v));
    if !privileged {
        view.balance = None;
    }
    Ok(Json(json!({ "success": true, "author": view })))
}

pub async fn my_profile(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    require_role(&account, &[Role::Author])?;
    author_service::ensure_records(state.db(), account.id).await?;
    let view = author_service::get_profile(state.db(), account.id).await?;
    Ok(Json(json!({ "success": true, "author": view })))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<AuthorProfileUpdate>,
) -> AppResult<Json<Value>> {
    require_role(&account, &[Role::Author])?;
    let profile = author_service::update_profile(state.db(), &account, payload).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    require_role(&account, &[Role::Author])?;
    let dashboard = dashboard_service::author_dashboard(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "dashboard": dashboard })))
}

pub async fn list_payouts(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    require_role(&account, &[Role::Author])?;
    let payouts = payout_service::my_payouts(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "payouts": payouts })))
}

pub async fn request_payout(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<PayoutRequest>,
) -> AppResult<impl IntoResponse> {
    let payout = payout_service::request_payout(state.db(), &account, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "payout": payout })),
    ))
}
