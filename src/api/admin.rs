//! Admin endpoints: moderation, money operations and platform settings
//!
//! Every handler here requires an ADMIN (or staff) account. Actions that
//! change state are written to the moderation log together with the
//! caller's IP and user agent.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{AppJson, ClientMeta};
use crate::domain::{ActionType, AppResult, Gateway, PayoutStatus, RefundStatus, Role};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::{CurrentUser, require_role};
use crate::models::user;
use crate::services::moderation_service::{self, ApprovalInput, UserSanction};
use crate::services::payment_service::{
    self, GatewayConfigUpdate, NewCommissionRule, TransactionFilter,
};
use crate::services::{author_service, dashboard_service, payout_service};

fn admin_only(account: &user::Model) -> AppResult<()> {
    require_role(account, &[Role::Admin])
}

pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let dashboard = dashboard_service::admin_dashboard(state.db()).await?;
    Ok(Json(json!({ "success": true, "dashboard": dashboard })))
}

// ---------------------------------------------------------------------------
// Course moderation
// ---------------------------------------------------------------------------

pub async fn moderation_queue(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let courses = moderation_service::moderation_queue(state.db()).await?;
    Ok(Json(json!({ "success": true, "courses": courses })))
}

pub async fn approve_course(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    payload: Option<Json<ApprovalInput>>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    let course = moderation_service::approve_course(state.db(), &account, &ctx, id, input).await?;
    Ok(Json(json!({ "success": true, "course": course })))
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject_course(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReasonRequest>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let course =
        moderation_service::reject_course(state.db(), &account, &ctx, id, payload.reason).await?;
    Ok(Json(json!({ "success": true, "course": course })))
}

#[derive(Debug, Deserialize)]
pub struct ChangesRequest {
    #[serde(default)]
    pub changes: String,
}

pub async fn request_changes(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ChangesRequest>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let course =
        moderation_service::request_changes(state.db(), &account, &ctx, id, payload.changes)
            .await?;
    Ok(Json(json!({ "success": true, "course": course })))
}

pub async fn archive_course(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let course = moderation_service::archive_course(state.db(), &account, &ctx, id).await?;
    Ok(Json(json!({ "success": true, "course": course })))
}

// ---------------------------------------------------------------------------
// Users and authors
// ---------------------------------------------------------------------------

pub async fn moderate_user(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UserSanction>,
) -> AppResult<impl IntoResponse> {
    admin_only(&account)?;
    let outcome = moderation_service::moderate_user(state.db(), &account, &ctx, id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "moderation": outcome.moderation,
            "user_is_active": outcome.user_is_active,
        })),
    ))
}

pub async fn verify_author(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let profile = author_service::set_verified(state.db(), id, true).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

pub async fn unverify_author(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let profile = author_service::set_verified(state.db(), id, false).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub action_type: Option<ActionType>,
    pub limit: Option<u64>,
}

pub async fn list_logs(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let logs =
        moderation_service::list_logs(state.db(), query.action_type, query.limit.unwrap_or(100))
            .await?;
    Ok(Json(json!({ "success": true, "logs": logs })))
}

// ---------------------------------------------------------------------------
// Transactions and refunds
// ---------------------------------------------------------------------------

pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let transactions = payment_service::list_transactions(state.db(), filter).await?;
    Ok(Json(json!({ "success": true, "transactions": transactions })))
}

pub async fn mark_success(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let transaction =
        payment_service::mark_success(state.db(), state.config.platform_commission_rate, id)
            .await?;
    tracing::info!(admin_id = account.id, transaction_id = %transaction.transaction_id, "marked transaction successful");
    Ok(Json(json!({ "success": true, "transaction": transaction })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FailRequest {
    pub reason: Option<String>,
}

pub async fn mark_failed(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
    payload: Option<Json<FailRequest>>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let reason = payload.and_then(|Json(p)| p.reason);
    let transaction = payment_service::mark_failed(state.db(), id, reason).await?;
    tracing::info!(admin_id = account.id, transaction_id = %transaction.transaction_id, "marked transaction failed");
    Ok(Json(json!({ "success": true, "transaction": transaction })))
}

#[derive(Debug, Deserialize)]
pub struct RefundQuery {
    pub status: Option<RefundStatus>,
}

pub async fn list_refunds(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Query(query): Query<RefundQuery>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let refunds = payment_service::list_refunds(state.db(), query.status).await?;
    Ok(Json(json!({ "success": true, "refunds": refunds })))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: String,
}

pub async fn approve_refund(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    payload: Option<Json<NotesRequest>>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let notes = payload.map(|Json(p)| p.notes).unwrap_or_default();
    let refund = payment_service::approve_refund(
        state.db(),
        &account,
        &ctx,
        state.config.platform_commission_rate,
        id,
        notes,
    )
    .await?;
    Ok(Json(json!({ "success": true, "refund": refund })))
}

pub async fn reject_refund(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    payload: Option<Json<NotesRequest>>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let notes = payload.map(|Json(p)| p.notes).unwrap_or_default();
    let refund = payment_service::reject_refund(state.db(), &account, &ctx, id, notes).await?;
    Ok(Json(json!({ "success": true, "refund": refund })))
}

// ---------------------------------------------------------------------------
// Payouts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PayoutQuery {
    pub status: Option<PayoutStatus>,
}

pub async fn list_payouts(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Query(query): Query<PayoutQuery>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let payouts = payout_service::list_payouts(state.db(), query.status).await?;
    Ok(Json(json!({ "success": true, "payouts": payouts })))
}

pub async fn approve_payout(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let payout = payout_service::approve_payout(state.db(), &account, &ctx, id).await?;
    Ok(Json(json!({ "success": true, "payout": payout })))
}

pub async fn reject_payout(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(id): Path<i32>,
    payload: Option<Json<NotesRequest>>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let notes = payload.map(|Json(p)| p.notes).unwrap_or_default();
    let payout = payout_service::reject_payout(state.db(), &account, &ctx, id, notes).await?;
    Ok(Json(json!({ "success": true, "payout": payout })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletePayoutRequest {
    pub transaction_id: Option<String>,
}

pub async fn complete_payout(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(id): Path<i32>,
    payload: Option<Json<CompletePayoutRequest>>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let reference = payload
        .and_then(|Json(p)| p.transaction_id)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let payout = payout_service::complete_payout(state.db(), &account, id, reference).await?;
    Ok(Json(json!({ "success": true, "payout": payout })))
}

// ---------------------------------------------------------------------------
// Gateways and commissions
// ---------------------------------------------------------------------------

pub async fn list_gateways(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let gateways = payment_service::list_gateway_configs(state.db()).await?;
    Ok(Json(json!({ "success": true, "gateways": gateways })))
}

pub async fn get_gateway(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(gateway): Path<String>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let gateway: Gateway = gateway.parse()?;
    let config = payment_service::get_gateway_config(state.db(), gateway).await?;
    Ok(Json(json!({ "success": true, "gateway": config })))
}

pub async fn update_gateway(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    Path(gateway): Path<String>,
    AppJson(payload): AppJson<GatewayConfigUpdate>,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let gateway: Gateway = gateway.parse()?;
    let config =
        payment_service::update_gateway_config(state.db(), &account, &ctx, gateway, payload)
            .await?;
    Ok(Json(json!({ "success": true, "gateway": config })))
}

pub async fn list_commissions(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    admin_only(&account)?;
    let rules = payment_service::list_commission_rules(state.db()).await?;
    Ok(Json(json!({ "success": true, "commissions": rules })))
}

pub async fn create_commission(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    ClientMeta(ctx): ClientMeta,
    AppJson(payload): AppJson<NewCommissionRule>,
) -> AppResult<impl IntoResponse> {
    admin_only(&account)?;
    let rule = payment_service::create_commission_rule(state.db(), &account, &ctx, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "commission": rule })),
    ))
}
