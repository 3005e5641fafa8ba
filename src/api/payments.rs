//! Checkout, gateway callbacks and refund requests

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::{AppError, AppResult, Gateway};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::CurrentUser;
use crate::services::payment_service::{self, CallbackPayload, RefundInput};

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub gateway: Gateway,
}

#[utoipa::path(
    post,
    path = "/api/courses/{slug}/checkout",
    params(("slug" = String, Path, description = "Course slug")),
    responses(
        (status = 201, description = "Pending transaction and gateway URL"),
        (status = 400, description = "Free course or gateway unavailable"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<CheckoutRequest>,
) -> AppResult<impl IntoResponse> {
    let session = payment_service::checkout(state.db(), &account, &slug, payload.gateway).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "transaction": session.transaction,
            "checkout_url": session.checkout_url,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/payments/callback/{gateway}",
    params(("gateway" = String, Path, description = "click, payme or uzum")),
    responses(
        (status = 200, description = "Current transaction state"),
        (status = 401, description = "Bad signature"),
        (status = 404, description = "Unknown transaction")
    )
)]
pub async fn gateway_callback(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    AppJson(payload): AppJson<CallbackPayload>,
) -> AppResult<Json<Value>> {
    let gateway: Gateway = gateway.parse()?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing signature".into()))?;

    let transaction = payment_service::gateway_callback(
        state.db(),
        state.config.platform_commission_rate,
        gateway,
        payload,
        signature,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "transaction_id": transaction.transaction_id,
        "status": transaction.status,
    })))
}

pub async fn my_transactions(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let transactions = payment_service::my_transactions(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "transactions": transactions })))
}

pub async fn request_refund(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<RefundInput>,
) -> AppResult<impl IntoResponse> {
    let refund = payment_service::request_refund(state.db(), &account, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "refund": refund })),
    ))
}

pub async fn my_refunds(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let refunds = payment_service::my_refunds(state.db(), &account).await?;
    Ok(Json(json!({ "success": true, "refunds": refunds })))
}
