//! Telegram bot webhook

use axum::{Json, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::{AppError, AppResult};
use crate::infrastructure::AppState;
use crate::modules::telegram::bot::{self, Update};

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(update): AppJson<Update>,
) -> AppResult<Json<Value>> {
    if let Some(expected) = state.config.telegram_webhook_secret.as_deref() {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected) {
            tracing::warn!("Rejected Telegram update with a bad secret token");
            return Err(AppError::Unauthorized("Invalid webhook secret".into()));
        }
    }

    let update_id = update.update_id;
    if let Some(reply) = bot::handle_update(state.db(), update).await? {
        // A failed reply still acknowledges the update
        if let Err(e) = state.notifier.send(reply).await {
            tracing::error!(update_id, "Failed to send bot reply: {}", e);
        }
    }
    Ok(Json(json!({ "ok": true })))
}
