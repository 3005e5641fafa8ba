//! Sign-up, login and account endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::AppResult;
use crate::infrastructure::AppState;
use crate::infrastructure::auth::CurrentUser;
use crate::services::user_service::{
    self, EmailRegistration, PhoneRegistration, ProfileUpdate, UserDto,
};

#[derive(Deserialize)]
pub struct PhoneRequest {
    pub phone_number: String,
}

#[derive(Deserialize)]
pub struct OtpVerifyRequest {
    pub phone_number: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Phone number or email
    pub identifier: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/register/request-otp",
    responses(
        (status = 200, description = "Code issued"),
        (status = 400, description = "Invalid phone number"),
        (status = 409, description = "Phone already registered")
    )
)]
pub async fn request_registration_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PhoneRequest>,
) -> AppResult<Json<Value>> {
    let issued =
        user_service::request_registration_otp(state.db(), &payload.phone_number, state.config.debug)
            .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Share your phone number with the Telegram bot to receive the code",
        "otp": issued,
    })))
}

pub async fn register_phone(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PhoneRegistration>,
) -> AppResult<impl IntoResponse> {
    let session =
        user_service::complete_phone_registration(state.db(), &state.config.secret_key, payload)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "token": session.token, "user": session.user })),
    ))
}

pub async fn register_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRegistration>,
) -> AppResult<impl IntoResponse> {
    let session =
        user_service::register_email(state.db(), &state.config.secret_key, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "token": session.token, "user": session.user })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<Value>> {
    tracing::info!("Login attempt for {}", payload.identifier);
    let session = user_service::login(
        state.db(),
        &state.config.secret_key,
        &payload.identifier,
        &payload.password,
    )
    .await?;
    Ok(Json(json!({ "success": true, "token": session.token, "user": session.user })))
}

pub async fn request_login_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PhoneRequest>,
) -> AppResult<Json<Value>> {
    let issued = user_service::request_login_otp(
        state.db(),
        &state.notifier,
        &payload.phone_number,
        state.config.debug,
    )
    .await?;
    Ok(Json(json!({ "success": true, "otp": issued })))
}

pub async fn verify_login_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<OtpVerifyRequest>,
) -> AppResult<Json<Value>> {
    let session = user_service::verify_login_otp(
        state.db(),
        &state.config.secret_key,
        &payload.phone_number,
        &payload.code,
    )
    .await?;
    Ok(Json(json!({ "success": true, "token": session.token, "user": session.user })))
}

pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let providers = user_service::linked_providers(state.db(), account.id).await?;
    Ok(Json(json!({
        "success": true,
        "user": UserDto::from(account),
        "social_auths": providers,
    })))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<ProfileUpdate>,
) -> AppResult<Json<Value>> {
    let account = user_service::update_profile(state.db(), account, payload).await?;
    Ok(Json(json!({ "success": true, "user": UserDto::from(account) })))
}

pub async fn become_instructor(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Value>> {
    let account = user_service::become_instructor(state.db(), account).await?;
    Ok(Json(json!({
        "success": true,
        "message": "You can now create courses",
        "user": UserDto::from(account),
    })))
}
