use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult, Role};
use crate::infrastructure::AppState;
use crate::models::user;
use crate::services::moderation_service;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i32> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
        decode_jwt(token, &app.config.secret_key)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
    }
}

/// Authenticated, active account behind the bearer token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;
        let app = AppState::from_ref(state);
        let account = load_active_user(&app, claims.user_id()?).await?;
        Ok(CurrentUser(account))
    }
}

/// Like `CurrentUser`, but anonymous requests (or bad tokens) yield `None`
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<user::Model>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Ok(OptionalUser(None));
        }
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(CurrentUser(account)) => Ok(OptionalUser(Some(account))),
            Err(AppError::Database(e)) => Err(AppError::Database(e)),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}

async fn load_active_user(app: &AppState, user_id: i32) -> AppResult<user::Model> {
    let account = user::Entity::find_by_id(user_id)
        .one(app.db())
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;

    if account.is_active {
        return Ok(account);
    }

    match moderation_service::lift_expired_suspension(app.db(), &account).await? {
        Some(reactivated) => Ok(reactivated),
        None => Err(AppError::Forbidden("Account is disabled".into())),
    }
}

/// Staff accounts pass any guard that admits admins.
pub fn require_role(account: &user::Model, roles: &[Role]) -> AppResult<()> {
    let role: Role = account.role.parse()?;
    let is_admin = role == Role::Admin || account.is_staff;
    if roles.contains(&role) || (is_admin && roles.contains(&Role::Admin)) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".into(),
        ))
    }
}

pub fn is_admin(account: &user::Model) -> bool {
    account.is_staff || account.role == Role::Admin.as_str()
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_jwt(user_id: i32, role: &str, secret: &str) -> AppResult<String> {
    let expiration = (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_owned(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn token_carries_user_and_role() {
        let token = create_jwt(42, "AUTHOR", "k1").unwrap();
        let claims = decode_jwt(&token, "k1").unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, "AUTHOR");
        assert!(decode_jwt(&token, "other-key").is_err());
    }
}
