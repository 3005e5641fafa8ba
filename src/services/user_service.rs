//! Accounts: phone/email registration, login, profile

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{AppError, AppResult, OtpPurpose, Role, SocialProvider};
use crate::infrastructure::auth::{create_jwt, hash_password, verify_password};
use crate::models::social_auth::{self, Entity as SocialAuth};
use crate::models::user::{self, Entity as User};
use crate::modules::telegram::{OtpNotifier, OutgoingMessage, login_code_text};
use crate::services::{author_service, otp_service, student_service};
use crate::utils::{phone, time};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"));

const MIN_PASSWORD_LEN: usize = 8;

/// Public view of an account
#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub age: Option<i32>,
    pub role: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub phone_verified: bool,
    pub email_verified: bool,
    pub telegram_linked: bool,
    pub date_joined: String,
    pub last_login: Option<String>,
}

impl From<user::Model> for UserDto {
    fn from(u: user::Model) -> Self {
        Self {
            full_name: u.full_name(),
            telegram_linked: u.telegram_id.is_some(),
            id: u.id,
            phone_number: u.phone_number,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            age: u.age,
            role: u.role,
            is_staff: u.is_staff,
            is_active: u.is_active,
            phone_verified: u.phone_verified,
            email_verified: u.email_verified,
            date_joined: u.date_joined,
            last_login: u.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct OtpIssued {
    pub phone_number: String,
    pub expires_at: String,
    /// Only populated in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhoneRegistration {
    pub phone_number: String,
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRegistration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
}

fn validate_details(
    first_name: &str,
    last_name: &str,
    age: Option<i32>,
    password1: &str,
    password2: &str,
) -> AppResult<()> {
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(AppError::validation("First and last name are required"));
    }
    if let Some(age) = age {
        validate_age(age)?;
    }
    if password1 != password2 {
        return Err(AppError::validation("Passwords do not match"));
    }
    if password1.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_age(age: i32) -> AppResult<()> {
    if (10..=120).contains(&age) {
        Ok(())
    } else {
        Err(AppError::validation("Age must be between 10 and 120"))
    }
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if EMAIL.is_match(&email) {
        Ok(email)
    } else {
        Err(AppError::validation("Enter a valid email address"))
    }
}

async fn find_by_phone<C: ConnectionTrait>(db: &C, phone: &str) -> AppResult<Option<user::Model>> {
    Ok(User::find()
        .filter(user::Column::PhoneNumber.eq(phone))
        .one(db)
        .await?)
}

async fn email_taken<C: ConnectionTrait>(db: &C, email: &str, except: Option<i32>) -> AppResult<bool> {
    let mut query = User::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

fn session(account: user::Model, secret: &str) -> AppResult<AuthSession> {
    let token = create_jwt(account.id, &account.role, secret)?;
    Ok(AuthSession {
        token,
        user: account.into(),
    })
}

async fn touch_last_login(db: &DatabaseConnection, account: user::Model) -> AppResult<user::Model> {
    let now = time::now();
    let mut active: user::ActiveModel = account.into();
    active.last_login = Set(Some(now.clone()));
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

fn issued(record: &crate::models::phone_verification::Model, debug: bool) -> OtpIssued {
    OtpIssued {
        phone_number: record.phone_number.clone(),
        expires_at: record.expires_at.clone(),
        debug_code: debug.then(|| record.otp_code.clone()),
    }
}

/// Step 1 of phone sign-up. The code reaches the user once they share
/// their contact with the bot.
pub async fn request_registration_otp(
    db: &DatabaseConnection,
    raw_phone: &str,
    debug: bool,
) -> AppResult<OtpIssued> {
    let phone = phone::validate_phone(raw_phone)?;
    if find_by_phone(db, &phone).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this phone number already exists".into(),
        ));
    }

    let record = otp_service::issue(db, &phone, OtpPurpose::Register).await?;
    Ok(issued(&record, debug))
}

pub async fn complete_phone_registration(
    db: &DatabaseConnection,
    secret: &str,
    input: PhoneRegistration,
) -> AppResult<AuthSession> {
    let phone = phone::validate_phone(&input.phone_number)?;
    validate_details(
        &input.first_name,
        &input.last_name,
        Some(input.age),
        &input.password1,
        &input.password2,
    )?;
    if find_by_phone(db, &phone).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this phone number already exists".into(),
        ));
    }

    otp_service::verify(db, &phone, OtpPurpose::Register, &input.code).await?;

    let password_hash = hash_password(&input.password1)?;
    let now = time::now();
    let account = db
        .transaction::<_, user::Model, AppError>(|txn| {
            Box::pin(async move {
                let account = user::ActiveModel {
                    phone_number: Set(Some(phone)),
                    email: Set(None),
                    password_hash: Set(password_hash),
                    first_name: Set(input.first_name.trim().to_string()),
                    last_name: Set(input.last_name.trim().to_string()),
                    age: Set(Some(input.age)),
                    role: Set(Role::Student.as_str().to_string()),
                    is_staff: Set(false),
                    is_active: Set(true),
                    phone_verified: Set(true),
                    email_verified: Set(false),
                    date_joined: Set(now.clone()),
                    last_login: Set(Some(now.clone())),
                    created_at: Set(now.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                student_service::ensure_profile(txn, account.id).await?;
                Ok(account)
            })
        })
        .await?;

    tracing::info!(user_id = account.id, "registered account by phone");
    session(account, secret)
}

pub async fn register_email(
    db: &DatabaseConnection,
    secret: &str,
    input: EmailRegistration,
) -> AppResult<AuthSession> {
    let email = normalize_email(&input.email)?;
    validate_details(
        &input.first_name,
        &input.last_name,
        input.age,
        &input.password1,
        &input.password2,
    )?;
    if email_taken(db, &email, None).await? {
        return Err(AppError::Conflict(
            "An account with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(&input.password1)?;
    let now = time::now();
    let account = db
        .transaction::<_, user::Model, AppError>(|txn| {
            Box::pin(async move {
                let account = user::ActiveModel {
                    phone_number: Set(None),
                    email: Set(Some(email)),
                    password_hash: Set(password_hash),
                    first_name: Set(input.first_name.trim().to_string()),
                    last_name: Set(input.last_name.trim().to_string()),
                    age: Set(input.age),
                    role: Set(Role::Student.as_str().to_string()),
                    is_staff: Set(false),
                    is_active: Set(true),
                    phone_verified: Set(false),
                    email_verified: Set(true),
                    date_joined: Set(now.clone()),
                    last_login: Set(Some(now.clone())),
                    created_at: Set(now.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                student_service::ensure_profile(txn, account.id).await?;
                Ok(account)
            })
        })
        .await?;

    tracing::info!(user_id = account.id, "registered account by email");
    session(account, secret)
}

/// Password login with a phone number or an email as identifier.
pub async fn login(
    db: &DatabaseConnection,
    secret: &str,
    identifier: &str,
    password: &str,
) -> AppResult<AuthSession> {
    let identifier = identifier.trim();
    let account = if phone::looks_like_phone(identifier) {
        find_by_phone(db, identifier).await?
    } else {
        User::find()
            .filter(user::Column::Email.eq(identifier.to_lowercase()))
            .one(db)
            .await?
    };

    let bad_credentials = || AppError::Unauthorized("Invalid credentials".into());
    let account = account.ok_or_else(bad_credentials)?;
    if !verify_password(password, &account.password_hash)? {
        return Err(bad_credentials());
    }
    let account = reactivate_if_due(db, account).await?;

    let account = touch_last_login(db, account).await?;
    session(account, secret)
}

async fn reactivate_if_due(db: &DatabaseConnection, account: user::Model) -> AppResult<user::Model> {
    if account.is_active {
        return Ok(account);
    }
    crate::services::moderation_service::lift_expired_suspension(db, &account)
        .await?
        .ok_or_else(|| AppError::Forbidden("Account is disabled".into()))
}

async fn active_by_phone(db: &DatabaseConnection, raw_phone: &str) -> AppResult<user::Model> {
    let phone = phone::validate_phone(raw_phone)?;
    let account = find_by_phone(db, &phone)
        .await?
        .ok_or(AppError::NotFound("Account"))?;
    reactivate_if_due(db, account).await
}

/// Issues a login code and pushes it to the linked Telegram chat, if any.
pub async fn request_login_otp(
    db: &DatabaseConnection,
    notifier: &Arc<dyn OtpNotifier>,
    raw_phone: &str,
    debug: bool,
) -> AppResult<OtpIssued> {
    let account = active_by_phone(db, raw_phone).await?;
    let phone = account.phone_number.clone().unwrap_or_default();
    let record = otp_service::issue(db, &phone, OtpPurpose::Login).await?;

    if let Some(chat_id) = account.telegram_id {
        let message = OutgoingMessage::text(chat_id, login_code_text(&record.otp_code));
        if let Err(e) = notifier.send(message).await {
            // The code can still be fetched by sharing the contact with the bot
            tracing::error!(user_id = account.id, "failed to push login code: {}", e);
        }
    }

    Ok(issued(&record, debug))
}

pub async fn verify_login_otp(
    db: &DatabaseConnection,
    secret: &str,
    raw_phone: &str,
    code: &str,
) -> AppResult<AuthSession> {
    let account = active_by_phone(db, raw_phone).await?;
    let phone = account.phone_number.clone().unwrap_or_default();
    otp_service::verify(db, &phone, OtpPurpose::Login, code).await?;

    let account = touch_last_login(db, account).await?;
    session(account, secret)
}

pub async fn update_profile(
    db: &DatabaseConnection,
    account: user::Model,
    input: ProfileUpdate,
) -> AppResult<user::Model> {
    let mut active: user::ActiveModel = account.clone().into();

    if let Some(first) = input.first_name {
        if first.trim().is_empty() {
            return Err(AppError::validation("First name cannot be empty"));
        }
        active.first_name = Set(first.trim().to_string());
    }
    if let Some(last) = input.last_name {
        if last.trim().is_empty() {
            return Err(AppError::validation("Last name cannot be empty"));
        }
        active.last_name = Set(last.trim().to_string());
    }
    if let Some(age) = input.age {
        validate_age(age)?;
        active.age = Set(Some(age));
    }
    if let Some(raw) = input.email {
        if raw.trim().is_empty() {
            active.email = Set(None);
        } else {
            let email = normalize_email(&raw)?;
            if email_taken(db, &email, Some(account.id)).await? {
                return Err(AppError::Conflict(
                    "An account with this email already exists".into(),
                ));
            }
            active.email = Set(Some(email));
        }
    }

    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

/// Promote a student to author; admins keep their role.
pub async fn become_instructor(db: &DatabaseConnection, account: user::Model) -> AppResult<user::Model> {
    db.transaction::<_, user::Model, AppError>(|txn| {
        Box::pin(async move {
            let account = if account.role == Role::Student.as_str() {
                let mut active: user::ActiveModel = account.into();
                active.role = Set(Role::Author.as_str().to_string());
                active.updated_at = Set(time::now());
                active.update(txn).await?
            } else {
                account
            };
            author_service::ensure_records(txn, account.id).await?;
            Ok(account)
        })
    })
    .await
    .map_err(AppError::from)
}

/// Record that `provider_user_id` at `provider` signs in as `user_id`.
/// A provider identity belongs to one account only.
pub async fn link_provider<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    provider: SocialProvider,
    provider_user_id: &str,
    extra_data: serde_json::Value,
) -> AppResult<social_auth::Model> {
    let now = time::now();
    let existing = SocialAuth::find()
        .filter(social_auth::Column::Provider.eq(provider.as_str()))
        .filter(social_auth::Column::ProviderUserId.eq(provider_user_id))
        .one(db)
        .await?;

    match existing {
        Some(link) if link.user_id != user_id => Err(AppError::Conflict(format!(
            "This {provider} account is linked to another user"
        ))),
        Some(link) => {
            let mut active: social_auth::ActiveModel = link.into();
            active.extra_data = Set(extra_data.to_string());
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        None => {
            let link = social_auth::ActiveModel {
                user_id: Set(user_id),
                provider: Set(provider.as_str().to_string()),
                provider_user_id: Set(provider_user_id.to_string()),
                access_token: Set(String::new()),
                refresh_token: Set(String::new()),
                token_expires_at: Set(None),
                extra_data: Set(extra_data.to_string()),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            tracing::info!(user_id, provider = provider.as_str(), "linked sign-in provider");
            Ok(link)
        }
    }
}

pub async fn linked_providers(db: &DatabaseConnection, user_id: i32) -> AppResult<Vec<social_auth::Model>> {
    Ok(SocialAuth::find()
        .filter(social_auth::Column::UserId.eq(user_id))
        .order_by_desc(social_auth::Column::CreatedAt)
        .all(db)
        .await?)
}
