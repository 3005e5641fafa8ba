//! Webhook update handling for the OTP bot

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;

use super::{OutgoingMessage, login_code_text, registration_code_text};
use crate::domain::{AppError, AppResult, OtpPurpose, SocialProvider};
use crate::models::user;
use crate::services::{otp_service, user_service};
use crate::utils::{phone::normalize_contact_phone, time};

/// Subset of the Bot API `Update` object the bot reacts to
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
    pub contact: Option<Contact>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub user_id: Option<i64>,
}

pub const WELCOME_BACK: &str = "Welcome back! You are already registered.";
pub const SHARE_PHONE: &str =
    "👋 Welcome to IlmSpace Bot!\n\nPlease share your phone number to receive your verification code.";
pub const ACCOUNT_LINKED: &str =
    "✅ Account linked! You can now request a login code from the website.";
pub const NO_PENDING_REGISTRATION: &str = "⚠️ No pending registration found.\n\nPlease go to the website and fill out the registration form first.";

/// Works out the reply for an update. Updates the bot ignores yield `None`.
pub async fn handle_update(
    db: &DatabaseConnection,
    update: Update,
) -> AppResult<Option<OutgoingMessage>> {
    let Some(message) = update.message else {
        return Ok(None);
    };
    let chat_id = message.chat.id;
    let sender_id = message.from.as_ref().map(|f| f.id).unwrap_or(chat_id);

    if let Some(contact) = message.contact {
        return handle_contact(db, chat_id, sender_id, contact).await.map(Some);
    }

    match message.text.as_deref() {
        Some(text) if text.trim_start().starts_with("/start") => {
            let linked = user::Entity::find()
                .filter(user::Column::TelegramId.eq(sender_id))
                .one(db)
                .await?;
            let reply = if linked.is_some() {
                OutgoingMessage::text(chat_id, WELCOME_BACK)
            } else {
                OutgoingMessage {
                    chat_id,
                    text: SHARE_PHONE.to_string(),
                    request_contact: true,
                }
            };
            Ok(Some(reply))
        }
        _ => Ok(None),
    }
}

async fn handle_contact(
    db: &DatabaseConnection,
    chat_id: i64,
    sender_id: i64,
    contact: Contact,
) -> AppResult<OutgoingMessage> {
    // A forwarded contact card belongs to someone else
    if let Some(owner) = contact.user_id
        && owner != sender_id
    {
        tracing::warn!(chat_id, "ignoring contact shared on behalf of another account");
        return Ok(OutgoingMessage::text(chat_id, SHARE_PHONE));
    }

    let phone = normalize_contact_phone(&contact.phone_number);
    let existing = user::Entity::find()
        .filter(user::Column::PhoneNumber.eq(phone.as_str()))
        .one(db)
        .await?;

    if let Some(account) = existing {
        if account.telegram_id.is_none() {
            match link_account(db, account, sender_id, &phone).await {
                Ok(()) => tracing::info!(chat_id, "linked telegram chat to account"),
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(chat_id, "telegram account already linked elsewhere");
                }
                Err(e) => return Err(e),
            }
        }

        let text = match otp_service::pending_code(db, &phone, OtpPurpose::Login).await? {
            Some(code) => login_code_text(&code),
            None => ACCOUNT_LINKED.to_string(),
        };
        return Ok(OutgoingMessage::text(chat_id, text));
    }

    let text = match otp_service::pending_code(db, &phone, OtpPurpose::Register).await? {
        Some(code) => registration_code_text(&code),
        None => NO_PENDING_REGISTRATION.to_string(),
    };
    Ok(OutgoingMessage::text(chat_id, text))
}

/// Store the chat on the account and record the provider link.
async fn link_account(
    db: &DatabaseConnection,
    account: user::Model,
    telegram_id: i64,
    phone: &str,
) -> AppResult<()> {
    let extra = json!({ "phone_number": phone });
    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            user_service::link_provider(
                txn,
                account.id,
                SocialProvider::Telegram,
                &telegram_id.to_string(),
                extra,
            )
            .await?;
            let mut active: user::ActiveModel = account.into();
            active.telegram_id = Set(Some(telegram_id));
            active.updated_at = Set(time::now());
            active.update(txn).await?;
            Ok(())
        })
    })
    .await
    .map_err(AppError::from)
}
