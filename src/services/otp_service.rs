//! One-time codes for phone registration and login

use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::*;

use crate::domain::{AppError, AppResult, OtpPurpose};
use crate::models::phone_verification::{self, Entity as PhoneVerification, MAX_ATTEMPTS, OTP_VALIDITY_MINUTES};
use crate::utils::time;

pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn open_codes(phone: &str, purpose: OtpPurpose) -> Select<PhoneVerification> {
    PhoneVerification::find()
        .filter(phone_verification::Column::PhoneNumber.eq(phone))
        .filter(phone_verification::Column::Purpose.eq(purpose.as_str()))
        .filter(phone_verification::Column::IsVerified.eq(false))
        .filter(phone_verification::Column::IsDeleted.eq(false))
}

/// Store a fresh code, retiring any earlier unused one for the same purpose.
pub async fn issue<C: ConnectionTrait>(
    db: &C,
    phone: &str,
    purpose: OtpPurpose,
) -> AppResult<phone_verification::Model> {
    let now = Utc::now();

    PhoneVerification::update_many()
        .col_expr(phone_verification::Column::IsDeleted, sea_query::Expr::value(true))
        .col_expr(phone_verification::Column::UpdatedAt, sea_query::Expr::value(time::to_db(now)))
        .filter(phone_verification::Column::PhoneNumber.eq(phone))
        .filter(phone_verification::Column::Purpose.eq(purpose.as_str()))
        .filter(phone_verification::Column::IsVerified.eq(false))
        .filter(phone_verification::Column::IsDeleted.eq(false))
        .exec(db)
        .await?;

    let record = phone_verification::ActiveModel {
        phone_number: Set(phone.to_string()),
        otp_code: Set(generate_code()),
        purpose: Set(purpose.as_str().to_string()),
        is_verified: Set(false),
        is_deleted: Set(false),
        expires_at: Set(time::to_db(now + Duration::minutes(OTP_VALIDITY_MINUTES))),
        attempts: Set(0),
        created_at: Set(time::to_db(now)),
        updated_at: Set(time::to_db(now)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(purpose = purpose.as_str(), "issued one-time code");
    Ok(record)
}

fn is_live(record: &phone_verification::Model) -> bool {
    !record.is_verified
        && !record.is_deleted
        && record.attempts <= MAX_ATTEMPTS
        && time::parse(&record.expires_at).is_some_and(|exp| Utc::now() < exp)
}

/// Check a submitted code. Every call counts as an attempt, right or wrong.
pub async fn verify(
    db: &DatabaseConnection,
    phone: &str,
    purpose: OtpPurpose,
    code: &str,
) -> AppResult<()> {
    let invalid = || AppError::validation("Invalid or expired verification code");

    let record = open_codes(phone, purpose)
        .order_by_desc(phone_verification::Column::Id)
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    let attempts = record.attempts + 1;
    let mut active: phone_verification::ActiveModel = record.clone().into();
    active.attempts = Set(attempts);
    active.updated_at = Set(time::now());

    let counted = phone_verification::Model { attempts, ..record };
    if !is_live(&counted) || counted.otp_code != code.trim() {
        active.update(db).await?;
        tracing::warn!(attempts, "one-time code rejected");
        return Err(invalid());
    }

    active.is_verified = Set(true);
    active.update(db).await?;
    Ok(())
}

/// The current usable code, if any, for bot delivery.
pub async fn pending_code(
    db: &DatabaseConnection,
    phone: &str,
    purpose: OtpPurpose,
) -> AppResult<Option<String>> {
    let record = open_codes(phone, purpose)
        .order_by_desc(phone_verification::Column::Id)
        .one(db)
        .await?;
    Ok(record
        .filter(|r| r.attempts < MAX_ATTEMPTS && is_live(r))
        .map(|r| r.otp_code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
