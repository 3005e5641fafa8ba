//! Author withdrawals
//!
//! PENDING -> PROCESSING -> COMPLETED, or PENDING -> REJECTED. Requesting
//! moves money from available to pending; rejecting moves it back and
//! completing moves it from pending to withdrawn.

use sea_orm::*;
use serde::Deserialize;

use crate::domain::{
    ActionType, AppError, AppResult, PayoutMethod, PayoutStatus, Role, TransactionStatus,
    TransactionType,
};
use crate::infrastructure::auth::require_role;
use crate::models::author_balance;
use crate::models::author_payout::{self, Entity as AuthorPayout};
use crate::models::transaction;
use crate::models::user;
use crate::modules::gateways::format_uzs;
use crate::services::author_service;
use crate::services::moderation_service::{self, AuditContext, LogEntry};
use crate::services::payment_service::new_transaction_id;
use crate::utils::time;

#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub amount: i64,
    pub method: PayoutMethod,
    #[serde(default)]
    pub payment_details: serde_json::Value,
}

pub async fn request_payout(
    db: &DatabaseConnection,
    author: &user::Model,
    input: PayoutRequest,
) -> AppResult<author_payout::Model> {
    require_role(author, &[Role::Author])?;
    if input.amount < 1 {
        return Err(AppError::validation("Payout amount must be positive"));
    }
    let details = match input.payment_details {
        serde_json::Value::Null => serde_json::json!({}),
        v if v.is_object() => v,
        _ => return Err(AppError::validation("payment_details must be a JSON object")),
    };
    let author_id = author.id;

    db.transaction::<_, author_payout::Model, AppError>(|txn| {
        Box::pin(async move {
            let balance = author_service::balance_for(txn, author_id).await?;
            if input.amount > balance.available_balance {
                return Err(AppError::validation(format!(
                    "Insufficient balance: {} UZS available",
                    format_uzs(balance.available_balance)
                )));
            }

            let now = time::now();
            let mut active: author_balance::ActiveModel = balance.clone().into();
            active.available_balance = Set(balance.available_balance - input.amount);
            active.pending_balance = Set(balance.pending_balance + input.amount);
            active.updated_at = Set(now.clone());
            active.update(txn).await?;

            let payout = author_payout::ActiveModel {
                author_id: Set(author_id),
                amount: Set(input.amount),
                method: Set(input.method.as_str().to_string()),
                status: Set(PayoutStatus::Pending.as_str().to_string()),
                payment_details: Set(details.to_string()),
                processed_by: Set(None),
                processed_at: Set(None),
                transaction_id: Set(String::new()),
                notes: Set(String::new()),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            tracing::info!(payout_id = payout.id, author_id, amount = payout.amount, "payout requested");
            Ok(payout)
        })
    })
    .await
    .map_err(AppError::from)
}

async fn payout_in<C: ConnectionTrait>(
    db: &C,
    id: i32,
    expected: PayoutStatus,
) -> AppResult<author_payout::Model> {
    let payout = AuthorPayout::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Payout"))?;
    if payout.status != expected.as_str() {
        return Err(AppError::invalid_state(format!(
            "Payout is {}, expected {}",
            payout.status, expected
        )));
    }
    Ok(payout)
}

pub async fn approve_payout(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    id: i32,
) -> AppResult<author_payout::Model> {
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, author_payout::Model, AppError>(|txn| {
        Box::pin(async move {
            let payout = payout_in(txn, id, PayoutStatus::Pending).await?;
            let mut active: author_payout::ActiveModel = payout.into();
            active.status = Set(PayoutStatus::Processing.as_str().to_string());
            active.processed_by = Set(Some(admin_id));
            active.updated_at = Set(time::now());
            let saved = active.update(txn).await?;

            moderation_service::log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(
                    ActionType::PayoutApproved,
                    format!("Approved payout #{} of {} UZS", saved.id, format_uzs(saved.amount)),
                )
                .user(saved.author_id),
            )
            .await?;
            Ok(saved)
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn reject_payout(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    id: i32,
    notes: String,
) -> AppResult<author_payout::Model> {
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, author_payout::Model, AppError>(|txn| {
        Box::pin(async move {
            let payout = payout_in(txn, id, PayoutStatus::Pending).await?;
            let now = time::now();

            let balance = author_service::balance_for(txn, payout.author_id).await?;
            let mut funds: author_balance::ActiveModel = balance.clone().into();
            funds.available_balance = Set(balance.available_balance + payout.amount);
            funds.pending_balance = Set((balance.pending_balance - payout.amount).max(0));
            funds.updated_at = Set(now.clone());
            funds.update(txn).await?;

            let mut active: author_payout::ActiveModel = payout.into();
            active.status = Set(PayoutStatus::Rejected.as_str().to_string());
            active.processed_by = Set(Some(admin_id));
            active.processed_at = Set(Some(now.clone()));
            active.notes = Set(notes.clone());
            active.updated_at = Set(now);
            let saved = active.update(txn).await?;

            moderation_service::log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(ActionType::PayoutRejected, format!("Rejected payout #{}", saved.id))
                    .user(saved.author_id)
                    .data(serde_json::json!({ "notes": notes })),
            )
            .await?;
            Ok(saved)
        })
    })
    .await
    .map_err(AppError::from)
}

/// Settle a processing payout. `reference` is the bank or gateway
/// reference, if any.
pub async fn complete_payout(
    db: &DatabaseConnection,
    admin: &user::Model,
    id: i32,
    reference: Option<String>,
) -> AppResult<author_payout::Model> {
    let admin_id = admin.id;

    db.transaction::<_, author_payout::Model, AppError>(|txn| {
        Box::pin(async move {
            let payout = payout_in(txn, id, PayoutStatus::Processing).await?;
            let now = time::now();

            let balance = author_service::balance_for(txn, payout.author_id).await?;
            let mut funds: author_balance::ActiveModel = balance.clone().into();
            funds.pending_balance = Set((balance.pending_balance - payout.amount).max(0));
            funds.total_withdrawn = Set(balance.total_withdrawn + payout.amount);
            funds.updated_at = Set(now.clone());
            funds.update(txn).await?;

            let gateway = payout
                .method
                .parse::<PayoutMethod>()
                .ok()
                .and_then(|m| match m {
                    PayoutMethod::BankTransfer => None,
                    other => Some(other.as_str().to_string()),
                });
            let record = transaction::ActiveModel {
                transaction_id: Set(new_transaction_id()),
                transaction_type: Set(TransactionType::AuthorPayout.as_str().to_string()),
                payer_id: Set(None),
                payee_id: Set(Some(payout.author_id)),
                amount: Set(payout.amount),
                currency: Set("UZS".to_string()),
                gateway: Set(gateway),
                gateway_transaction_id: Set(reference.clone().unwrap_or_default()),
                status: Set(TransactionStatus::Success.as_str().to_string()),
                course_id: Set(None),
                enrollment_id: Set(None),
                metadata: Set(serde_json::json!({ "payout_id": payout.id }).to_string()),
                error_message: Set(String::new()),
                completed_at: Set(Some(now.clone())),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            let mut active: author_payout::ActiveModel = payout.into();
            active.status = Set(PayoutStatus::Completed.as_str().to_string());
            active.processed_by = Set(Some(admin_id));
            active.processed_at = Set(Some(now.clone()));
            active.transaction_id = Set(reference.unwrap_or(record.transaction_id));
            active.updated_at = Set(now);
            let saved = active.update(txn).await?;

            tracing::info!(payout_id = saved.id, author_id = saved.author_id, "payout completed");
            Ok(saved)
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn my_payouts(db: &DatabaseConnection, author: &user::Model) -> AppResult<Vec<author_payout::Model>> {
    Ok(AuthorPayout::find()
        .filter(author_payout::Column::AuthorId.eq(author.id))
        .order_by_desc(author_payout::Column::CreatedAt)
        .order_by_desc(author_payout::Column::Id)
        .all(db)
        .await?)
}

pub async fn list_payouts(
    db: &DatabaseConnection,
    status: Option<PayoutStatus>,
) -> AppResult<Vec<author_payout::Model>> {
    let mut query = AuthorPayout::find();
    if let Some(status) = status {
        query = query.filter(author_payout::Column::Status.eq(status.as_str()));
    }
    Ok(query
        .order_by_desc(author_payout::Column::CreatedAt)
        .order_by_desc(author_payout::Column::Id)
        .all(db)
        .await?)
}
