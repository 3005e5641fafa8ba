//! Course purchases, gateway callbacks, commissions and refunds
//!
//! A purchase starts as a PENDING `COURSE_PURCHASE` transaction. The
//! gateway reports back through a signed callback, and a successful payment
//! enrolls the student and credits the author's share of the amount.

use chrono::Utc;
use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ActionType, AppError, AppResult, Gateway, RefundStatus, TransactionStatus,
    TransactionType,
};
use crate::infrastructure::config::Config;
use crate::models::category::Entity as Category;
use crate::models::course::{self, Entity as Course};
use crate::models::course_category::{self, Entity as CourseCategory};
use crate::models::course_enrollment::{self, Entity as Enrollment};
use crate::models::lesson_progress::{self, Entity as LessonProgress};
use crate::models::payment_gateway_config::{self, Entity as GatewayConfig};
use crate::models::platform_commission::{self, Entity as PlatformCommission};
use crate::models::refund_request::{self, Entity as RefundRequest};
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::user;
use crate::modules::gateways::{self, CheckoutOrder};
use crate::services::moderation_service::{self, AuditContext, LogEntry};
use crate::services::student_service::{self, ProfileDelta};
use crate::services::{author_service, catalog_service, enrollment_service};
use crate::utils::time;

/// `TXN-YYYYmmddHHMMSS-XXXXXXXX`
pub fn new_transaction_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("TXN-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

/// Platform fee for `amount` at `percentage`, rounded to the nearest tiyin
pub fn platform_fee(amount: i64, percentage: f64) -> i64 {
    (amount as f64 * percentage / 100.0).round() as i64
}

pub fn author_share(amount: i64, percentage: f64) -> i64 {
    amount - platform_fee(amount, percentage)
}

// ---------------------------------------------------------------------------
// Commission rules
// ---------------------------------------------------------------------------

/// Percentage kept by the platform for a sale of this course. Course rules
/// beat category rules, which beat global rules; `fallback` applies when no
/// rule is in effect.
pub async fn resolve_commission<C: ConnectionTrait>(db: &C, course_id: i32, fallback: f64) -> AppResult<f64> {
    let now = time::now();
    let rules = PlatformCommission::find()
        .filter(platform_commission::Column::IsActive.eq(true))
        .filter(platform_commission::Column::EffectiveFrom.lte(now.clone()))
        .filter(
            Condition::any()
                .add(platform_commission::Column::EffectiveUntil.is_null())
                .add(platform_commission::Column::EffectiveUntil.gt(now)),
        )
        .order_by_desc(platform_commission::Column::EffectiveFrom)
        .order_by_desc(platform_commission::Column::Id)
        .all(db)
        .await?;

    if let Some(rule) = rules.iter().find(|r| r.course_id == Some(course_id)) {
        return Ok(rule.commission_percentage);
    }

    let category_ids: Vec<i32> = CourseCategory::find()
        .filter(course_category::Column::CourseId.eq(course_id))
        .select_only()
        .column(course_category::Column::CategoryId)
        .into_tuple()
        .all(db)
        .await?;
    if let Some(rule) = rules
        .iter()
        .find(|r| r.course_id.is_none() && r.category_id.is_some_and(|c| category_ids.contains(&c)))
    {
        return Ok(rule.commission_percentage);
    }

    Ok(rules
        .iter()
        .find(|r| r.course_id.is_none() && r.category_id.is_none())
        .map(|r| r.commission_percentage)
        .unwrap_or(fallback))
}

#[derive(Debug, Deserialize)]
pub struct NewCommissionRule {
    pub course_id: Option<i32>,
    pub category_id: Option<i32>,
    #[serde(default = "default_rule_percentage")]
    pub commission_percentage: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub effective_from: Option<String>,
    pub effective_until: Option<String>,
    #[serde(default)]
    pub notes: String,
}

fn default_rule_percentage() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

fn normalize_timestamp(raw: &str, field: &str) -> AppResult<String> {
    time::parse(raw.trim())
        .map(time::to_db)
        .ok_or_else(|| AppError::validation(format!("{field} must be an RFC 3339 timestamp")))
}

pub async fn create_commission_rule(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    input: NewCommissionRule,
) -> AppResult<platform_commission::Model> {
    if !(0.0..=100.0).contains(&input.commission_percentage) {
        return Err(AppError::validation("Commission must be between 0 and 100"));
    }
    if input.course_id.is_some() && input.category_id.is_some() {
        return Err(AppError::validation(
            "A commission rule targets a course or a category, not both",
        ));
    }
    if let Some(course_id) = input.course_id
        && Course::find_by_id(course_id).one(db).await?.is_none()
    {
        return Err(AppError::validation(format!("Unknown course id {course_id}")));
    }
    if let Some(category_id) = input.category_id
        && Category::find_by_id(category_id).one(db).await?.is_none()
    {
        return Err(AppError::validation(format!("Unknown category id {category_id}")));
    }

    let now = time::now();
    let effective_from = match input.effective_from.as_deref() {
        Some(raw) => normalize_timestamp(raw, "effective_from")?,
        None => now.clone(),
    };
    let effective_until = match input.effective_until.as_deref() {
        Some(raw) => {
            let until = normalize_timestamp(raw, "effective_until")?;
            if until <= effective_from {
                return Err(AppError::validation(
                    "effective_until must be after effective_from",
                ));
            }
            Some(until)
        }
        None => None,
    };

    let rule = platform_commission::ActiveModel {
        course_id: Set(input.course_id),
        category_id: Set(input.category_id),
        commission_percentage: Set(input.commission_percentage),
        is_active: Set(input.is_active),
        effective_from: Set(effective_from),
        effective_until: Set(effective_until),
        notes: Set(input.notes),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    moderation_service::log_action(
        db,
        admin.id,
        ctx,
        LogEntry::new(
            ActionType::ConfigChanged,
            format!("Created commission rule of {}%", rule.commission_percentage),
        )
        .data(serde_json::json!({
            "rule_id": rule.id,
            "course_id": rule.course_id,
            "category_id": rule.category_id,
        })),
    )
    .await?;
    Ok(rule)
}

pub async fn list_commission_rules(db: &DatabaseConnection) -> AppResult<Vec<platform_commission::Model>> {
    Ok(PlatformCommission::find()
        .order_by_desc(platform_commission::Column::CreatedAt)
        .order_by_desc(platform_commission::Column::Id)
        .all(db)
        .await?)
}

// ---------------------------------------------------------------------------
// Gateway configuration
// ---------------------------------------------------------------------------

/// Gateway settings as shown to admins. The secret itself never leaves the
/// server.
#[derive(Debug, Serialize)]
pub struct GatewayConfigView {
    pub gateway: String,
    pub is_active: bool,
    pub merchant_id: String,
    pub api_url: String,
    pub config: serde_json::Value,
    pub commission_percentage: f64,
    pub has_secret: bool,
    pub updated_at: String,
}

impl From<payment_gateway_config::Model> for GatewayConfigView {
    fn from(m: payment_gateway_config::Model) -> Self {
        Self {
            has_secret: !m.secret_key.is_empty(),
            config: serde_json::from_str(&m.config).unwrap_or_else(|_| serde_json::json!({})),
            gateway: m.gateway,
            is_active: m.is_active,
            merchant_id: m.merchant_id,
            api_url: m.api_url,
            commission_percentage: m.commission_percentage,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfigUpdate {
    pub is_active: Option<bool>,
    pub commission_percentage: Option<f64>,
    pub api_url: Option<String>,
    pub merchant_id: Option<String>,
    pub secret_key: Option<String>,
    pub config: Option<serde_json::Value>,
}

async fn gateway_row<C: ConnectionTrait>(db: &C, gateway: Gateway) -> AppResult<Option<payment_gateway_config::Model>> {
    Ok(GatewayConfig::find()
        .filter(payment_gateway_config::Column::Gateway.eq(gateway.as_str()))
        .one(db)
        .await?)
}

/// Insert a row per gateway from the environment unless one exists.
pub async fn seed_gateways(db: &DatabaseConnection, config: &Config) -> AppResult<()> {
    for gateway in Gateway::ALL {
        if gateway_row(db, *gateway).await?.is_some() {
            continue;
        }
        let creds = match gateway {
            Gateway::Click => &config.click,
            Gateway::Payme => &config.payme,
            Gateway::Uzum => &config.uzum,
        };
        let extra = if creds.service_id.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::json!({ "service_id": creds.service_id })
        };
        let now = time::now();
        payment_gateway_config::ActiveModel {
            gateway: Set(gateway.as_str().to_string()),
            is_active: Set(true),
            merchant_id: Set(creds.merchant_id.clone()),
            secret_key: Set(creds.secret_key.clone()),
            api_url: Set(gateways::default_api_url(*gateway).to_string()),
            config: Set(extra.to_string()),
            commission_percentage: Set(2.0),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        tracing::info!(gateway = %gateway, "seeded payment gateway config");
    }
    Ok(())
}

pub async fn list_gateway_configs(db: &DatabaseConnection) -> AppResult<Vec<GatewayConfigView>> {
    Ok(GatewayConfig::find()
        .order_by_asc(payment_gateway_config::Column::Gateway)
        .all(db)
        .await?
        .into_iter()
        .map(GatewayConfigView::from)
        .collect())
}

pub async fn get_gateway_config(db: &DatabaseConnection, gateway: Gateway) -> AppResult<GatewayConfigView> {
    gateway_row(db, gateway)
        .await?
        .map(GatewayConfigView::from)
        .ok_or(AppError::NotFound("Payment gateway"))
}

pub async fn update_gateway_config(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    gateway: Gateway,
    input: GatewayConfigUpdate,
) -> AppResult<GatewayConfigView> {
    let row = gateway_row(db, gateway)
        .await?
        .ok_or(AppError::NotFound("Payment gateway"))?;

    let mut changed = Vec::new();
    let mut active: payment_gateway_config::ActiveModel = row.into();
    if let Some(flag) = input.is_active {
        active.is_active = Set(flag);
        changed.push("is_active");
    }
    if let Some(pct) = input.commission_percentage {
        if !(0.0..=100.0).contains(&pct) {
            return Err(AppError::validation("Commission must be between 0 and 100"));
        }
        active.commission_percentage = Set(pct);
        changed.push("commission_percentage");
    }
    if let Some(url) = input.api_url {
        let url = url.trim().trim_end_matches('/').to_string();
        if !url.is_empty() && url::Url::parse(&url).is_err() {
            return Err(AppError::validation("api_url must be an absolute URL"));
        }
        active.api_url = Set(url);
        changed.push("api_url");
    }
    if let Some(merchant) = input.merchant_id {
        active.merchant_id = Set(merchant.trim().to_string());
        changed.push("merchant_id");
    }
    if let Some(secret) = input.secret_key {
        active.secret_key = Set(secret.trim().to_string());
        changed.push("secret_key");
    }
    if let Some(extra) = input.config {
        if !extra.is_object() {
            return Err(AppError::validation("config must be a JSON object"));
        }
        active.config = Set(extra.to_string());
        changed.push("config");
    }
    active.updated_at = Set(time::now());
    let saved = active.update(db).await?;

    moderation_service::log_action(
        db,
        admin.id,
        ctx,
        LogEntry::new(
            ActionType::ConfigChanged,
            format!("Updated {} gateway settings", saved.gateway),
        )
        .data(serde_json::json!({ "fields": changed })),
    )
    .await?;
    Ok(saved.into())
}

// ---------------------------------------------------------------------------
// Checkout and callbacks
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CheckoutSession {
    pub transaction: transaction::Model,
    pub checkout_url: String,
}

pub async fn checkout(
    db: &DatabaseConnection,
    student: &user::Model,
    slug: &str,
    gateway: Gateway,
) -> AppResult<CheckoutSession> {
    let course = catalog_service::published_by_slug(db, slug).await?;
    if course.price <= 0 {
        return Err(AppError::validation(
            "This course is free. Enroll without checkout",
        ));
    }
    if enrollment_service::find_enrollment(db, course.id, student.id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("You are already enrolled in this course".into()));
    }

    let cfg = gateway_row(db, gateway)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::validation(format!("{gateway} payments are not available")))?;
    let provider = gateways::provider(gateway, &cfg)?;

    let now = time::now();
    let transaction = transaction::ActiveModel {
        transaction_id: Set(new_transaction_id()),
        transaction_type: Set(TransactionType::CoursePurchase.as_str().to_string()),
        payer_id: Set(Some(student.id)),
        payee_id: Set(Some(course.author_id)),
        amount: Set(course.price),
        currency: Set("UZS".to_string()),
        gateway: Set(Some(gateway.as_str().to_string())),
        gateway_transaction_id: Set(String::new()),
        status: Set(TransactionStatus::Pending.as_str().to_string()),
        course_id: Set(Some(course.id)),
        enrollment_id: Set(None),
        metadata: Set(serde_json::json!({ "course_slug": course.slug }).to_string()),
        error_message: Set(String::new()),
        completed_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let checkout_url = provider.checkout_url(CheckoutOrder {
        transaction_id: &transaction.transaction_id,
        amount_tiyin: transaction.amount,
    })?;

    tracing::info!(
        transaction_id = %transaction.transaction_id,
        course_id = course.id,
        gateway = %gateway,
        "checkout started"
    );
    Ok(CheckoutSession {
        transaction,
        checkout_url,
    })
}

/// Body posted by a gateway once a payment settles
#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    pub transaction_id: String,
    #[serde(default)]
    pub gateway_transaction_id: String,
    pub amount: i64,
    pub status: String,
}

pub async fn gateway_callback(
    db: &DatabaseConnection,
    fallback_rate: f64,
    gateway: Gateway,
    payload: CallbackPayload,
    signature: &str,
) -> AppResult<transaction::Model> {
    let cfg = gateway_row(db, gateway)
        .await?
        .ok_or(AppError::NotFound("Payment gateway"))?;
    let signed = gateways::callback_payload(
        &payload.transaction_id,
        &payload.gateway_transaction_id,
        payload.amount,
        &payload.status,
    );
    if !gateways::verify_signature(&cfg.secret_key, &signed, signature) {
        tracing::warn!(gateway = %gateway, transaction_id = %payload.transaction_id, "rejected callback signature");
        return Err(AppError::Unauthorized("Invalid signature".into()));
    }

    let existing = Transaction::find()
        .filter(transaction::Column::TransactionId.eq(payload.transaction_id.as_str()))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Transaction"))?;
    if existing.gateway.as_deref() != Some(gateway.as_str()) {
        return Err(AppError::validation("Transaction belongs to another gateway"));
    }
    if existing.amount != payload.amount {
        return Err(AppError::validation("Amount does not match the transaction"));
    }
    if existing.status != TransactionStatus::Pending.as_str() {
        tracing::debug!(transaction_id = %existing.transaction_id, status = %existing.status, "duplicate callback ignored");
        return Ok(existing);
    }

    let id = existing.id;
    let gateway_txn_id = payload.gateway_transaction_id;
    match payload.status.trim().to_ascii_lowercase().as_str() {
        "success" => db
            .transaction::<_, transaction::Model, AppError>(|txn| {
                Box::pin(async move {
                    match claim(txn, id, TransactionStatus::Success).await? {
                        Some(claimed) => fulfil(txn, claimed, gateway_txn_id, fallback_rate).await,
                        None => settled(txn, id).await,
                    }
                })
            })
            .await
            .map_err(AppError::from),
        "failed" => db
            .transaction::<_, transaction::Model, AppError>(|txn| {
                Box::pin(async move {
                    match claim(txn, id, TransactionStatus::Failed).await? {
                        Some(claimed) => {
                            fail(txn, claimed, &gateway_txn_id, "Payment declined by gateway").await
                        }
                        None => settled(txn, id).await,
                    }
                })
            })
            .await
            .map_err(AppError::from),
        other => Err(AppError::validation(format!("Unknown payment status '{other}'"))),
    }
}

/// Move a PENDING row to `status` with a single conditional UPDATE.
/// `None` when another request settled it first.
async fn claim<C: ConnectionTrait>(
    db: &C,
    id: i32,
    status: TransactionStatus,
) -> AppResult<Option<transaction::Model>> {
    let result = Transaction::update_many()
        .col_expr(transaction::Column::Status, sea_query::Expr::value(status.as_str()))
        .col_expr(transaction::Column::UpdatedAt, sea_query::Expr::value(time::now()))
        .filter(transaction::Column::Id.eq(id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }
    Ok(Transaction::find_by_id(id).one(db).await?)
}

async fn settled<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<transaction::Model> {
    let current = Transaction::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Transaction"))?;
    tracing::debug!(transaction_id = %current.transaction_id, status = %current.status, "duplicate callback ignored");
    Ok(current)
}

/// Enroll the payer, credit the author and close the transaction.
async fn fulfil<C: ConnectionTrait>(
    db: &C,
    transaction: transaction::Model,
    gateway_transaction_id: String,
    fallback_rate: f64,
) -> AppResult<transaction::Model> {
    let course_id = transaction
        .course_id
        .ok_or_else(|| AppError::invalid_state("Transaction has no course"))?;
    let payer_id = transaction
        .payer_id
        .ok_or_else(|| AppError::invalid_state("Transaction has no payer"))?;
    let course = Course::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Course"))?;

    let outcome = enrollment_service::create_enrollment(db, &course, payer_id, transaction.amount).await?;

    let percentage = resolve_commission(db, course.id, fallback_rate).await?;
    let share = author_share(transaction.amount, percentage);
    author_service::credit_sale(db, course.author_id, share).await?;

    let mut metadata: serde_json::Value =
        serde_json::from_str(&transaction.metadata).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = metadata.as_object_mut() {
        obj.insert("commission_percentage".into(), percentage.into());
        obj.insert("platform_fee".into(), (transaction.amount - share).into());
        obj.insert("author_share".into(), share.into());
    }

    let now = time::now();
    let mut active: transaction::ActiveModel = transaction.into();
    active.status = Set(TransactionStatus::Success.as_str().to_string());
    active.completed_at = Set(Some(now.clone()));
    if !gateway_transaction_id.is_empty() {
        active.gateway_transaction_id = Set(gateway_transaction_id);
    }
    active.enrollment_id = Set(Some(outcome.enrollment.id));
    active.metadata = Set(metadata.to_string());
    active.updated_at = Set(now);
    let saved = active.update(db).await?;

    tracing::info!(
        transaction_id = %saved.transaction_id,
        course_id,
        author_share = share,
        "payment fulfilled"
    );
    Ok(saved)
}

async fn fail<C: ConnectionTrait>(
    db: &C,
    transaction: transaction::Model,
    gateway_transaction_id: &str,
    message: &str,
) -> AppResult<transaction::Model> {
    let mut active: transaction::ActiveModel = transaction.into();
    active.status = Set(TransactionStatus::Failed.as_str().to_string());
    if !gateway_transaction_id.is_empty() {
        active.gateway_transaction_id = Set(gateway_transaction_id.to_string());
    }
    active.error_message = Set(message.to_string());
    active.updated_at = Set(time::now());
    let saved = active.update(db).await?;
    tracing::info!(transaction_id = %saved.transaction_id, "payment failed");
    Ok(saved)
}

async fn pending_transaction<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<transaction::Model> {
    let transaction = Transaction::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Transaction"))?;
    if transaction.status != TransactionStatus::Pending.as_str() {
        return Err(AppError::invalid_state(format!(
            "Transaction is {}, only pending transactions can be settled",
            transaction.status
        )));
    }
    Ok(transaction)
}

/// Manual settlement, same effects as a successful callback
pub async fn mark_success(db: &DatabaseConnection, fallback_rate: f64, id: i32) -> AppResult<transaction::Model> {
    db.transaction::<_, transaction::Model, AppError>(|txn| {
        Box::pin(async move {
            pending_transaction(txn, id).await?;
            let claimed = claim(txn, id, TransactionStatus::Success)
                .await?
                .ok_or_else(|| AppError::invalid_state("Transaction was settled concurrently"))?;
            fulfil(txn, claimed, String::new(), fallback_rate).await
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn mark_failed(db: &DatabaseConnection, id: i32, reason: Option<String>) -> AppResult<transaction::Model> {
    pending_transaction(db, id).await?;
    let transaction = claim(db, id, TransactionStatus::Failed)
        .await?
        .ok_or_else(|| AppError::invalid_state("Transaction was settled concurrently"))?;
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "Marked as failed by an administrator".to_string());
    fail(db, transaction, "", &reason).await
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
    pub limit: Option<u64>,
}

pub async fn list_transactions(
    db: &DatabaseConnection,
    filter: TransactionFilter,
) -> AppResult<Vec<transaction::Model>> {
    let mut query = Transaction::find();
    if let Some(status) = filter.status {
        query = query.filter(transaction::Column::Status.eq(status.as_str()));
    }
    if let Some(kind) = filter.transaction_type {
        query = query.filter(transaction::Column::TransactionType.eq(kind.as_str()));
    }
    Ok(query
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .limit(filter.limit.unwrap_or(50).clamp(1, 500))
        .all(db)
        .await?)
}

/// Purchases and refunds where the user paid or was paid
pub async fn my_transactions(db: &DatabaseConnection, account: &user::Model) -> AppResult<Vec<transaction::Model>> {
    Ok(Transaction::find()
        .filter(
            Condition::any()
                .add(transaction::Column::PayerId.eq(account.id))
                .add(transaction::Column::PayeeId.eq(account.id)),
        )
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await?)
}

// ---------------------------------------------------------------------------
// Refunds
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RefundInput {
    pub enrollment_id: i32,
    pub reason: String,
}

pub async fn request_refund(
    db: &DatabaseConnection,
    student: &user::Model,
    input: RefundInput,
) -> AppResult<refund_request::Model> {
    let enrollment = Enrollment::find_by_id(input.enrollment_id)
        .one(db)
        .await?
        .filter(|e| e.student_id == student.id)
        .ok_or(AppError::NotFound("Enrollment"))?;
    let reason = input.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::validation("Please explain why you want a refund"));
    }
    if enrollment.price_paid <= 0 {
        return Err(AppError::validation("Free enrollments cannot be refunded"));
    }

    let open = RefundRequest::find()
        .filter(refund_request::Column::EnrollmentId.eq(enrollment.id))
        .filter(refund_request::Column::Status.is_in([
            RefundStatus::Pending.as_str(),
            RefundStatus::Approved.as_str(),
        ]))
        .count(db)
        .await?;
    if open > 0 {
        return Err(AppError::Conflict(
            "A refund request for this enrollment is already open".into(),
        ));
    }

    let purchase = Transaction::find()
        .filter(transaction::Column::TransactionType.eq(TransactionType::CoursePurchase.as_str()))
        .filter(transaction::Column::Status.eq(TransactionStatus::Success.as_str()))
        .filter(
            Condition::any().add(transaction::Column::EnrollmentId.eq(enrollment.id)).add(
                Condition::all()
                    .add(transaction::Column::CourseId.eq(enrollment.course_id))
                    .add(transaction::Column::PayerId.eq(student.id)),
            ),
        )
        .order_by_desc(transaction::Column::Id)
        .one(db)
        .await?;

    let now = time::now();
    let refund = refund_request::ActiveModel {
        enrollment_id: Set(Some(enrollment.id)),
        course_id: Set(enrollment.course_id),
        student_id: Set(student.id),
        original_transaction_id: Set(purchase.map(|t| t.id)),
        amount: Set(enrollment.price_paid),
        reason: Set(reason),
        status: Set(RefundStatus::Pending.as_str().to_string()),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        admin_notes: Set(String::new()),
        refund_transaction_id: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(refund_id = refund.id, enrollment_id = enrollment.id, "refund requested");
    Ok(refund)
}

async fn pending_refund<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<refund_request::Model> {
    let refund = RefundRequest::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Refund request"))?;
    if refund.status != RefundStatus::Pending.as_str() {
        return Err(AppError::invalid_state(format!(
            "Refund request is {}, only pending requests can be reviewed",
            refund.status
        )));
    }
    Ok(refund)
}

/// Author share recorded at sale time, recomputed when the purchase
/// predates that bookkeeping.
async fn refunded_share<C: ConnectionTrait>(
    db: &C,
    original: Option<&transaction::Model>,
    course_id: i32,
    amount: i64,
    fallback_rate: f64,
) -> AppResult<i64> {
    let recorded = original
        .and_then(|t| serde_json::from_str::<serde_json::Value>(&t.metadata).ok())
        .and_then(|m| m.get("author_share").and_then(|v| v.as_i64()));
    match recorded {
        Some(share) => Ok(share),
        None => {
            let pct = resolve_commission(db, course_id, fallback_rate).await?;
            Ok(author_share(amount, pct))
        }
    }
}

pub async fn approve_refund(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    fallback_rate: f64,
    refund_id: i32,
    admin_notes: String,
) -> AppResult<refund_request::Model> {
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, refund_request::Model, AppError>(|txn| {
        Box::pin(async move {
            let refund = pending_refund(txn, refund_id).await?;
            let course = Course::find_by_id(refund.course_id)
                .one(txn)
                .await?
                .ok_or(AppError::NotFound("Course"))?;
            let original = match refund.original_transaction_id {
                Some(id) => Transaction::find_by_id(id).one(txn).await?,
                None => None,
            };
            let now = time::now();

            let refund_txn = transaction::ActiveModel {
                transaction_id: Set(new_transaction_id()),
                transaction_type: Set(TransactionType::Refund.as_str().to_string()),
                payer_id: Set(Some(course.author_id)),
                payee_id: Set(Some(refund.student_id)),
                amount: Set(refund.amount),
                currency: Set("UZS".to_string()),
                gateway: Set(original.as_ref().and_then(|t| t.gateway.clone())),
                gateway_transaction_id: Set(String::new()),
                status: Set(TransactionStatus::Success.as_str().to_string()),
                course_id: Set(Some(course.id)),
                enrollment_id: Set(None),
                metadata: Set(serde_json::json!({
                    "refund_request_id": refund.id,
                    "original_transaction": original.as_ref().map(|t| t.transaction_id.clone()),
                })
                .to_string()),
                error_message: Set(String::new()),
                completed_at: Set(Some(now.clone())),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            let share = refunded_share(txn, original.as_ref(), course.id, refund.amount, fallback_rate).await?;
            if let Some(original) = original {
                let mut active: transaction::ActiveModel = original.into();
                active.status = Set(TransactionStatus::Refunded.as_str().to_string());
                active.updated_at = Set(now.clone());
                active.update(txn).await?;
            }
            author_service::debit_refund(txn, course.author_id, share).await?;

            if let Some(enrollment_id) = refund.enrollment_id {
                LessonProgress::delete_many()
                    .filter(lesson_progress::Column::EnrollmentId.eq(enrollment_id))
                    .exec(txn)
                    .await?;
                let removed = Enrollment::delete_many()
                    .filter(course_enrollment::Column::Id.eq(enrollment_id))
                    .exec(txn)
                    .await?;
                if removed.rows_affected > 0 {
                    let mut active: course::ActiveModel = course.clone().into();
                    active.enrollment_count = Set((course.enrollment_count - 1).max(0));
                    active.updated_at = Set(now.clone());
                    active.update(txn).await?;
                    student_service::apply_delta(
                        txn,
                        refund.student_id,
                        ProfileDelta {
                            enrolled: -1,
                            ..Default::default()
                        },
                    )
                    .await?;
                }
            }

            let mut active: refund_request::ActiveModel = refund.clone().into();
            active.status = Set(RefundStatus::Completed.as_str().to_string());
            active.enrollment_id = Set(None);
            active.reviewed_by = Set(Some(admin_id));
            active.reviewed_at = Set(Some(now.clone()));
            active.admin_notes = Set(admin_notes);
            active.refund_transaction_id = Set(Some(refund_txn.id));
            active.updated_at = Set(now);
            let saved = active.update(txn).await?;

            moderation_service::log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(
                    ActionType::RefundApproved,
                    format!("Refunded {} UZS for course '{}'", gateways::format_uzs(refund.amount), course.title),
                )
                .user(refund.student_id)
                .course(course.id)
                .data(serde_json::json!({
                    "refund_request_id": saved.id,
                    "refund_transaction": refund_txn.transaction_id,
                    "author_debit": share,
                })),
            )
            .await?;
            Ok(saved)
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn reject_refund(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    refund_id: i32,
    admin_notes: String,
) -> AppResult<refund_request::Model> {
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, refund_request::Model, AppError>(|txn| {
        Box::pin(async move {
            let refund = pending_refund(txn, refund_id).await?;
            let now = time::now();
            let mut active: refund_request::ActiveModel = refund.into();
            active.status = Set(RefundStatus::Rejected.as_str().to_string());
            active.reviewed_by = Set(Some(admin_id));
            active.reviewed_at = Set(Some(now.clone()));
            active.admin_notes = Set(admin_notes);
            active.updated_at = Set(now);
            let saved = active.update(txn).await?;

            moderation_service::log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(ActionType::RefundRejected, format!("Rejected refund request #{}", saved.id))
                    .user(saved.student_id)
                    .course(saved.course_id),
            )
            .await?;
            Ok(saved)
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn list_refunds(
    db: &DatabaseConnection,
    status: Option<RefundStatus>,
) -> AppResult<Vec<refund_request::Model>> {
    let mut query = RefundRequest::find();
    if let Some(status) = status {
        query = query.filter(refund_request::Column::Status.eq(status.as_str()));
    }
    Ok(query
        .order_by_desc(refund_request::Column::CreatedAt)
        .order_by_desc(refund_request::Column::Id)
        .all(db)
        .await?)
}

pub async fn my_refunds(db: &DatabaseConnection, student: &user::Model) -> AppResult<Vec<refund_request::Model>> {
    Ok(RefundRequest::find()
        .filter(refund_request::Column::StudentId.eq(student.id))
        .order_by_desc(refund_request::Column::CreatedAt)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_shape() {
        let id = new_transaction_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn commission_split() {
        assert_eq!(platform_fee(100_000, 20.0), 20_000);
        assert_eq!(author_share(100_000, 20.0), 80_000);
        assert_eq!(author_share(100_000, 0.0), 100_000);
        assert_eq!(author_share(100_000, 100.0), 0);
        // 33.33% of 1001 = 333.63 -> 334
        assert_eq!(platform_fee(1001, 33.33), 334);
        assert_eq!(author_share(1001, 33.33), 667);
    }
}
