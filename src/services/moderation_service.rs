//! Course review queue, user sanctions and the admin audit log

use chrono::{Duration, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ActionType, AppError, AppResult, BanReason, CourseStatus, ModerationStatus, UserAction,
};
use crate::models::course::{self, Entity as Course};
use crate::models::course_moderation::{self, Entity as CourseModeration};
use crate::models::moderation_log::{self, Entity as ModerationLog};
use crate::models::user::{self, Entity as User};
use crate::models::user_moderation::{self, Entity as UserModeration};
use crate::services::author_service;
use crate::utils::time;

/// Request metadata recorded with every admin action
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub ip: Option<String>,
    pub user_agent: String,
}

/// One audit log line
#[derive(Debug)]
pub struct LogEntry {
    pub action: ActionType,
    pub description: String,
    pub affected_user_id: Option<i32>,
    pub affected_course_id: Option<i32>,
    pub data: serde_json::Value,
}

impl LogEntry {
    pub fn new(action: ActionType, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            affected_user_id: None,
            affected_course_id: None,
            data: serde_json::json!({}),
        }
    }

    pub fn user(mut self, user_id: i32) -> Self {
        self.affected_user_id = Some(user_id);
        self
    }

    pub fn course(mut self, course_id: i32) -> Self {
        self.affected_course_id = Some(course_id);
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Append to the audit log. Rows are never updated afterwards.
pub async fn log_action<C: ConnectionTrait>(
    db: &C,
    admin_id: i32,
    ctx: &AuditContext,
    entry: LogEntry,
) -> AppResult<moderation_log::Model> {
    let row = moderation_log::ActiveModel {
        admin_id: Set(Some(admin_id)),
        action_type: Set(entry.action.as_str().to_string()),
        description: Set(entry.description),
        affected_user_id: Set(entry.affected_user_id),
        affected_course_id: Set(entry.affected_course_id),
        ip_address: Set(ctx.ip.clone()),
        user_agent: Set(ctx.user_agent.clone()),
        additional_data: Set(entry.data.to_string()),
        created_at: Set(time::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(admin_id, action = %row.action_type, "{}", row.description);
    Ok(row)
}

pub async fn list_logs(
    db: &DatabaseConnection,
    action_type: Option<ActionType>,
    limit: u64,
) -> AppResult<Vec<moderation_log::Model>> {
    let mut query = ModerationLog::find();
    if let Some(action) = action_type {
        query = query.filter(moderation_log::Column::ActionType.eq(action.as_str()));
    }
    Ok(query
        .order_by_desc(moderation_log::Column::CreatedAt)
        .order_by_desc(moderation_log::Column::Id)
        .limit(limit.clamp(1, 500))
        .all(db)
        .await?)
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

pub async fn moderation_queue(db: &DatabaseConnection) -> AppResult<Vec<course::Model>> {
    Ok(Course::find()
        .filter(course::Column::Status.eq(CourseStatus::Pending.as_str()))
        .filter(course::Column::IsDeleted.eq(false))
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .all(db)
        .await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalInput {
    #[serde(default)]
    pub review_notes: String,
    pub quality_score: Option<i32>,
    #[serde(default)]
    pub content_complete: bool,
    #[serde(default)]
    pub video_quality_ok: bool,
    #[serde(default)]
    pub description_adequate: bool,
    #[serde(default)]
    pub pricing_appropriate: bool,
}

async fn pending_course<C: ConnectionTrait>(db: &C, course_id: i32) -> AppResult<course::Model> {
    let course = Course::find_by_id(course_id)
        .filter(course::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Course"))?;
    if course.status != CourseStatus::Pending.as_str() {
        return Err(AppError::invalid_state(format!(
            "Course is {}, only pending courses can be reviewed",
            course.status
        )));
    }
    Ok(course)
}

/// Latest record still awaiting a decision, or a fresh one.
async fn open_record<C: ConnectionTrait>(db: &C, course_id: i32) -> AppResult<course_moderation::ActiveModel> {
    let open = CourseModeration::find()
        .filter(course_moderation::Column::CourseId.eq(course_id))
        .filter(course_moderation::Column::Status.is_in([
            ModerationStatus::Pending.as_str(),
            ModerationStatus::InReview.as_str(),
        ]))
        .order_by_desc(course_moderation::Column::Id)
        .one(db)
        .await?;

    Ok(match open {
        Some(record) => record.into(),
        None => course_moderation::ActiveModel {
            course_id: Set(course_id),
            review_notes: Set(String::new()),
            rejection_reason: Set(String::new()),
            changes_requested: Set(String::new()),
            content_complete: Set(false),
            video_quality_ok: Set(false),
            description_adequate: Set(false),
            pricing_appropriate: Set(false),
            created_at: Set(time::now()),
            ..Default::default()
        },
    })
}

async fn set_course_status<C: ConnectionTrait>(
    db: &C,
    course: course::Model,
    status: CourseStatus,
) -> AppResult<course::Model> {
    let now = time::now();
    let mut active: course::ActiveModel = course.into();
    active.status = Set(status.as_str().to_string());
    if status == CourseStatus::Published {
        active.published_at = Set(Some(now.clone()));
    }
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

pub async fn approve_course(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    course_id: i32,
    input: ApprovalInput,
) -> AppResult<course::Model> {
    if let Some(score) = input.quality_score
        && !(0..=100).contains(&score)
    {
        return Err(AppError::validation("Quality score must be between 0 and 100"));
    }
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, course::Model, AppError>(|txn| {
        Box::pin(async move {
            let course = pending_course(txn, course_id).await?;
            let now = time::now();

            let mut record = open_record(txn, course.id).await?;
            record.status = Set(ModerationStatus::Approved.as_str().to_string());
            record.reviewer_id = Set(Some(admin_id));
            record.review_notes = Set(input.review_notes);
            record.quality_score = Set(input.quality_score);
            record.content_complete = Set(input.content_complete);
            record.video_quality_ok = Set(input.video_quality_ok);
            record.description_adequate = Set(input.description_adequate);
            record.pricing_appropriate = Set(input.pricing_appropriate);
            record.reviewed_at = Set(Some(now.clone()));
            record.updated_at = Set(now);
            record.save(txn).await?;

            let course = set_course_status(txn, course, CourseStatus::Published).await?;
            author_service::recompute_total_courses(txn, course.author_id).await?;

            log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(ActionType::CourseApproved, format!("Approved course '{}'", course.title))
                    .course(course.id)
                    .user(course.author_id)
                    .data(serde_json::json!({ "quality_score": input.quality_score })),
            )
            .await?;
            Ok(course)
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn reject_course(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    course_id: i32,
    reason: String,
) -> AppResult<course::Model> {
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::validation("A rejection reason is required"));
    }
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, course::Model, AppError>(|txn| {
        Box::pin(async move {
            let course = pending_course(txn, course_id).await?;
            let now = time::now();

            let mut record = open_record(txn, course.id).await?;
            record.status = Set(ModerationStatus::Rejected.as_str().to_string());
            record.reviewer_id = Set(Some(admin_id));
            record.rejection_reason = Set(reason.clone());
            record.reviewed_at = Set(Some(now.clone()));
            record.updated_at = Set(now);
            record.save(txn).await?;

            let course = set_course_status(txn, course, CourseStatus::Rejected).await?;
            log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(ActionType::CourseRejected, format!("Rejected course '{}'", course.title))
                    .course(course.id)
                    .user(course.author_id)
                    .data(serde_json::json!({ "reason": reason })),
            )
            .await?;
            Ok(course)
        })
    })
    .await
    .map_err(AppError::from)
}

/// Send a pending course back to its author as a draft.
pub async fn request_changes(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    course_id: i32,
    changes: String,
) -> AppResult<course::Model> {
    let changes = changes.trim().to_string();
    if changes.is_empty() {
        return Err(AppError::validation("Describe the requested changes"));
    }
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, course::Model, AppError>(|txn| {
        Box::pin(async move {
            let course = pending_course(txn, course_id).await?;
            let now = time::now();

            let mut record = open_record(txn, course.id).await?;
            record.status = Set(ModerationStatus::ChangesRequested.as_str().to_string());
            record.reviewer_id = Set(Some(admin_id));
            record.changes_requested = Set(changes.clone());
            record.reviewed_at = Set(Some(now.clone()));
            record.updated_at = Set(now);
            record.save(txn).await?;

            let course = set_course_status(txn, course, CourseStatus::Draft).await?;
            log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(
                    ActionType::Other,
                    format!("Requested changes to course '{}'", course.title),
                )
                .course(course.id)
                .user(course.author_id)
                .data(serde_json::json!({ "changes": changes })),
            )
            .await?;
            Ok(course)
        })
    })
    .await
    .map_err(AppError::from)
}

pub async fn archive_course(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    course_id: i32,
) -> AppResult<course::Model> {
    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, course::Model, AppError>(|txn| {
        Box::pin(async move {
            let course = Course::find_by_id(course_id)
                .filter(course::Column::IsDeleted.eq(false))
                .one(txn)
                .await?
                .ok_or(AppError::NotFound("Course"))?;
            let previous = course.status.clone();

            let course = set_course_status(txn, course, CourseStatus::Archived).await?;
            author_service::recompute_total_courses(txn, course.author_id).await?;
            log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(ActionType::Other, format!("Archived course '{}'", course.title))
                    .course(course.id)
                    .user(course.author_id)
                    .data(serde_json::json!({ "previous_status": previous })),
            )
            .await?;
            Ok(course)
        })
    })
    .await
    .map_err(AppError::from)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UserSanction {
    pub action: UserAction,
    pub reason: BanReason,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub is_permanent: bool,
    pub duration_days: Option<i64>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SanctionOutcome {
    pub moderation: user_moderation::Model,
    pub user_is_active: bool,
}

/// Longest temporary sanction, one hundred years
pub const MAX_SANCTION_DAYS: i64 = 36_500;

pub async fn moderate_user(
    db: &DatabaseConnection,
    admin: &user::Model,
    ctx: &AuditContext,
    target_id: i32,
    input: UserSanction,
) -> AppResult<SanctionOutcome> {
    if admin.id == target_id {
        return Err(AppError::validation("You cannot moderate your own account"));
    }
    let details = input.details.trim().to_string();
    if details.is_empty() {
        return Err(AppError::validation("Details are required"));
    }

    let needs_duration = match input.action {
        UserAction::Ban => !input.is_permanent,
        UserAction::Suspend => true,
        UserAction::Unban | UserAction::Warning => false,
    };
    let expires_at = match input.duration_days {
        Some(days) if days < 1 => {
            return Err(AppError::validation("duration_days must be at least 1"));
        }
        Some(days) => {
            let until = Duration::try_days(days)
                .filter(|_| days <= MAX_SANCTION_DAYS)
                .and_then(|span| Utc::now().checked_add_signed(span))
                .ok_or_else(|| {
                    AppError::validation(format!("duration_days must be at most {MAX_SANCTION_DAYS}"))
                })?;
            Some(time::to_db(until))
        }
        None if needs_duration => {
            return Err(AppError::validation(
                "duration_days is required for temporary bans and suspensions",
            ));
        }
        None => None,
    };
    let is_permanent = input.action == UserAction::Ban && input.is_permanent;
    let expires_at = if is_permanent { None } else { expires_at };

    let admin_id = admin.id;
    let ctx = ctx.clone();

    db.transaction::<_, SanctionOutcome, AppError>(|txn| {
        Box::pin(async move {
            let target = User::find_by_id(target_id)
                .one(txn)
                .await?
                .ok_or(AppError::NotFound("User"))?;

            let active_flag = match input.action {
                UserAction::Ban | UserAction::Suspend => Some(false),
                UserAction::Unban => Some(true),
                UserAction::Warning => None,
            };
            let mut user_is_active = target.is_active;
            if let Some(flag) = active_flag {
                let mut active: user::ActiveModel = target.clone().into();
                active.is_active = Set(flag);
                active.updated_at = Set(time::now());
                active.update(txn).await?;
                user_is_active = flag;
            }

            let now = time::now();
            let moderation = user_moderation::ActiveModel {
                user_id: Set(target.id),
                action: Set(input.action.as_str().to_string()),
                reason: Set(input.reason.as_str().to_string()),
                details: Set(details.clone()),
                moderator_id: Set(Some(admin_id)),
                is_permanent: Set(is_permanent),
                expires_at: Set(expires_at.clone()),
                ip_address: Set(ctx.ip.clone()),
                evidence_urls: Set(serde_json::to_string(&input.evidence_urls)?),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            let action_type = match input.action {
                UserAction::Ban | UserAction::Suspend => ActionType::UserBanned,
                UserAction::Unban => ActionType::UserUnbanned,
                UserAction::Warning => ActionType::Other,
            };
            log_action(
                txn,
                admin_id,
                &ctx,
                LogEntry::new(
                    action_type,
                    format!("{} user {}: {}", input.action, target.full_name(), details),
                )
                .user(target.id)
                .data(serde_json::json!({
                    "reason": input.reason.as_str(),
                    "is_permanent": is_permanent,
                    "expires_at": expires_at,
                })),
            )
            .await?;

            Ok(SanctionOutcome {
                moderation,
                user_is_active,
            })
        })
    })
    .await
    .map_err(AppError::from)
}

/// Reactivate an account whose last ban or suspension has run out.
/// Returns the refreshed user, or `None` when the account stays disabled.
pub async fn lift_expired_suspension(
    db: &DatabaseConnection,
    account: &user::Model,
) -> AppResult<Option<user::Model>> {
    let latest = UserModeration::find()
        .filter(user_moderation::Column::UserId.eq(account.id))
        .filter(user_moderation::Column::Action.is_in([
            UserAction::Ban.as_str(),
            UserAction::Suspend.as_str(),
        ]))
        .order_by_desc(user_moderation::Column::CreatedAt)
        .order_by_desc(user_moderation::Column::Id)
        .one(db)
        .await?;

    let Some(sanction) = latest else {
        return Ok(None);
    };
    if sanction.is_permanent {
        return Ok(None);
    }
    let expired = sanction
        .expires_at
        .as_deref()
        .and_then(time::parse)
        .is_some_and(|at| at <= Utc::now());
    if !expired {
        return Ok(None);
    }

    let mut active: user::ActiveModel = account.clone().into();
    active.is_active = Set(true);
    active.updated_at = Set(time::now());
    let account = active.update(db).await?;
    tracing::info!(user_id = account.id, "expired suspension lifted");
    Ok(Some(account))
}
