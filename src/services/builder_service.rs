//! Author-side course building: courses, modules, lessons, review submission

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult, CourseLevel, CourseStatus, ModerationStatus};
use crate::infrastructure::auth::is_admin;
use crate::models::category::Entity as Category;
use crate::models::course::{self, Entity as Course};
use crate::models::course_category;
use crate::models::course_moderation;
use crate::models::course_module::{self, Entity as CourseModule};
use crate::models::lesson::{self, Entity as Lesson};
use crate::models::user;
use crate::services::catalog_service::{self, CategoryRef};
use crate::utils::{text::slugify, time};

#[derive(Debug, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub price: i64,
    pub level: Option<CourseLevel>,
    pub language: Option<String>,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub what_you_will_learn: String,
    #[serde(default)]
    pub trailer_url: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<i64>,
    pub level: Option<CourseLevel>,
    pub language: Option<String>,
    pub requirements: Option<String>,
    pub what_you_will_learn: Option<String>,
    pub trailer_url: Option<String>,
    pub thumbnail: Option<String>,
    pub category_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct LessonInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_url: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub is_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub text_content: Option<String>,
    pub is_preview: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct BuilderModule {
    #[serde(flatten)]
    pub module: course_module::Model,
    pub lessons: Vec<lesson::Model>,
}

#[derive(Debug, Serialize)]
pub struct CourseBuilderView {
    pub course: course::Model,
    pub categories: Vec<CategoryRef>,
    pub modules: Vec<BuilderModule>,
}

/// Load a non-deleted course the actor may edit (its author, or an admin)
pub async fn owned_course<C: ConnectionTrait>(db: &C, actor: &user::Model, course_id: i32) -> AppResult<course::Model> {
    let course = Course::find_by_id(course_id)
        .filter(course::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Course"))?;
    if course.author_id != actor.id && !is_admin(actor) {
        return Err(AppError::Forbidden("You can only edit your own courses".into()));
    }
    Ok(course)
}

async fn owned_module<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    module_id: i32,
) -> AppResult<(course::Model, course_module::Model)> {
    let module = CourseModule::find_by_id(module_id)
        .filter(course_module::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Module"))?;
    let course = owned_course(db, actor, module.course_id).await?;
    Ok((course, module))
}

async fn owned_lesson<C: ConnectionTrait>(db: &C, actor: &user::Model, lesson_id: i32) -> AppResult<lesson::Model> {
    let lesson = Lesson::find_by_id(lesson_id)
        .filter(lesson::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Lesson"))?;
    owned_course(db, actor, lesson.course_id).await?;
    Ok(lesson)
}

async fn unique_slug<C: ConnectionTrait>(db: &C, title: &str, except: Option<i32>) -> AppResult<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(AppError::validation("Title must contain letters or digits"));
    }
    let mut query = Course::find().filter(course::Column::Slug.eq(slug.as_str()));
    if let Some(id) = except {
        query = query.filter(course::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(AppError::Conflict("Course with this title already exists".into()));
    }
    Ok(slug)
}

async fn set_categories<C: ConnectionTrait>(db: &C, course_id: i32, ids: &[i32]) -> AppResult<()> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let found = Category::find()
        .filter(crate::models::category::Column::Id.is_in(ids.clone()))
        .count(db)
        .await?;
    if found as usize != ids.len() {
        return Err(AppError::validation("Unknown category id"));
    }

    course_category::Entity::delete_many()
        .filter(course_category::Column::CourseId.eq(course_id))
        .exec(db)
        .await?;
    for category_id in ids {
        course_category::ActiveModel {
            course_id: Set(course_id),
            category_id: Set(category_id),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::validation("Price cannot be negative"));
    }
    Ok(())
}

pub async fn create_course(db: &DatabaseConnection, author: &user::Model, input: NewCourse) -> AppResult<course::Model> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    validate_price(input.price)?;
    let author_id = author.id;

    let created = db
        .transaction::<_, course::Model, AppError>(|txn| {
            Box::pin(async move {
                let slug = unique_slug(txn, &title, None).await?;
                let now = time::now();
                let created = course::ActiveModel {
                    title: Set(title),
                    slug: Set(slug),
                    description: Set(input.description),
                    short_description: Set(input.short_description),
                    author_id: Set(author_id),
                    thumbnail: Set(input.thumbnail),
                    trailer_url: Set(input.trailer_url),
                    price: Set(input.price),
                    status: Set(CourseStatus::Draft.as_str().to_string()),
                    level: Set(input.level.unwrap_or(CourseLevel::Beginner).as_str().to_string()),
                    language: Set(input.language.unwrap_or_else(|| "uz".to_string())),
                    requirements: Set(input.requirements),
                    what_you_will_learn: Set(input.what_you_will_learn),
                    enrollment_count: Set(0),
                    average_rating: Set(0.0),
                    review_count: Set(0),
                    total_duration_minutes: Set(0),
                    published_at: Set(None),
                    is_deleted: Set(false),
                    deleted_at: Set(None),
                    created_at: Set(now.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                set_categories(txn, created.id, &input.category_ids).await?;
                Ok(created)
            })
        })
        .await?;

    tracing::info!(course_id = created.id, author_id, "course created");
    Ok(created)
}

/// Edits keep the current status, including PENDING and PUBLISHED.
pub async fn update_course(
    db: &DatabaseConnection,
    actor: &user::Model,
    course_id: i32,
    input: CourseUpdate,
) -> AppResult<course::Model> {
    let actor = actor.clone();
    db.transaction::<_, course::Model, AppError>(|txn| {
        Box::pin(async move {
            let existing = owned_course(txn, &actor, course_id).await?;
            let mut active: course::ActiveModel = existing.clone().into();

            if let Some(title) = input.title {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(AppError::validation("Title is required"));
                }
                if title != existing.title {
                    active.slug = Set(unique_slug(txn, &title, Some(course_id)).await?);
                }
                active.title = Set(title);
            }
            if let Some(price) = input.price {
                validate_price(price)?;
                active.price = Set(price);
            }
            if let Some(v) = input.description {
                active.description = Set(v);
            }
            if let Some(v) = input.short_description {
                active.short_description = Set(v);
            }
            if let Some(v) = input.level {
                active.level = Set(v.as_str().to_string());
            }
            if let Some(v) = input.language {
                active.language = Set(v);
            }
            if let Some(v) = input.requirements {
                active.requirements = Set(v);
            }
            if let Some(v) = input.what_you_will_learn {
                active.what_you_will_learn = Set(v);
            }
            if let Some(v) = input.trailer_url {
                active.trailer_url = Set(v);
            }
            if let Some(v) = input.thumbnail {
                active.thumbnail = Set(Some(v).filter(|t| !t.is_empty()));
            }
            if let Some(ids) = input.category_ids {
                set_categories(txn, course_id, &ids).await?;
            }

            active.updated_at = Set(time::now());
            Ok(active.update(txn).await?)
        })
    })
    .await
    .map_err(AppError::from)
}

/// The author's own non-deleted courses, newest first
pub async fn my_courses(db: &DatabaseConnection, author: &user::Model) -> AppResult<Vec<course::Model>> {
    Ok(Course::find()
        .filter(course::Column::AuthorId.eq(author.id))
        .filter(course::Column::IsDeleted.eq(false))
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .all(db)
        .await?)
}

pub async fn builder_view(db: &DatabaseConnection, actor: &user::Model, course_id: i32) -> AppResult<CourseBuilderView> {
    let course = owned_course(db, actor, course_id).await?;
    let modules = catalog_service::course_outline(db, course.id)
        .await?
        .into_iter()
        .map(|(module, lessons)| BuilderModule { module, lessons })
        .collect();
    let categories = catalog_service::categories_of(db, course.id).await?;
    Ok(CourseBuilderView {
        course,
        categories,
        modules,
    })
}

pub async fn add_module(
    db: &DatabaseConnection,
    actor: &user::Model,
    course_id: i32,
    input: ModuleInput,
) -> AppResult<course_module::Model> {
    let course = owned_course(db, actor, course_id).await?;
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("Module title is required"));
    }

    let last: Option<Option<i32>> = CourseModule::find()
        .filter(course_module::Column::CourseId.eq(course.id))
        .filter(course_module::Column::IsDeleted.eq(false))
        .select_only()
        .column_as(course_module::Column::SortOrder.max(), "max_order")
        .into_tuple()
        .one(db)
        .await?;
    let order = last.flatten().unwrap_or(0) + 1;

    let now = time::now();
    Ok(course_module::ActiveModel {
        course_id: Set(course.id),
        title: Set(title),
        description: Set(input.description),
        sort_order: Set(order),
        is_deleted: Set(false),
        deleted_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn edit_module(
    db: &DatabaseConnection,
    actor: &user::Model,
    module_id: i32,
    input: ModuleInput,
) -> AppResult<course_module::Model> {
    let (_, module) = owned_module(db, actor, module_id).await?;
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("Module title is required"));
    }
    let mut active: course_module::ActiveModel = module.into();
    active.title = Set(title);
    active.description = Set(input.description);
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

/// Soft delete; the module's lessons drop out of the course duration.
pub async fn delete_module(db: &DatabaseConnection, actor: &user::Model, module_id: i32) -> AppResult<()> {
    let (course, module) = owned_module(db, actor, module_id).await?;
    let now = time::now();
    let mut active: course_module::ActiveModel = module.into();
    active.is_deleted = Set(true);
    active.deleted_at = Set(Some(now.clone()));
    active.updated_at = Set(now);
    active.update(db).await?;
    recompute_duration(db, course.id).await
}

fn validate_duration(minutes: i32) -> AppResult<()> {
    if minutes < 1 {
        return Err(AppError::validation("Duration must be at least 1 minute"));
    }
    Ok(())
}

pub async fn add_lesson(
    db: &DatabaseConnection,
    actor: &user::Model,
    module_id: i32,
    input: LessonInput,
) -> AppResult<lesson::Model> {
    let (course, module) = owned_module(db, actor, module_id).await?;
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("Lesson title is required"));
    }
    validate_duration(input.duration_minutes)?;

    let last: Option<Option<i32>> = Lesson::find()
        .filter(lesson::Column::ModuleId.eq(module.id))
        .filter(lesson::Column::IsDeleted.eq(false))
        .select_only()
        .column_as(lesson::Column::SortOrder.max(), "max_order")
        .into_tuple()
        .one(db)
        .await?;
    let order = last.flatten().unwrap_or(0) + 1;

    let now = time::now();
    let created = lesson::ActiveModel {
        module_id: Set(module.id),
        course_id: Set(course.id),
        title: Set(title),
        description: Set(input.description),
        video_url: Set(input.video_url),
        duration_minutes: Set(input.duration_minutes),
        text_content: Set(input.text_content),
        is_preview: Set(input.is_preview),
        sort_order: Set(order),
        is_deleted: Set(false),
        deleted_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    recompute_duration(db, course.id).await?;
    Ok(created)
}

pub async fn edit_lesson(
    db: &DatabaseConnection,
    actor: &user::Model,
    lesson_id: i32,
    input: LessonUpdate,
) -> AppResult<lesson::Model> {
    let existing = owned_lesson(db, actor, lesson_id).await?;
    let course_id = existing.course_id;
    let mut active: lesson::ActiveModel = existing.into();

    if let Some(title) = input.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("Lesson title is required"));
        }
        active.title = Set(title);
    }
    if let Some(minutes) = input.duration_minutes {
        validate_duration(minutes)?;
        active.duration_minutes = Set(minutes);
    }
    if let Some(v) = input.description {
        active.description = Set(v);
    }
    if let Some(v) = input.video_url {
        active.video_url = Set(v);
    }
    if let Some(v) = input.text_content {
        active.text_content = Set(v);
    }
    if let Some(v) = input.is_preview {
        active.is_preview = Set(v);
    }
    active.updated_at = Set(time::now());
    let updated = active.update(db).await?;

    recompute_duration(db, course_id).await?;
    Ok(updated)
}

pub async fn delete_lesson(db: &DatabaseConnection, actor: &user::Model, lesson_id: i32) -> AppResult<()> {
    let existing = owned_lesson(db, actor, lesson_id).await?;
    let course_id = existing.course_id;
    let now = time::now();
    let mut active: lesson::ActiveModel = existing.into();
    active.is_deleted = Set(true);
    active.deleted_at = Set(Some(now.clone()));
    active.updated_at = Set(now);
    active.update(db).await?;
    recompute_duration(db, course_id).await
}

/// Sum of lesson durations over live modules and lessons
pub async fn recompute_duration<C: ConnectionTrait>(db: &C, course_id: i32) -> AppResult<()> {
    let total: i32 = catalog_service::course_outline(db, course_id)
        .await?
        .iter()
        .flat_map(|(_, lessons)| lessons.iter())
        .map(|l| l.duration_minutes)
        .sum();

    Course::update_many()
        .col_expr(course::Column::TotalDurationMinutes, sea_query::Expr::value(total))
        .col_expr(course::Column::UpdatedAt, sea_query::Expr::value(time::now()))
        .filter(course::Column::Id.eq(course_id))
        .exec(db)
        .await?;
    Ok(())
}

/// DRAFT/REJECTED -> PENDING, opening a moderation record
pub async fn submit_for_review(db: &DatabaseConnection, actor: &user::Model, course_id: i32) -> AppResult<course::Model> {
    let course = owned_course(db, actor, course_id).await?;

    let status: CourseStatus = course.status.parse()?;
    if !matches!(status, CourseStatus::Draft | CourseStatus::Rejected) {
        return Err(AppError::invalid_state(format!(
            "Only draft or rejected courses can be submitted (current: {status})"
        )));
    }

    let outline = catalog_service::course_outline(db, course.id).await?;
    if outline.is_empty() {
        return Err(AppError::validation("Add at least one module before submitting"));
    }
    if outline.iter().all(|(_, lessons)| lessons.is_empty()) {
        return Err(AppError::validation("Add at least one lesson before submitting"));
    }

    let updated = db
        .transaction::<_, course::Model, AppError>(|txn| {
            Box::pin(async move {
                let now = time::now();
                let mut active: course::ActiveModel = course.into();
                active.status = Set(CourseStatus::Pending.as_str().to_string());
                active.updated_at = Set(now.clone());
                let updated = active.update(txn).await?;

                course_moderation::ActiveModel {
                    course_id: Set(updated.id),
                    status: Set(ModerationStatus::Pending.as_str().to_string()),
                    reviewer_id: Set(None),
                    review_notes: Set(String::new()),
                    rejection_reason: Set(String::new()),
                    changes_requested: Set(String::new()),
                    reviewed_at: Set(None),
                    quality_score: Set(None),
                    content_complete: Set(false),
                    video_quality_ok: Set(false),
                    description_adequate: Set(false),
                    pricing_appropriate: Set(false),
                    created_at: Set(now.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(updated)
            })
        })
        .await?;

    tracing::info!(course_id = updated.id, "course submitted for review");
    Ok(updated)
}
