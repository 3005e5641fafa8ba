//! Public catalog: categories, course listing and course pages

use std::collections::BTreeMap;

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult, CourseStatus, CourseSummary};
use crate::infrastructure::repositories::course_repository::to_summary;
use crate::models::category::{self, Entity as Category};
use crate::models::course::{self, Entity as Course};
use crate::models::course_category::{self, Entity as CourseCategory};
use crate::models::course_enrollment::{self, Entity as Enrollment};
use crate::models::course_module::{self, Entity as CourseModule};
use crate::models::course_review::{self, Entity as CourseReview};
use crate::models::lesson::{self, Entity as Lesson};
use crate::models::user;
use crate::utils::{text::slugify, time};

const DETAIL_REVIEW_LIMIT: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub parent_id: Option<i32>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub order: i32,
}

pub async fn create_category(db: &DatabaseConnection, input: NewCategory) -> AppResult<category::Model> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("Category name is required"));
    }
    let slug = match input.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => slugify(s),
        _ => slugify(&name),
    };
    if slug.is_empty() {
        return Err(AppError::validation("Could not derive a slug from the name"));
    }
    if Category::find()
        .filter(category::Column::Slug.eq(slug.as_str()))
        .count(db)
        .await?
        > 0
    {
        return Err(AppError::Conflict(format!(
            "Category with slug '{slug}' already exists"
        )));
    }
    if let Some(parent) = input.parent_id
        && Category::find_by_id(parent).one(db).await?.is_none()
    {
        return Err(AppError::validation("Parent category does not exist"));
    }

    let now = time::now();
    let created = category::ActiveModel {
        name: Set(name),
        slug: Set(slug),
        description: Set(input.description),
        parent_id: Set(input.parent_id),
        icon: Set(input.icon),
        sort_order: Set(input.order),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(category_id = created.id, "category created");
    Ok(created)
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct LessonOutline {
    pub id: i32,
    pub title: String,
    pub duration_minutes: i32,
    pub is_preview: bool,
    pub order: i32,
}

#[derive(Debug, Serialize)]
pub struct ModuleOutline {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub order: i32,
    pub lessons: Vec<LessonOutline>,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub id: i32,
    pub student_name: String,
    pub rating: i32,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub helpful_count: i32,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub summary: CourseSummary,
    pub description: String,
    pub trailer_url: String,
    pub requirements: String,
    pub what_you_will_learn: String,
    pub categories: Vec<CategoryRef>,
    pub modules: Vec<ModuleOutline>,
    pub total_lessons: usize,
    pub total_duration: i32,
    pub reviews: Vec<ReviewView>,
    pub rating_distribution: BTreeMap<u8, u64>,
    pub enrollment: Option<course_enrollment::Model>,
}

/// Non-deleted modules in order, each with its non-deleted lessons in order
pub async fn course_outline<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
) -> AppResult<Vec<(course_module::Model, Vec<lesson::Model>)>> {
    let modules = CourseModule::find()
        .filter(course_module::Column::CourseId.eq(course_id))
        .filter(course_module::Column::IsDeleted.eq(false))
        .order_by_asc(course_module::Column::SortOrder)
        .order_by_asc(course_module::Column::Id)
        .all(db)
        .await?;

    let module_ids: Vec<i32> = modules.iter().map(|m| m.id).collect();
    let lessons = Lesson::find()
        .filter(lesson::Column::ModuleId.is_in(module_ids))
        .filter(lesson::Column::IsDeleted.eq(false))
        .order_by_asc(lesson::Column::SortOrder)
        .order_by_asc(lesson::Column::Id)
        .all(db)
        .await?;

    Ok(modules
        .into_iter()
        .map(|m| {
            let own: Vec<lesson::Model> = lessons.iter().filter(|l| l.module_id == m.id).cloned().collect();
            (m, own)
        })
        .collect())
}

pub async fn published_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> AppResult<course::Model> {
    Course::find()
        .filter(course::Column::Slug.eq(slug))
        .filter(course::Column::Status.eq(CourseStatus::Published.as_str()))
        .filter(course::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Course"))
}

pub async fn categories_of<C: ConnectionTrait>(db: &C, course_id: i32) -> AppResult<Vec<CategoryRef>> {
    let rows = CourseCategory::find()
        .filter(course_category::Column::CourseId.eq(course_id))
        .find_also_related(Category)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(_, c)| c)
        .map(|c| CategoryRef {
            id: c.id,
            name: c.name,
            slug: c.slug,
        })
        .collect())
}

pub async fn reviews_for(db: &DatabaseConnection, course_id: i32, limit: Option<u64>) -> AppResult<Vec<ReviewView>> {
    let mut query = CourseReview::find()
        .filter(course_review::Column::CourseId.eq(course_id))
        .order_by_desc(course_review::Column::CreatedAt)
        .order_by_desc(course_review::Column::Id);
    if let Some(n) = limit {
        query = query.limit(n);
    }
    let rows = query.find_also_related(user::Entity).all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(r, student)| ReviewView {
            id: r.id,
            student_name: student.map(|s| s.full_name()).unwrap_or_default(),
            rating: r.rating,
            comment: r.comment,
            is_verified_purchase: r.is_verified_purchase,
            helpful_count: r.helpful_count,
            created_at: r.created_at,
        })
        .collect())
}

pub async fn course_detail(
    db: &DatabaseConnection,
    slug: &str,
    viewer: Option<&user::Model>,
) -> AppResult<CourseDetail> {
    let course = published_by_slug(db, slug).await?;
    let author = course.find_related(user::Entity).one(db).await?;

    let outline = course_outline(db, course.id).await?;
    let total_lessons = outline.iter().map(|(_, l)| l.len()).sum();
    let total_duration = outline
        .iter()
        .flat_map(|(_, l)| l.iter())
        .map(|l| l.duration_minutes)
        .sum();
    let modules = outline
        .into_iter()
        .map(|(m, lessons)| ModuleOutline {
            id: m.id,
            title: m.title,
            description: m.description,
            order: m.sort_order,
            lessons: lessons
                .into_iter()
                .map(|l| LessonOutline {
                    id: l.id,
                    title: l.title,
                    duration_minutes: l.duration_minutes,
                    is_preview: l.is_preview,
                    order: l.sort_order,
                })
                .collect(),
        })
        .collect();

    let mut rating_distribution = BTreeMap::new();
    for stars in 1..=5u8 {
        let n = CourseReview::find()
            .filter(course_review::Column::CourseId.eq(course.id))
            .filter(course_review::Column::Rating.eq(stars as i32))
            .count(db)
            .await?;
        rating_distribution.insert(stars, n);
    }

    let enrollment = match viewer {
        Some(v) => {
            Enrollment::find()
                .filter(course_enrollment::Column::CourseId.eq(course.id))
                .filter(course_enrollment::Column::StudentId.eq(v.id))
                .one(db)
                .await?
        }
        None => None,
    };

    let reviews = reviews_for(db, course.id, Some(DETAIL_REVIEW_LIMIT)).await?;
    let categories = categories_of(db, course.id).await?;

    Ok(CourseDetail {
        description: course.description.clone(),
        trailer_url: course.trailer_url.clone(),
        requirements: course.requirements.clone(),
        what_you_will_learn: course.what_you_will_learn.clone(),
        summary: to_summary(course, author),
        categories,
        modules,
        total_lessons,
        total_duration,
        reviews,
        rating_distribution,
        enrollment,
    })
}
