//! Course reviews and rating aggregates

use sea_orm::*;
use serde::Deserialize;

use crate::domain::{AppError, AppResult};
use crate::models::course::{self, Entity as Course};
use crate::models::course_review::{self, Entity as CourseReview};
use crate::models::user;
use crate::services::author_service::{self, round2};
use crate::services::catalog_service::{self, ReviewView};
use crate::services::enrollment_service;
use crate::utils::time;

#[derive(Debug, Deserialize)]
pub struct NewReview {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

pub async fn create_review(
    db: &DatabaseConnection,
    student: &user::Model,
    slug: &str,
    input: NewReview,
) -> AppResult<course_review::Model> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::validation("Rating must be between 1 and 5"));
    }
    let course = catalog_service::published_by_slug(db, slug).await?;
    let student_id = student.id;

    db.transaction::<_, course_review::Model, AppError>(|txn| {
        Box::pin(async move {
            let duplicate = CourseReview::find()
                .filter(course_review::Column::CourseId.eq(course.id))
                .filter(course_review::Column::StudentId.eq(student_id))
                .count(txn)
                .await?
                > 0;
            if duplicate {
                return Err(AppError::Conflict("You have already reviewed this course".into()));
            }

            let verified = enrollment_service::find_enrollment(txn, course.id, student_id)
                .await?
                .is_some();
            let now = time::now();
            let review = course_review::ActiveModel {
                course_id: Set(course.id),
                student_id: Set(student_id),
                rating: Set(input.rating),
                comment: Set(input.comment.trim().to_string()),
                is_verified_purchase: Set(verified),
                helpful_count: Set(0),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            refresh_course_rating(txn, course.id).await?;
            author_service::recompute_rating(txn, course.author_id).await?;
            Ok(review)
        })
    })
    .await
    .map_err(AppError::from)
}

/// Recompute `average_rating` (2 decimals) and `review_count`
pub async fn refresh_course_rating<C: ConnectionTrait>(db: &C, course_id: i32) -> AppResult<()> {
    let ratings: Vec<i32> = CourseReview::find()
        .filter(course_review::Column::CourseId.eq(course_id))
        .select_only()
        .column(course_review::Column::Rating)
        .into_tuple()
        .all(db)
        .await?;

    let count = ratings.len() as i32;
    let average = if ratings.is_empty() {
        0.0
    } else {
        round2(ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64)
    };

    Course::update_many()
        .col_expr(course::Column::AverageRating, sea_query::Expr::value(average))
        .col_expr(course::Column::ReviewCount, sea_query::Expr::value(count))
        .filter(course::Column::Id.eq(course_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn list_reviews(db: &DatabaseConnection, slug: &str) -> AppResult<Vec<ReviewView>> {
    let course = catalog_service::published_by_slug(db, slug).await?;
    catalog_service::reviews_for(db, course.id, None).await
}
