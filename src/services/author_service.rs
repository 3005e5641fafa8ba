//! Author profiles and earnings

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult, CourseStatus, Role};
use crate::models::author_balance::{self, Entity as AuthorBalance};
use crate::models::author_profile::{self, Entity as AuthorProfile};
use crate::models::course::{self, Entity as Course};
use crate::models::course_enrollment::{self, Entity as Enrollment};
use crate::models::user::{self, Entity as User};
use crate::utils::time;

#[derive(Debug, Default, Deserialize)]
pub struct AuthorProfileUpdate {
    pub bio: Option<String>,
    pub expertise: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub telegram_username: Option<String>,
    pub youtube_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorProfileView {
    #[serde(flatten)]
    pub profile: author_profile::Model,
    pub name: String,
    pub balance: Option<author_balance::Model>,
}

/// Create the profile and balance rows if missing.
pub async fn ensure_records<C: ConnectionTrait>(
    db: &C,
    author_id: i32,
) -> AppResult<(author_profile::Model, author_balance::Model)> {
    let now = time::now();

    let profile = match AuthorProfile::find()
        .filter(author_profile::Column::UserId.eq(author_id))
        .one(db)
        .await?
    {
        Some(p) => p,
        None => {
            author_profile::ActiveModel {
                user_id: Set(author_id),
                bio: Set(String::new()),
                expertise: Set(String::new()),
                website: Set(String::new()),
                linkedin_url: Set(String::new()),
                telegram_username: Set(String::new()),
                youtube_url: Set(String::new()),
                is_verified: Set(false),
                verified_at: Set(None),
                total_students: Set(0),
                total_courses: Set(0),
                average_rating: Set(0.0),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    let balance = match AuthorBalance::find()
        .filter(author_balance::Column::AuthorId.eq(author_id))
        .one(db)
        .await?
    {
        Some(b) => b,
        None => {
            author_balance::ActiveModel {
                author_id: Set(author_id),
                available_balance: Set(0),
                pending_balance: Set(0),
                lifetime_earnings: Set(0),
                total_withdrawn: Set(0),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    Ok((profile, balance))
}

pub async fn balance_for<C: ConnectionTrait>(db: &C, author_id: i32) -> AppResult<author_balance::Model> {
    let (_, balance) = ensure_records(db, author_id).await?;
    Ok(balance)
}

pub async fn get_profile(db: &DatabaseConnection, author_id: i32) -> AppResult<AuthorProfileView> {
    let author = User::find_by_id(author_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Author"))?;
    let profile = AuthorProfile::find()
        .filter(author_profile::Column::UserId.eq(author_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Author profile"))?;
    let balance = AuthorBalance::find()
        .filter(author_balance::Column::AuthorId.eq(author_id))
        .one(db)
        .await?;

    Ok(AuthorProfileView {
        profile,
        name: author.full_name(),
        balance,
    })
}

pub async fn update_profile(
    db: &DatabaseConnection,
    author: &user::Model,
    input: AuthorProfileUpdate,
) -> AppResult<author_profile::Model> {
    let (profile, _) = ensure_records(db, author.id).await?;
    let mut active: author_profile::ActiveModel = profile.into();

    if let Some(v) = input.bio {
        active.bio = Set(v);
    }
    if let Some(v) = input.expertise {
        active.expertise = Set(v);
    }
    if let Some(v) = input.website {
        active.website = Set(v.trim().to_string());
    }
    if let Some(v) = input.linkedin_url {
        active.linkedin_url = Set(v.trim().to_string());
    }
    if let Some(v) = input.telegram_username {
        active.telegram_username = Set(v.trim().trim_start_matches('@').to_string());
    }
    if let Some(v) = input.youtube_url {
        active.youtube_url = Set(v.trim().to_string());
    }
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

/// Admin toggle of the verified badge
pub async fn set_verified(
    db: &DatabaseConnection,
    author_id: i32,
    verified: bool,
) -> AppResult<author_profile::Model> {
    let author = User::find_by_id(author_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Author"))?;
    if author.role != Role::Author.as_str() {
        return Err(AppError::validation("User is not an author"));
    }

    let (profile, _) = ensure_records(db, author_id).await?;
    let mut active: author_profile::ActiveModel = profile.into();
    active.is_verified = Set(verified);
    active.verified_at = Set(verified.then(time::now));
    active.updated_at = Set(time::now());
    let profile = active.update(db).await?;

    tracing::info!(author_id, verified, "author verification changed");
    Ok(profile)
}

/// Add a sale's author share to the available balance.
pub async fn credit_sale<C: ConnectionTrait>(db: &C, author_id: i32, amount: i64) -> AppResult<author_balance::Model> {
    let balance = balance_for(db, author_id).await?;
    let mut active: author_balance::ActiveModel = balance.clone().into();
    active.available_balance = Set(balance.available_balance + amount);
    active.lifetime_earnings = Set(balance.lifetime_earnings + amount);
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

/// Take back a refunded share. The available balance never goes negative.
pub async fn debit_refund<C: ConnectionTrait>(db: &C, author_id: i32, amount: i64) -> AppResult<author_balance::Model> {
    let balance = balance_for(db, author_id).await?;
    let mut active: author_balance::ActiveModel = balance.clone().into();
    active.available_balance = Set((balance.available_balance - amount).max(0));
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

/// Bump `total_students` when this is the student's first enrollment with
/// the author. Call after the enrollment row exists.
pub async fn note_enrollment<C: ConnectionTrait>(db: &C, author_id: i32, student_id: i32) -> AppResult<()> {
    let author_course_ids: Vec<i32> = Course::find()
        .filter(course::Column::AuthorId.eq(author_id))
        .select_only()
        .column(course::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let enrollments = Enrollment::find()
        .filter(course_enrollment::Column::StudentId.eq(student_id))
        .filter(course_enrollment::Column::CourseId.is_in(author_course_ids))
        .count(db)
        .await?;

    if enrollments == 1 {
        let (profile, _) = ensure_records(db, author_id).await?;
        let mut active: author_profile::ActiveModel = profile.clone().into();
        active.total_students = Set(profile.total_students + 1);
        active.updated_at = Set(time::now());
        active.update(db).await?;
    }
    Ok(())
}

/// Count of the author's published courses
pub async fn recompute_total_courses<C: ConnectionTrait>(db: &C, author_id: i32) -> AppResult<()> {
    let published = Course::find()
        .filter(course::Column::AuthorId.eq(author_id))
        .filter(course::Column::Status.eq(CourseStatus::Published.as_str()))
        .filter(course::Column::IsDeleted.eq(false))
        .count(db)
        .await?;

    let (profile, _) = ensure_records(db, author_id).await?;
    let mut active: author_profile::ActiveModel = profile.into();
    active.total_courses = Set(published as i32);
    active.updated_at = Set(time::now());
    active.update(db).await?;
    Ok(())
}

/// Mean of the author's courses that have at least one review
pub async fn recompute_rating<C: ConnectionTrait>(db: &C, author_id: i32) -> AppResult<()> {
    let ratings: Vec<f64> = Course::find()
        .filter(course::Column::AuthorId.eq(author_id))
        .filter(course::Column::IsDeleted.eq(false))
        .filter(course::Column::ReviewCount.gt(0))
        .select_only()
        .column(course::Column::AverageRating)
        .into_tuple()
        .all(db)
        .await?;

    let average = if ratings.is_empty() {
        0.0
    } else {
        round2(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    let (profile, _) = ensure_records(db, author_id).await?;
    let mut active: author_profile::ActiveModel = profile.into();
    active.average_rating = Set(average);
    active.updated_at = Set(time::now());
    active.update(db).await?;
    Ok(())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
