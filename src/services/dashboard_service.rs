//! Author and admin overview pages

use sea_orm::*;
use serde::Serialize;

use crate::domain::{AppResult, CourseStatus, TransactionStatus, TransactionType};
use crate::models::course::{self, Entity as Course};
use crate::models::course_enrollment::{self, Entity as Enrollment};
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::user::{self, Entity as User};
use crate::services::author_service;

#[derive(Debug, Serialize)]
pub struct RecentSale {
    pub enrollment_id: i32,
    pub course_id: i32,
    pub course_title: String,
    pub student_name: String,
    pub price_paid: i64,
    pub enrolled_at: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorDashboard {
    pub available_balance: i64,
    pub pending_balance: i64,
    pub lifetime_earnings: i64,
    pub total_students: i32,
    pub active_courses: u64,
    pub average_rating: f64,
    pub recent_courses: Vec<course::Model>,
    pub recent_sales: Vec<RecentSale>,
}

pub async fn author_dashboard(db: &DatabaseConnection, author: &user::Model) -> AppResult<AuthorDashboard> {
    let (profile, balance) = author_service::ensure_records(db, author.id).await?;

    let own_courses = Course::find()
        .filter(course::Column::AuthorId.eq(author.id))
        .filter(course::Column::IsDeleted.eq(false));

    let active_courses = own_courses
        .clone()
        .filter(course::Column::Status.eq(CourseStatus::Published.as_str()))
        .count(db)
        .await?;
    let recent_courses = own_courses
        .clone()
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .limit(6)
        .all(db)
        .await?;

    let course_ids: Vec<i32> = Course::find()
        .filter(course::Column::AuthorId.eq(author.id))
        .select_only()
        .column(course::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let sales = Enrollment::find()
        .filter(course_enrollment::Column::CourseId.is_in(course_ids))
        .filter(course_enrollment::Column::PricePaid.gt(0))
        .order_by_desc(course_enrollment::Column::CreatedAt)
        .order_by_desc(course_enrollment::Column::Id)
        .limit(10)
        .find_also_related(Course)
        .all(db)
        .await?;

    let mut recent_sales = Vec::with_capacity(sales.len());
    for (enrollment, course) in sales {
        let student_name = User::find_by_id(enrollment.student_id)
            .one(db)
            .await?
            .map(|s| s.full_name())
            .unwrap_or_default();
        recent_sales.push(RecentSale {
            enrollment_id: enrollment.id,
            course_id: enrollment.course_id,
            course_title: course.map(|c| c.title).unwrap_or_default(),
            student_name,
            price_paid: enrollment.price_paid,
            enrolled_at: enrollment.created_at,
        });
    }

    Ok(AuthorDashboard {
        available_balance: balance.available_balance,
        pending_balance: balance.pending_balance,
        lifetime_earnings: balance.lifetime_earnings,
        total_students: profile.total_students,
        active_courses,
        average_rating: profile.average_rating,
        recent_courses,
        recent_sales,
    })
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub total_users: u64,
    pub total_courses: u64,
    pub pending_moderation: u64,
    pub total_revenue: i64,
    pub pending_courses: Vec<course::Model>,
    pub recent_transactions: Vec<transaction::Model>,
}

pub async fn admin_dashboard(db: &DatabaseConnection) -> AppResult<AdminDashboard> {
    let total_users = User::find().count(db).await?;
    let live_courses = Course::find().filter(course::Column::IsDeleted.eq(false));
    let total_courses = live_courses.clone().count(db).await?;

    let pending = live_courses
        .filter(course::Column::Status.eq(CourseStatus::Pending.as_str()))
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id);
    let pending_moderation = pending.clone().count(db).await?;
    let pending_courses = pending.limit(6).all(db).await?;

    let revenue: Option<Option<i64>> = Transaction::find()
        .filter(transaction::Column::TransactionType.eq(TransactionType::CoursePurchase.as_str()))
        .filter(transaction::Column::Status.eq(TransactionStatus::Success.as_str()))
        .select_only()
        .column_as(transaction::Column::Amount.sum(), "revenue")
        .into_tuple()
        .one(db)
        .await?;

    let recent_transactions = Transaction::find()
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .limit(10)
        .all(db)
        .await?;

    Ok(AdminDashboard {
        total_users,
        total_courses,
        pending_moderation,
        total_revenue: revenue.flatten().unwrap_or(0),
        pending_courses,
        recent_transactions,
    })
}
