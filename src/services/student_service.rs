//! Student profile, dashboard and certificates

use sea_orm::*;
use serde::Serialize;

use crate::domain::{AppResult, CategoryNode, CategoryRepository, CourseStatus, CourseSummary};
use crate::infrastructure::repositories::course_repository::to_summary;
use crate::models::certificate::{self, Entity as Certificate};
use crate::models::course::{self, Entity as Course};
use crate::models::course_enrollment::{self, Entity as Enrollment};
use crate::models::student_profile::{self, Entity as StudentProfile};
use crate::models::user;
use crate::utils::time;

const IN_PROGRESS_LIMIT: usize = 3;
const RECOMMENDED_LIMIT: u64 = 8;
const CATEGORY_LIMIT: usize = 8;

#[derive(Debug, Serialize)]
pub struct StudentProfileView {
    pub bio: String,
    pub enrolled_courses_count: i32,
    pub completed_courses_count: i32,
    pub total_watch_time_hours: i64,
    pub certificates_earned: i32,
}

impl From<student_profile::Model> for StudentProfileView {
    fn from(p: student_profile::Model) -> Self {
        Self {
            total_watch_time_hours: p.total_watch_time_hours(),
            bio: p.bio,
            enrolled_courses_count: p.enrolled_courses_count,
            completed_courses_count: p.completed_courses_count,
            certificates_earned: p.certificates_earned,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InProgressCourse {
    pub course: CourseSummary,
    pub progress_percentage: f64,
    pub last_accessed: String,
}

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub enrolled_count: u64,
    pub completed_count: u64,
    pub total_hours: i64,
    pub certificates_count: u64,
    pub in_progress: Vec<InProgressCourse>,
    pub recommended: Vec<CourseSummary>,
    pub categories: Vec<CategoryNode>,
}

/// Counter deltas applied to a student profile
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileDelta {
    pub enrolled: i32,
    pub completed: i32,
    pub certificates: i32,
    pub watch_seconds: i64,
}

pub async fn ensure_profile<C: ConnectionTrait>(db: &C, user_id: i32) -> AppResult<student_profile::Model> {
    if let Some(p) = StudentProfile::find()
        .filter(student_profile::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(p);
    }

    let now = time::now();
    Ok(student_profile::ActiveModel {
        user_id: Set(user_id),
        bio: Set(String::new()),
        enrolled_courses_count: Set(0),
        completed_courses_count: Set(0),
        total_watch_seconds: Set(0),
        certificates_earned: Set(0),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn apply_delta<C: ConnectionTrait>(db: &C, user_id: i32, delta: ProfileDelta) -> AppResult<()> {
    let profile = ensure_profile(db, user_id).await?;
    let mut active: student_profile::ActiveModel = profile.clone().into();
    active.enrolled_courses_count = Set((profile.enrolled_courses_count + delta.enrolled).max(0));
    active.completed_courses_count = Set((profile.completed_courses_count + delta.completed).max(0));
    active.certificates_earned = Set((profile.certificates_earned + delta.certificates).max(0));
    active.total_watch_seconds = Set(profile.total_watch_seconds.saturating_add(delta.watch_seconds).max(0));
    active.updated_at = Set(time::now());
    active.update(db).await?;
    Ok(())
}

pub async fn get_profile(db: &DatabaseConnection, student: &user::Model) -> AppResult<StudentProfileView> {
    Ok(ensure_profile(db, student.id).await?.into())
}

pub async fn update_bio(db: &DatabaseConnection, student: &user::Model, bio: String) -> AppResult<StudentProfileView> {
    let profile = ensure_profile(db, student.id).await?;
    let mut active: student_profile::ActiveModel = profile.into();
    active.bio = Set(bio);
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?.into())
}

pub async fn dashboard(
    db: &DatabaseConnection,
    categories: &dyn CategoryRepository,
    student: &user::Model,
) -> AppResult<StudentDashboard> {
    let enrollments = Enrollment::find()
        .filter(course_enrollment::Column::StudentId.eq(student.id))
        .order_by_desc(course_enrollment::Column::LastAccessed)
        .find_also_related(Course)
        .all(db)
        .await?;

    let enrolled_count = enrollments.len() as u64;
    let completed_count = enrollments.iter().filter(|(e, _)| e.completed).count() as u64;
    let total_minutes: i64 = enrollments
        .iter()
        .filter_map(|(_, c)| c.as_ref())
        .map(|c| c.total_duration_minutes as i64)
        .sum();
    let enrolled_ids: Vec<i32> = enrollments.iter().map(|(e, _)| e.course_id).collect();

    let mut in_progress = Vec::new();
    for (enrollment, course) in enrollments {
        if in_progress.len() == IN_PROGRESS_LIMIT {
            break;
        }
        let Some(course) = course else { continue };
        if course.is_deleted || enrollment.progress_percentage >= 100.0 {
            continue;
        }
        let author = course.find_related(user::Entity).one(db).await?;
        in_progress.push(InProgressCourse {
            course: to_summary(course, author),
            progress_percentage: enrollment.progress_percentage,
            last_accessed: enrollment.last_accessed,
        });
    }

    let recommended = Course::find()
        .filter(course::Column::Status.eq(CourseStatus::Published.as_str()))
        .filter(course::Column::IsDeleted.eq(false))
        .filter(course::Column::Id.is_not_in(enrolled_ids))
        .order_by_desc(course::Column::AverageRating)
        .order_by_desc(course::Column::EnrollmentCount)
        .limit(RECOMMENDED_LIMIT)
        .find_also_related(user::Entity)
        .all(db)
        .await?
        .into_iter()
        .map(|(c, a)| to_summary(c, a))
        .collect();

    let certificates_count = Certificate::find()
        .filter(certificate::Column::StudentId.eq(student.id))
        .count(db)
        .await?;

    let mut categories = categories.find_tree().await?;
    categories.truncate(CATEGORY_LIMIT);

    Ok(StudentDashboard {
        enrolled_count,
        completed_count,
        total_hours: total_minutes / 60,
        certificates_count,
        in_progress,
        recommended,
        categories,
    })
}

#[derive(Debug, Serialize)]
pub struct CertificateView {
    #[serde(flatten)]
    pub certificate: certificate::Model,
    pub course_title: String,
    pub course_slug: String,
}

pub async fn list_certificates(db: &DatabaseConnection, student: &user::Model) -> AppResult<Vec<CertificateView>> {
    let rows = Certificate::find()
        .filter(certificate::Column::StudentId.eq(student.id))
        .order_by_desc(certificate::Column::IssuedAt)
        .find_also_related(Course)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(certificate, course)| {
            let (course_title, course_slug) = course
                .map(|c| (c.title, c.slug))
                .unwrap_or_default();
            CertificateView {
                certificate,
                course_title,
                course_slug,
            }
        })
        .collect())
}
