//! Enrollment, lesson access, progress tracking and certificates

use std::collections::HashMap;

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult};
use crate::models::certificate::{self, Entity as Certificate};
use crate::models::course::{self, Entity as Course};
use crate::models::course_enrollment::{self, Entity as Enrollment};
use crate::models::lesson::{self, Entity as Lesson};
use crate::models::lesson_progress::{self, Entity as LessonProgress};
use crate::models::user;
use crate::models::watch_history;
use crate::services::student_service::{self, ProfileDelta};
use crate::services::{author_service, catalog_service};
use crate::utils::time;

#[derive(Debug, Serialize)]
pub struct EnrollOutcome {
    pub enrollment: course_enrollment::Model,
    pub created: bool,
}

pub async fn find_enrollment<C: ConnectionTrait>(
    db: &C,
    course_id: i32,
    student_id: i32,
) -> AppResult<Option<course_enrollment::Model>> {
    Ok(Enrollment::find()
        .filter(course_enrollment::Column::CourseId.eq(course_id))
        .filter(course_enrollment::Column::StudentId.eq(student_id))
        .one(db)
        .await?)
}

/// Get-or-create an enrollment. A new row bumps the course, student and
/// author counters.
pub async fn create_enrollment<C: ConnectionTrait>(
    db: &C,
    course: &course::Model,
    student_id: i32,
    price_paid: i64,
) -> AppResult<EnrollOutcome> {
    if let Some(enrollment) = find_enrollment(db, course.id, student_id).await? {
        return Ok(EnrollOutcome {
            enrollment,
            created: false,
        });
    }

    let now = time::now();
    let enrollment = course_enrollment::ActiveModel {
        course_id: Set(course.id),
        student_id: Set(student_id),
        price_paid: Set(price_paid),
        progress_percentage: Set(0.0),
        completed: Set(false),
        completed_at: Set(None),
        certificate_issued: Set(false),
        last_accessed: Set(now.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Course::update_many()
        .col_expr(
            course::Column::EnrollmentCount,
            sea_query::Expr::col(course::Column::EnrollmentCount).add(1),
        )
        .filter(course::Column::Id.eq(course.id))
        .exec(db)
        .await?;

    student_service::apply_delta(
        db,
        student_id,
        ProfileDelta {
            enrolled: 1,
            ..Default::default()
        },
    )
    .await?;
    author_service::note_enrollment(db, course.author_id, student_id).await?;

    tracing::info!(course_id = course.id, student_id, "student enrolled");
    Ok(EnrollOutcome {
        enrollment,
        created: true,
    })
}

/// Free courses enroll directly; paid ones must go through checkout.
pub async fn enroll(db: &DatabaseConnection, student: &user::Model, slug: &str) -> AppResult<EnrollOutcome> {
    let course = catalog_service::published_by_slug(db, slug).await?;

    if let Some(enrollment) = find_enrollment(db, course.id, student.id).await? {
        return Ok(EnrollOutcome {
            enrollment,
            created: false,
        });
    }
    if course.price > 0 {
        return Err(AppError::PaymentRequired(
            "This course is paid. Use checkout to purchase it".into(),
        ));
    }

    let student_id = student.id;
    db.transaction::<_, EnrollOutcome, AppError>(|txn| {
        Box::pin(async move { create_enrollment(txn, &course, student_id, 0).await })
    })
    .await
    .map_err(AppError::from)
}

#[derive(Debug, Serialize)]
pub struct LessonView {
    pub id: i32,
    pub module_id: i32,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub is_preview: bool,
    pub order: i32,
    /// Withheld unless the viewer can access the lesson
    pub video_url: Option<String>,
    pub text_content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressEntry {
    pub completed: bool,
    pub watch_percentage: f64,
    pub last_position_seconds: i32,
}

#[derive(Debug, Serialize)]
pub struct LearnView {
    pub course_id: i32,
    pub course_title: String,
    pub course_slug: String,
    pub modules: Vec<catalog_service::ModuleOutline>,
    pub current_lesson: Option<LessonView>,
    pub can_access: bool,
    pub is_enrolled: bool,
    pub prev_lesson_id: Option<i32>,
    pub next_lesson_id: Option<i32>,
    pub progress: HashMap<i32, ProgressEntry>,
    pub progress_percentage: f64,
}

pub async fn learn(
    db: &DatabaseConnection,
    viewer: Option<&user::Model>,
    slug: &str,
    lesson_id: Option<i32>,
) -> AppResult<LearnView> {
    let course = catalog_service::published_by_slug(db, slug).await?;
    let outline = catalog_service::course_outline(db, course.id).await?;
    let flat: Vec<&lesson::Model> = outline.iter().flat_map(|(_, l)| l.iter()).collect();

    let current_idx = match lesson_id {
        Some(id) => Some(
            flat.iter()
                .position(|l| l.id == id)
                .ok_or(AppError::NotFound("Lesson"))?,
        ),
        None if flat.is_empty() => None,
        None => Some(0),
    };

    let enrollment = match viewer {
        Some(v) => find_enrollment(db, course.id, v.id).await?,
        None => None,
    };

    let mut progress = HashMap::new();
    if let Some(e) = &enrollment {
        for p in LessonProgress::find()
            .filter(lesson_progress::Column::EnrollmentId.eq(e.id))
            .all(db)
            .await?
        {
            progress.insert(
                p.lesson_id,
                ProgressEntry {
                    completed: p.completed,
                    watch_percentage: p.watch_percentage,
                    last_position_seconds: p.last_position_seconds,
                },
            );
        }

        let mut active: course_enrollment::ActiveModel = e.clone().into();
        active.last_accessed = Set(time::now());
        active.update(db).await?;
    }

    let is_enrolled = enrollment.is_some();
    let (current_lesson, can_access, prev_lesson_id, next_lesson_id) = match current_idx {
        Some(idx) => {
            let l = flat[idx];
            let can_access = is_enrolled || l.is_preview;
            let view = LessonView {
                id: l.id,
                module_id: l.module_id,
                title: l.title.clone(),
                description: l.description.clone(),
                duration_minutes: l.duration_minutes,
                is_preview: l.is_preview,
                order: l.sort_order,
                video_url: can_access.then(|| l.video_url.clone()),
                text_content: can_access.then(|| l.text_content.clone()),
            };
            let prev = idx.checked_sub(1).map(|i| flat[i].id);
            let next = flat.get(idx + 1).map(|l| l.id);
            (Some(view), can_access, prev, next)
        }
        None => (None, false, None, None),
    };

    let modules = outline
        .iter()
        .map(|(m, lessons)| catalog_service::ModuleOutline {
            id: m.id,
            title: m.title.clone(),
            description: m.description.clone(),
            order: m.sort_order,
            lessons: lessons
                .iter()
                .map(|l| catalog_service::LessonOutline {
                    id: l.id,
                    title: l.title.clone(),
                    duration_minutes: l.duration_minutes,
                    is_preview: l.is_preview,
                    order: l.sort_order,
                })
                .collect(),
        })
        .collect();

    Ok(LearnView {
        course_id: course.id,
        course_title: course.title,
        course_slug: course.slug,
        modules,
        current_lesson,
        can_access,
        is_enrolled,
        prev_lesson_id,
        next_lesson_id,
        progress,
        progress_percentage: enrollment.map(|e| e.progress_percentage).unwrap_or(0.0),
    })
}

/// Live lesson plus the viewer's enrollment in its course; 403 if not enrolled
async fn lesson_and_enrollment<C: ConnectionTrait>(
    db: &C,
    student: &user::Model,
    lesson_id: i32,
) -> AppResult<(lesson::Model, course_enrollment::Model)> {
    let lesson = Lesson::find_by_id(lesson_id)
        .filter(lesson::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Lesson"))?;
    let enrollment = find_enrollment(db, lesson.course_id, student.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("You are not enrolled in this course".into()))?;
    Ok((lesson, enrollment))
}

async fn progress_row<C: ConnectionTrait>(
    db: &C,
    enrollment_id: i32,
    lesson_id: i32,
) -> AppResult<lesson_progress::Model> {
    if let Some(p) = LessonProgress::find()
        .filter(lesson_progress::Column::EnrollmentId.eq(enrollment_id))
        .filter(lesson_progress::Column::LessonId.eq(lesson_id))
        .one(db)
        .await?
    {
        return Ok(p);
    }
    let now = time::now();
    Ok(lesson_progress::ActiveModel {
        enrollment_id: Set(enrollment_id),
        lesson_id: Set(lesson_id),
        completed: Set(false),
        watch_percentage: Set(0.0),
        last_position_seconds: Set(0),
        watch_time_seconds: Set(0),
        completed_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

#[derive(Debug, Deserialize)]
pub struct ProgressUpdate {
    pub watch_percentage: f64,
    pub position_seconds: Option<i32>,
    pub watch_seconds: Option<i32>,
    pub session_id: Option<String>,
    pub device_type: Option<String>,
}

/// Watch percentage only ratchets upward
pub fn merged_watch_percentage(old: f64, new: f64) -> f64 {
    let new = if new.is_finite() { new.clamp(0.0, 100.0) } else { 0.0 };
    old.max(new)
}

pub async fn update_progress(
    db: &DatabaseConnection,
    student: &user::Model,
    lesson_id: i32,
    input: ProgressUpdate,
) -> AppResult<lesson_progress::Model> {
    let student = student.clone();
    db.transaction::<_, lesson_progress::Model, AppError>(|txn| {
        Box::pin(async move {
            let (lesson, enrollment) = lesson_and_enrollment(txn, &student, lesson_id).await?;
            let current = progress_row(txn, enrollment.id, lesson.id).await?;
            let watched = input.watch_seconds.unwrap_or(0).max(0);
            let now = time::now();

            let mut active: lesson_progress::ActiveModel = current.clone().into();
            active.watch_percentage = Set(merged_watch_percentage(current.watch_percentage, input.watch_percentage));
            if let Some(pos) = input.position_seconds {
                active.last_position_seconds = Set(pos.max(0));
            }
            active.watch_time_seconds = Set(current.watch_time_seconds.saturating_add(watched));
            active.updated_at = Set(now.clone());
            let updated = active.update(txn).await?;

            watch_history::ActiveModel {
                student_id: Set(student.id),
                lesson_id: Set(lesson.id),
                course_id: Set(lesson.course_id),
                watch_duration_seconds: Set(watched),
                percentage_watched: Set(merged_watch_percentage(0.0, input.watch_percentage)),
                session_id: Set(input.session_id.unwrap_or_default()),
                device_type: Set(input.device_type.unwrap_or_default()),
                created_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            let mut touched: course_enrollment::ActiveModel = enrollment.into();
            touched.last_accessed = Set(now.clone());
            touched.updated_at = Set(now);
            touched.update(txn).await?;

            if watched > 0 {
                student_service::apply_delta(
                    txn,
                    student.id,
                    ProfileDelta {
                        watch_seconds: watched as i64,
                        ..Default::default()
                    },
                )
                .await?;
            }
            Ok(updated)
        })
    })
    .await
    .map_err(AppError::from)
}

#[derive(Debug, Serialize)]
pub struct CompletionOutcome {
    pub progress_percentage: f64,
    pub course_completed: bool,
    pub certificate: Option<certificate::Model>,
}

/// completed / total * 100 over live lessons; 0 when there are none
pub fn progress_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((completed as f64 / total as f64) * 10000.0).round() / 100.0
}

pub async fn mark_complete(db: &DatabaseConnection, student: &user::Model, lesson_id: i32) -> AppResult<CompletionOutcome> {
    let student = student.clone();
    db.transaction::<_, CompletionOutcome, AppError>(|txn| {
        Box::pin(async move {
            let (lesson, enrollment) = lesson_and_enrollment(txn, &student, lesson_id).await?;
            let current = progress_row(txn, enrollment.id, lesson.id).await?;
            let now = time::now();

            if !current.completed {
                let mut active: lesson_progress::ActiveModel = current.into();
                active.completed = Set(true);
                active.watch_percentage = Set(100.0);
                active.completed_at = Set(Some(now.clone()));
                active.updated_at = Set(now.clone());
                active.update(txn).await?;
            }

            let live_ids: Vec<i32> = catalog_service::course_outline(txn, lesson.course_id)
                .await?
                .into_iter()
                .flat_map(|(_, lessons)| lessons.into_iter().map(|l| l.id))
                .collect();
            let done = LessonProgress::find()
                .filter(lesson_progress::Column::EnrollmentId.eq(enrollment.id))
                .filter(lesson_progress::Column::Completed.eq(true))
                .filter(lesson_progress::Column::LessonId.is_in(live_ids.clone()))
                .count(txn)
                .await? as usize;
            let pct = progress_percentage(done, live_ids.len());

            let newly_completed = pct >= 100.0 && !enrollment.completed;
            let mut active: course_enrollment::ActiveModel = enrollment.clone().into();
            active.progress_percentage = Set(pct);
            active.last_accessed = Set(now.clone());
            active.updated_at = Set(now.clone());
            if newly_completed {
                active.completed = Set(true);
                active.completed_at = Set(Some(now.clone()));
            }
            let enrollment = active.update(txn).await?;

            let mut certificate = None;
            if newly_completed {
                student_service::apply_delta(
                    txn,
                    student.id,
                    ProfileDelta {
                        completed: 1,
                        ..Default::default()
                    },
                )
                .await?;
                certificate = issue_certificate(txn, &enrollment).await?;
            }

            Ok(CompletionOutcome {
                progress_percentage: pct,
                course_completed: enrollment.completed,
                certificate,
            })
        })
    })
    .await
    .map_err(AppError::from)
}

/// `ILMSPACE-` followed by 12 uppercase hex chars from a v4 UUID
pub fn new_certificate_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ILMSPACE-{}", &hex[..12])
}

/// Issues once per enrollment; returns `None` if one already exists.
async fn issue_certificate<C: ConnectionTrait>(
    db: &C,
    enrollment: &course_enrollment::Model,
) -> AppResult<Option<certificate::Model>> {
    let exists = Certificate::find()
        .filter(certificate::Column::StudentId.eq(enrollment.student_id))
        .filter(certificate::Column::CourseId.eq(enrollment.course_id))
        .count(db)
        .await?
        > 0;
    if exists || enrollment.certificate_issued {
        return Ok(None);
    }

    let certificate_id = new_certificate_id();
    let issued = certificate::ActiveModel {
        student_id: Set(enrollment.student_id),
        course_id: Set(enrollment.course_id),
        enrollment_id: Set(enrollment.id),
        verification_url: Set(format!("/api/certificates/{certificate_id}")),
        certificate_id: Set(certificate_id),
        issued_at: Set(time::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut active: course_enrollment::ActiveModel = enrollment.clone().into();
    active.certificate_issued = Set(true);
    active.update(db).await?;

    student_service::apply_delta(
        db,
        enrollment.student_id,
        ProfileDelta {
            certificates: 1,
            ..Default::default()
        },
    )
    .await?;

    tracing::info!(enrollment_id = enrollment.id, "certificate issued");
    Ok(Some(issued))
}

#[derive(Debug, Serialize)]
pub struct CertificateVerification {
    pub certificate_id: String,
    pub student_name: String,
    pub course_title: String,
    pub issued_at: String,
}

pub async fn verify_certificate(db: &DatabaseConnection, certificate_id: &str) -> AppResult<CertificateVerification> {
    let cert = Certificate::find()
        .filter(certificate::Column::CertificateId.eq(certificate_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Certificate"))?;
    let course = Course::find_by_id(cert.course_id).one(db).await?;
    let student = user::Entity::find_by_id(cert.student_id).one(db).await?;

    Ok(CertificateVerification {
        certificate_id: cert.certificate_id,
        student_name: student.map(|s| s.full_name()).unwrap_or_default(),
        course_title: course.map(|c| c.title).unwrap_or_default(),
        issued_at: cert.issued_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_percentage_never_decreases() {
        assert_eq!(merged_watch_percentage(40.0, 30.0), 40.0);
        assert_eq!(merged_watch_percentage(40.0, 75.5), 75.5);
        assert_eq!(merged_watch_percentage(40.0, 250.0), 100.0);
        assert_eq!(merged_watch_percentage(0.0, -5.0), 0.0);
        assert_eq!(merged_watch_percentage(10.0, f64::NAN), 10.0);
    }

    #[test]
    fn progress_math() {
        assert_eq!(progress_percentage(0, 0), 0.0);
        assert_eq!(progress_percentage(1, 3), 33.33);
        assert_eq!(progress_percentage(3, 3), 100.0);
    }

    #[test]
    fn certificate_id_format() {
        let id = new_certificate_id();
        assert!(id.starts_with("ILMSPACE-"));
        let suffix = &id["ILMSPACE-".len()..];
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
