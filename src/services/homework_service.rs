//! Lesson homework: assignments, submissions and grading

use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult};
use crate::models::homework_assignment::{self, Entity as Assignment};
use crate::models::homework_submission::{self, Entity as Submission};
use crate::models::lesson::{self, Entity as Lesson};
use crate::models::user;
use crate::services::{builder_service, enrollment_service};
use crate::utils::time;

#[derive(Debug, Deserialize)]
pub struct AssignmentInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct GradeInput {
    pub grade: f64,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: homework_submission::Model,
    pub student_name: String,
}

async fn live_lesson(db: &DatabaseConnection, lesson_id: i32) -> AppResult<lesson::Model> {
    Lesson::find_by_id(lesson_id)
        .filter(lesson::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Lesson"))
}

/// Create or replace the single assignment attached to a lesson
pub async fn upsert_assignment(
    db: &DatabaseConnection,
    actor: &user::Model,
    lesson_id: i32,
    input: AssignmentInput,
) -> AppResult<homework_assignment::Model> {
    let lesson = live_lesson(db, lesson_id).await?;
    builder_service::owned_course(db, actor, lesson.course_id).await?;

    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("Assignment title is required"));
    }

    let now = time::now();
    let existing = Assignment::find()
        .filter(homework_assignment::Column::LessonId.eq(lesson.id))
        .one(db)
        .await?;

    let saved = match existing {
        Some(a) => {
            let mut active: homework_assignment::ActiveModel = a.into();
            active.title = Set(title);
            active.description = Set(input.description);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            homework_assignment::ActiveModel {
                lesson_id: Set(lesson.id),
                title: Set(title),
                description: Set(input.description),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(saved)
}

async fn owned_assignment(
    db: &DatabaseConnection,
    actor: &user::Model,
    assignment_id: i32,
) -> AppResult<homework_assignment::Model> {
    let assignment = Assignment::find_by_id(assignment_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Assignment"))?;
    let lesson = live_lesson(db, assignment.lesson_id).await?;
    builder_service::owned_course(db, actor, lesson.course_id).await?;
    Ok(assignment)
}

pub async fn list_submissions(
    db: &DatabaseConnection,
    actor: &user::Model,
    assignment_id: i32,
) -> AppResult<Vec<SubmissionView>> {
    let assignment = owned_assignment(db, actor, assignment_id).await?;
    let rows = Submission::find()
        .filter(homework_submission::Column::AssignmentId.eq(assignment.id))
        .order_by_desc(homework_submission::Column::CreatedAt)
        .all(db)
        .await?;

    let mut views = Vec::with_capacity(rows.len());
    for submission in rows {
        let student_name = user::Entity::find_by_id(submission.student_id)
            .one(db)
            .await?
            .map(|s| s.full_name())
            .unwrap_or_default();
        views.push(SubmissionView {
            submission,
            student_name,
        });
    }
    Ok(views)
}

pub async fn grade_submission(
    db: &DatabaseConnection,
    actor: &user::Model,
    submission_id: i32,
    input: GradeInput,
) -> AppResult<homework_submission::Model> {
    if !(0.0..=100.0).contains(&input.grade) {
        return Err(AppError::validation("Grade must be between 0 and 100"));
    }
    let submission = Submission::find_by_id(submission_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Submission"))?;
    owned_assignment(db, actor, submission.assignment_id).await?;

    let now = time::now();
    let mut active: homework_submission::ActiveModel = submission.into();
    active.grade = Set(Some(input.grade));
    active.feedback = Set(input.feedback);
    active.graded_at = Set(Some(now.clone()));
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

/// One submission per student; editable until graded.
pub async fn submit_homework(
    db: &DatabaseConnection,
    student: &user::Model,
    lesson_id: i32,
    content: String,
) -> AppResult<homework_submission::Model> {
    if content.trim().is_empty() {
        return Err(AppError::validation("Submission content is required"));
    }
    let lesson = live_lesson(db, lesson_id).await?;
    if enrollment_service::find_enrollment(db, lesson.course_id, student.id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden("You are not enrolled in this course".into()));
    }
    let assignment = Assignment::find()
        .filter(homework_assignment::Column::LessonId.eq(lesson.id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Assignment"))?;

    let existing = Submission::find()
        .filter(homework_submission::Column::AssignmentId.eq(assignment.id))
        .filter(homework_submission::Column::StudentId.eq(student.id))
        .one(db)
        .await?;

    let now = time::now();
    match existing {
        Some(s) if s.graded_at.is_some() => Err(AppError::validation(
            "This submission has already been graded",
        )),
        Some(s) => {
            let mut active: homework_submission::ActiveModel = s.into();
            active.content = Set(content);
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        None => Ok(homework_submission::ActiveModel {
            assignment_id: Set(assignment.id),
            student_id: Set(student.id),
            content: Set(content),
            grade: Set(None),
            feedback: Set(String::new()),
            graded_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?),
    }
}
