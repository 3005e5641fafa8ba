//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{CategoryRepository, CourseRepository};
use crate::infrastructure::config::Config;
use crate::infrastructure::{SeaOrmCategoryRepository, SeaOrmCourseRepository};
use crate::modules::telegram::{self, OtpNotifier};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    pub course_repo: Arc<dyn CourseRepository>,
    pub category_repo: Arc<dyn CategoryRepository>,
    /// Outbound channel for one-time codes and bot replies
    pub notifier: Arc<dyn OtpNotifier>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let notifier = telegram::notifier_from_config(&config);
        Self::with_notifier(db, config, notifier)
    }

    pub fn with_notifier(
        db: DatabaseConnection,
        config: Config,
        notifier: Arc<dyn OtpNotifier>,
    ) -> Self {
        let course_repo = Arc::new(SeaOrmCourseRepository::new(db.clone()));
        let category_repo = Arc::new(SeaOrmCategoryRepository::new(db.clone()));

        Self {
            db,
            config: Arc::new(config),
            course_repo,
            category_repo,
            notifier,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
