pub mod admin;
pub mod auth;
pub mod author;
pub mod builder;
pub mod catalog;
pub mod error;
pub mod extract;
pub mod health;
pub mod learning;
pub mod payments;
pub mod student;
pub mod telegram;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::infrastructure::AppState;

pub fn api_router_with_state(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route(
            "/auth/register/request-otp",
            post(auth::request_registration_otp),
        )
        .route("/auth/register/phone", post(auth::register_phone))
        .route("/auth/register/email", post(auth::register_email))
        .route("/auth/login", post(auth::login))
        .route("/auth/login/request-otp", post(auth::request_login_otp))
        .route("/auth/login/verify-otp", post(auth::verify_login_otp))
        .route("/auth/me", get(auth::get_me).put(auth::update_me))
        .route("/auth/become-instructor", post(auth::become_instructor))
        // Catalog
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route("/courses", get(catalog::list_courses))
        .route("/courses/:slug", get(catalog::course_detail))
        .route(
            "/courses/:slug/reviews",
            get(catalog::list_reviews).post(catalog::create_review),
        )
        // Learning
        .route("/courses/:slug/enroll", post(learning::enroll))
        .route("/courses/:slug/checkout", post(payments::checkout))
        .route("/courses/:slug/learn", get(learning::learn))
        .route("/lessons/:id/progress", post(learning::update_progress))
        .route("/lessons/:id/complete", post(learning::mark_complete))
        .route("/lessons/:id/homework", post(learning::submit_homework))
        .route(
            "/certificates/:certificate_id",
            get(learning::verify_certificate),
        )
        // Course builder
        .route(
            "/builder/courses",
            get(builder::my_courses).post(builder::create_course),
        )
        .route(
            "/builder/courses/:id",
            get(builder::get_course).put(builder::update_course),
        )
        .route("/builder/courses/:id/submit", post(builder::submit_for_review))
        .route("/builder/courses/:id/modules", post(builder::add_module))
        .route(
            "/builder/modules/:id",
            put(builder::edit_module).delete(builder::delete_module),
        )
        .route("/builder/modules/:id/lessons", post(builder::add_lesson))
        .route(
            "/builder/lessons/:id",
            put(builder::edit_lesson).delete(builder::delete_lesson),
        )
        .route(
            "/builder/lessons/:id/assignment",
            put(builder::upsert_assignment),
        )
        .route(
            "/builder/assignments/:id/submissions",
            get(builder::list_submissions),
        )
        .route(
            "/builder/submissions/:id/grade",
            post(builder::grade_submission),
        )
        // Payments
        .route(
            "/payments/callback/:gateway",
            post(payments::gateway_callback),
        )
        .route("/payments/transactions", get(payments::my_transactions))
        .route(
            "/refunds",
            get(payments::my_refunds).post(payments::request_refund),
        )
        // Authors
        .route("/authors/:id", get(author::get_author))
        .route(
            "/author/profile",
            get(author::my_profile).put(author::update_my_profile),
        )
        .route("/author/dashboard", get(author::dashboard))
        .route(
            "/author/payouts",
            get(author::list_payouts).post(author::request_payout),
        )
        // Students
        .route(
            "/student/profile",
            get(student::get_profile).put(student::update_profile),
        )
        .route("/student/dashboard", get(student::dashboard))
        .route("/student/certificates", get(student::certificates))
        // Admin
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/moderation/queue", get(admin::moderation_queue))
        .route("/admin/courses/:id/approve", post(admin::approve_course))
        .route("/admin/courses/:id/reject", post(admin::reject_course))
        .route(
            "/admin/courses/:id/request-changes",
            post(admin::request_changes),
        )
        .route("/admin/courses/:id/archive", post(admin::archive_course))
        .route("/admin/users/:id/moderate", post(admin::moderate_user))
        .route("/admin/authors/:id/verify", post(admin::verify_author))
        .route("/admin/authors/:id/unverify", post(admin::unverify_author))
        .route("/admin/logs", get(admin::list_logs))
        .route("/admin/transactions", get(admin::list_transactions))
        .route(
            "/admin/transactions/:id/mark-success",
            post(admin::mark_success),
        )
        .route(
            "/admin/transactions/:id/mark-failed",
            post(admin::mark_failed),
        )
        .route("/admin/refunds", get(admin::list_refunds))
        .route("/admin/refunds/:id/approve", post(admin::approve_refund))
        .route("/admin/refunds/:id/reject", post(admin::reject_refund))
        .route("/admin/payouts", get(admin::list_payouts))
        .route("/admin/payouts/:id/approve", post(admin::approve_payout))
        .route("/admin/payouts/:id/reject", post(admin::reject_payout))
        .route("/admin/payouts/:id/complete", post(admin::complete_payout))
        .route("/admin/gateways", get(admin::list_gateways))
        .route(
            "/admin/gateways/:gateway",
            get(admin::get_gateway).put(admin::update_gateway),
        )
        .route(
            "/admin/commissions",
            get(admin::list_commissions).post(admin::create_commission),
        )
        // Telegram
        .route("/telegram/webhook", post(telegram::webhook))
        .with_state(state)
}
