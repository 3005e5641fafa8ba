pub mod author_balance;
pub mod author_payout;
pub mod author_profile;
pub mod category;
pub mod certificate;
pub mod course;
pub mod course_category;
pub mod course_enrollment;
pub mod course_moderation;
pub mod course_module;
pub mod course_review;
pub mod homework_assignment;
pub mod homework_submission;
pub mod lesson;
pub mod lesson_progress;
pub mod moderation_log;
pub mod payment_gateway_config;
pub mod phone_verification;
pub mod platform_commission;
pub mod refund_request;
pub mod social_auth;
pub mod student_profile;
pub mod transaction;
pub mod user;
pub mod user_moderation;
pub mod watch_history;
