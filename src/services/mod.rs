//! Services Layer
//!
//! Business rules live here, independent of HTTP. Handlers in `api` parse
//! requests, call a service and shape the response.

pub mod author_service;
pub mod builder_service;
pub mod catalog_service;
pub mod dashboard_service;
pub mod enrollment_service;
pub mod homework_service;
pub mod moderation_service;
pub mod otp_service;
pub mod payment_service;
pub mod payout_service;
pub mod review_service;
pub mod student_service;
pub mod user_service;
