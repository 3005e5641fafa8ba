//! Domain layer - Business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM entities, no Axum).
//! Only trait definitions, closed value sets and domain error types.

pub mod choices;
pub mod errors;
pub mod repositories;

pub use choices::*;
pub use errors::{AppError, AppResult};
pub use repositories::*;
