//! Repository implementations using SeaORM

pub mod category_repository;
pub mod course_repository;

pub use category_repository::SeaOrmCategoryRepository;
pub use course_repository::SeaOrmCourseRepository;
