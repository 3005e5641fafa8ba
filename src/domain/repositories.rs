//! Repository trait definitions
//!
//! These traits define the contract for catalog reads.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Serialize;

use super::{AppResult, CourseLevel};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Price bucket filter for the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFilter {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseSort {
    #[default]
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
    Rating,
    Popular,
}

impl CourseSort {
    /// Unknown keys fall back to `Newest`
    pub fn parse(key: &str) -> Self {
        match key {
            "oldest" => CourseSort::Oldest,
            "price_low" => CourseSort::PriceLow,
            "price_high" => CourseSort::PriceHigh,
            "rating" => CourseSort::Rating,
            "popular" => CourseSort::Popular,
            _ => CourseSort::Newest,
        }
    }
}

/// Filter criteria for published-course queries
#[derive(Debug, Default, Clone)]
pub struct CourseFilter {
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub price: Option<PriceFilter>,
    pub query: Option<String>,
    pub sort: CourseSort,
    pub page: u64,
    pub limit: u64,
}

impl CourseFilter {
    /// Clamp page to >= 1 and limit to 1..=MAX_PAGE_SIZE
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = match self.limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorSummary {
    pub id: i32,
    pub name: String,
}

/// Course card as shown in listings
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub short_description: String,
    pub thumbnail: Option<String>,
    pub price: i64,
    pub level: String,
    pub language: String,
    pub status: String,
    pub author: AuthorSummary,
    pub average_rating: f64,
    pub review_count: i32,
    pub enrollment_count: i32,
    pub total_duration_minutes: i32,
    pub published_at: Option<String>,
    pub created_at: String,
}

/// Paginated result with total count
#[derive(Debug, Serialize)]
pub struct PaginatedCourses {
    pub courses: Vec<CourseSummary>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Category with published-course count and children
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: String,
    pub order: i32,
    pub course_count: u64,
    pub subcategories: Vec<CategoryNode>,
}

/// Read side of the public catalog
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Published, non-deleted courses matching the filter
    async fn find_published(&self, filter: CourseFilter) -> AppResult<PaginatedCourses>;

    /// Published course cards by id, preserving the given order
    async fn find_summaries(&self, ids: &[i32]) -> AppResult<Vec<CourseSummary>>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Top-level categories ordered by (order, name), each with its children
    async fn find_tree(&self) -> AppResult<Vec<CategoryNode>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paging() {
        let f = CourseFilter {
            page: 0,
            limit: 500,
            ..Default::default()
        }
        .normalized();
        assert_eq!(f.page, 1);
        assert_eq!(f.limit, MAX_PAGE_SIZE);

        let f = CourseFilter::default().normalized();
        assert_eq!(f.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn unknown_sort_is_newest() {
        assert_eq!(CourseSort::parse("price_high"), CourseSort::PriceHigh);
        assert_eq!(CourseSort::parse("bogus"), CourseSort::Newest);
    }
}
