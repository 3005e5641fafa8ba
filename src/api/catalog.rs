//! Public catalog: categories, course listing, course pages and reviews

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::AppJson;
use crate::domain::{AppResult, CourseFilter, CourseLevel, CourseSort, PriceFilter, Role};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::{CurrentUser, OptionalUser, require_role};
use crate::services::catalog_service::{self, NewCategory};
use crate::services::review_service::{self, NewReview};

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let categories = state.category_repo.find_tree().await?;
    Ok(Json(json!({ "success": true, "categories": categories })))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    AppJson(payload): AppJson<NewCategory>,
) -> AppResult<impl IntoResponse> {
    require_role(&account, &[Role::Admin])?;
    let category = catalog_service::create_category(state.db(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "category": category })),
    ))
}

/// Query string of the course listing
#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    pub price: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl CourseQuery {
    pub fn into_filter(self) -> AppResult<CourseFilter> {
        let level = match self.level.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<CourseLevel>()?),
        };
        let price = match self.price.as_deref().map(str::trim) {
            Some("free") => Some(PriceFilter::Free),
            Some("paid") => Some(PriceFilter::Paid),
            _ => None,
        };
        Ok(CourseFilter {
            category: self.category.filter(|c| !c.trim().is_empty()),
            level,
            price,
            query: self.q.filter(|q| !q.trim().is_empty()),
            sort: self.sort.as_deref().map(CourseSort::parse).unwrap_or_default(),
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(0),
        }
        .normalized())
    }
}

#[utoipa::path(
    get,
    path = "/api/courses",
    params(
        ("category" = Option<String>, Query, description = "Category slug"),
        ("level" = Option<String>, Query, description = "BEGINNER, INTERMEDIATE or ADVANCED"),
        ("price" = Option<String>, Query, description = "free or paid"),
        ("q" = Option<String>, Query, description = "Search text"),
        ("sort" = Option<String>, Query, description = "newest, oldest, price_low, price_high, rating, popular"),
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("limit" = Option<u64>, Query, description = "Page size, max 100")
    ),
    responses(
        (status = 200, description = "Published courses")
    )
)]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> AppResult<Json<Value>> {
    let page = state.course_repo.find_published(query.into_filter()?).await?;
    Ok(Json(json!({
        "success": true,
        "courses": page.courses,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
    })))
}

#[utoipa::path(
    get,
    path = "/api/courses/{slug}",
    params(("slug" = String, Path, description = "Course slug")),
    responses(
        (status = 200, description = "Course with curriculum and reviews"),
        (status = 404, description = "No published course with this slug")
    )
)]
pub async fn course_detail(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(slug): Path<String>,
) -> AppResult<Json<Value>> {
    let detail = catalog_service::course_detail(state.db(), &slug, viewer.as_ref()).await?;
    Ok(Json(json!({ "success": true, "course": detail })))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Value>> {
    let reviews = review_service::list_reviews(state.db(), &slug).await?;
    Ok(Json(json!({ "success": true, "reviews": reviews })))
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<NewReview>,
) -> AppResult<impl IntoResponse> {
    let review = review_service::create_review(state.db(), &account, &slug, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "review": review })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults() {
        let filter = CourseQuery::default().into_filter().unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 20);
        assert_eq!(filter.sort, CourseSort::Newest);
        assert!(filter.level.is_none());
    }

    #[test]
    fn query_parses_filters() {
        let filter = CourseQuery {
            level: Some("beginner".into()),
            price: Some("paid".into()),
            sort: Some("price_low".into()),
            limit: Some(500),
            q: Some("  ".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.level, Some(CourseLevel::Beginner));
        assert_eq!(filter.price, Some(PriceFilter::Paid));
        assert_eq!(filter.sort, CourseSort::PriceLow);
        assert_eq!(filter.limit, 100);
        assert!(filter.query.is_none());
    }

    #[test]
    fn unknown_level_is_rejected() {
        let err = CourseQuery {
            level: Some("expert".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, crate::domain::AppError::Validation(_)));
    }
}
