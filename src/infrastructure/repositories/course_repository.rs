//! SeaORM implementation of CourseRepository

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};

use crate::domain::{
    AppResult, AuthorSummary, CourseFilter, CourseRepository, CourseSort, CourseStatus,
    CourseSummary, PaginatedCourses, PriceFilter,
};
use crate::models::{category, course, course_category, user};

/// SeaORM-based implementation of CourseRepository
pub struct SeaOrmCourseRepository {
    db: DatabaseConnection,
}

impl SeaOrmCourseRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Course ids attached to the category with this slug (empty if unknown)
    async fn course_ids_in_category(&self, slug: &str) -> AppResult<Vec<i32>> {
        let Some(cat) = category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await?
        else {
            return Ok(Vec::new());
        };

        let ids = course_category::Entity::find()
            .filter(course_category::Column::CategoryId.eq(cat.id))
            .select_only()
            .column(course_category::Column::CourseId)
            .into_tuple::<i32>()
            .all(&self.db)
            .await?;
        Ok(ids)
    }
}

fn published() -> Select<course::Entity> {
    course::Entity::find()
        .filter(course::Column::Status.eq(CourseStatus::Published.as_str()))
        .filter(course::Column::IsDeleted.eq(false))
}

pub fn to_summary(c: course::Model, author: Option<user::Model>) -> CourseSummary {
    let author = match author {
        Some(a) => AuthorSummary {
            id: a.id,
            name: a.full_name(),
        },
        None => AuthorSummary {
            id: c.author_id,
            name: String::new(),
        },
    };
    CourseSummary {
        id: c.id,
        title: c.title,
        slug: c.slug,
        short_description: c.short_description,
        thumbnail: c.thumbnail,
        price: c.price,
        level: c.level,
        language: c.language,
        status: c.status,
        author,
        average_rating: c.average_rating,
        review_count: c.review_count,
        enrollment_count: c.enrollment_count,
        total_duration_minutes: c.total_duration_minutes,
        published_at: c.published_at,
        created_at: c.created_at,
    }
}

#[async_trait]
impl CourseRepository for SeaOrmCourseRepository {
    async fn find_published(&self, filter: CourseFilter) -> AppResult<PaginatedCourses> {
        let filter = filter.normalized();
        let mut query = published();

        if let Some(slug) = &filter.category
            && !slug.is_empty()
        {
            let ids = self.course_ids_in_category(slug).await?;
            query = query.filter(course::Column::Id.is_in(ids));
        }

        if let Some(level) = filter.level {
            query = query.filter(course::Column::Level.eq(level.as_str()));
        }

        match filter.price {
            Some(PriceFilter::Free) => query = query.filter(course::Column::Price.eq(0)),
            Some(PriceFilter::Paid) => query = query.filter(course::Column::Price.gt(0)),
            None => {}
        }

        let mut query = query.find_also_related(user::Entity);

        if let Some(q) = &filter.query
            && !q.trim().is_empty()
        {
            let q = q.trim();
            // SQLite LIKE is case-insensitive for ASCII
            let cond = Condition::any()
                .add(course::Column::Title.contains(q))
                .add(course::Column::Description.contains(q))
                .add(user::Column::FirstName.contains(q))
                .add(user::Column::LastName.contains(q));
            query = query.filter(cond);
        }

        query = match filter.sort {
            CourseSort::Newest => query.order_by_desc(course::Column::CreatedAt),
            CourseSort::Oldest => query.order_by_asc(course::Column::CreatedAt),
            CourseSort::PriceLow => query.order_by_asc(course::Column::Price),
            CourseSort::PriceHigh => query.order_by_desc(course::Column::Price),
            CourseSort::Rating => query.order_by_desc(course::Column::AverageRating),
            CourseSort::Popular => query.order_by_desc(course::Column::EnrollmentCount),
        };
        // stable paging across equal sort keys
        query = query.order_by_desc(course::Column::Id);

        let paginator = query.paginate(&self.db, filter.limit);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(filter.page - 1).await?;

        Ok(PaginatedCourses {
            courses: rows.into_iter().map(|(c, a)| to_summary(c, a)).collect(),
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn find_summaries(&self, ids: &[i32]) -> AppResult<Vec<CourseSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = published()
            .filter(course::Column::Id.is_in(ids.to_vec()))
            .find_also_related(user::Entity)
            .all(&self.db)
            .await?;

        let mut by_id: std::collections::HashMap<i32, CourseSummary> = rows
            .into_iter()
            .map(|(c, a)| (c.id, to_summary(c, a)))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
