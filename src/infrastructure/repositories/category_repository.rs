//! SeaORM implementation of CategoryRepository

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::domain::{AppResult, CategoryNode, CategoryRepository, CourseStatus};
use crate::models::{category, course, course_category};

pub struct SeaOrmCategoryRepository {
    db: DatabaseConnection,
}

impl SeaOrmCategoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// category id -> number of published, non-deleted courses
    async fn published_counts(&self) -> AppResult<HashMap<i32, u64>> {
        let links = course_category::Entity::find()
            .find_also_related(course::Entity)
            .filter(course::Column::Status.eq(CourseStatus::Published.as_str()))
            .filter(course::Column::IsDeleted.eq(false))
            .all(&self.db)
            .await?;

        let mut counts = HashMap::new();
        for (link, _) in links {
            *counts.entry(link.category_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

fn node(c: category::Model, counts: &HashMap<i32, u64>) -> CategoryNode {
    CategoryNode {
        course_count: counts.get(&c.id).copied().unwrap_or(0),
        id: c.id,
        name: c.name,
        slug: c.slug,
        description: c.description,
        icon: c.icon,
        order: c.sort_order,
        subcategories: Vec::new(),
    }
}

#[async_trait]
impl CategoryRepository for SeaOrmCategoryRepository {
    async fn find_tree(&self) -> AppResult<Vec<CategoryNode>> {
        let all = category::Entity::find()
            .order_by_asc(category::Column::SortOrder)
            .order_by_asc(category::Column::Name)
            .all(&self.db)
            .await?;
        let counts = self.published_counts().await?;

        let mut children: HashMap<i32, Vec<CategoryNode>> = HashMap::new();
        let mut roots = Vec::new();
        for c in all {
            match c.parent_id {
                Some(parent) => children.entry(parent).or_default().push(node(c, &counts)),
                None => roots.push(node(c, &counts)),
            }
        }
        for root in &mut roots {
            root.subcategories = children.remove(&root.id).unwrap_or_default();
        }
        Ok(roots)
    }
}
