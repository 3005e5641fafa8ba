use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub author_id: i32,
    pub thumbnail: Option<String>, // path under MEDIA_ROOT
    pub trailer_url: String,
    pub price: i64, // tiyin
    pub status: String, // 'DRAFT', 'PENDING', 'PUBLISHED', 'REJECTED', 'ARCHIVED'
    pub level: String,  // 'BEGINNER', 'INTERMEDIATE', 'ADVANCED'
    pub language: String,
    pub requirements: String,
    pub what_you_will_learn: String,
    pub enrollment_count: i32,
    pub average_rating: f64,
    pub review_count: i32,
    pub total_duration_minutes: i32,
    pub published_at: Option<String>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
    #[serde(skip_serializing)]
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(has_many = "super::course_module::Entity")]
    Module,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::course_module::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Module.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
