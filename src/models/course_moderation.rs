use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course_moderations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub course_id: i32,
    pub status: String, // 'PENDING', 'IN_REVIEW', 'APPROVED', 'REJECTED', 'CHANGES_REQUESTED'
    pub reviewer_id: Option<i32>,
    pub review_notes: String,
    pub rejection_reason: String,
    pub changes_requested: String,
    pub reviewed_at: Option<String>,
    pub quality_score: Option<i32>, // out of 100
    pub content_complete: bool,
    pub video_quality_ok: bool,
    pub description_adequate: bool,
    pub pricing_appropriate: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
