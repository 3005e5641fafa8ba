use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "platform_commissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub course_id: Option<i32>,
    pub category_id: Option<i32>,
    pub commission_percentage: f64,
    pub is_active: bool,
    pub effective_from: String,
    pub effective_until: Option<String>, // None = no expiry
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
