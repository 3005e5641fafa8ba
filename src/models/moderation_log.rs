use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "moderation_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub admin_id: Option<i32>,
    pub action_type: String,
    pub description: String,
    pub affected_user_id: Option<i32>,
    pub affected_course_id: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub additional_data: String, // JSON object
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
