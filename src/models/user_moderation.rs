use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_moderations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub action: String, // 'BAN', 'UNBAN', 'WARNING', 'SUSPEND'
    pub reason: String,
    pub details: String,
    pub moderator_id: Option<i32>,
    pub is_permanent: bool,
    pub expires_at: Option<String>,
    pub ip_address: Option<String>,
    pub evidence_urls: String, // JSON array
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
