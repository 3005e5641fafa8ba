use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_gateway_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub gateway: String,
    pub is_active: bool,
    pub merchant_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub api_url: String,
    pub config: String, // JSON object, e.g. {"service_id": "..."} for Click
    pub commission_percentage: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
