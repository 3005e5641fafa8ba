use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub transaction_id: String, // TXN-YYYYmmddHHMMSS-XXXXXXXX
    pub transaction_type: String, // 'COURSE_PURCHASE', 'REFUND', 'AUTHOR_PAYOUT'
    pub payer_id: Option<i32>,
    pub payee_id: Option<i32>,
    pub amount: i64, // tiyin
    pub currency: String,
    pub gateway: Option<String>, // 'CLICK', 'PAYME', 'UZUM'; None for bank transfers
    pub gateway_transaction_id: String,
    pub status: String, // 'PENDING', 'SUCCESS', 'FAILED', 'REFUNDED', 'CANCELLED'
    pub course_id: Option<i32>,
    pub enrollment_id: Option<i32>,
    pub metadata: String, // JSON object
    pub error_message: String,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
