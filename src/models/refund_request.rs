use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refund_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub enrollment_id: Option<i32>, // cleared once the enrollment is revoked
    pub course_id: i32,
    pub student_id: i32,
    pub original_transaction_id: Option<i32>,
    pub amount: i64,
    pub reason: String,
    pub status: String, // 'PENDING', 'APPROVED', 'REJECTED', 'COMPLETED'
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<String>,
    pub admin_notes: String,
    pub refund_transaction_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
