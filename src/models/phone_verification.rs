use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const MAX_ATTEMPTS: i32 = 3;
pub const OTP_VALIDITY_MINUTES: i64 = 5;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "phone_verifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub otp_code: String,
    pub purpose: String, // 'REGISTER', 'LOGIN'
    pub is_verified: bool,
    pub is_deleted: bool,
    pub expires_at: String,
    pub attempts: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
