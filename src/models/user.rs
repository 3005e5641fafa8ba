use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub phone_number: Option<String>, // +998XXXXXXXXX, absent for email sign-ups
    #[sea_orm(unique)]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    #[sea_orm(unique)]
    pub telegram_id: Option<i64>,
    pub role: String, // 'STUDENT', 'AUTHOR', 'ADMIN'
    pub is_staff: bool,
    pub is_active: bool,
    pub phone_verified: bool,
    pub email_verified: bool,
    pub date_joined: String,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::course::Entity")]
    Course,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// First and last name, falling back to the phone number or email
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.phone_number
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_default()
    }
}
