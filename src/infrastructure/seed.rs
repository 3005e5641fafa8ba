//! Development accounts for local testing

use sea_orm::*;

use crate::domain::{AppResult, Role};
use crate::infrastructure::auth::hash_password;
use crate::models::author_balance;
use crate::models::author_profile;
use crate::models::user::{self, Entity as User};
use crate::services::{author_service, student_service};
use crate::utils::time;

const TEST_PASSWORD: &str = "test123";

struct TestAccount {
    phone: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    role: Role,
}

const ACCOUNTS: &[TestAccount] = &[
    TestAccount {
        phone: "+998901234567",
        first_name: "Test",
        last_name: "Student",
        role: Role::Student,
    },
    TestAccount {
        phone: "+998901234568",
        first_name: "Test",
        last_name: "Author",
        role: Role::Author,
    },
    TestAccount {
        phone: "+998901234569",
        first_name: "Test",
        last_name: "Admin",
        role: Role::Admin,
    },
];

/// Create the student, author and admin test accounts. Accounts whose phone
/// is already registered are left alone. Returns how many were created.
pub async fn create_test_users(db: &DatabaseConnection) -> AppResult<usize> {
    let password_hash = hash_password(TEST_PASSWORD)?;
    let mut created = 0;

    for account in ACCOUNTS {
        let exists = User::find()
            .filter(user::Column::PhoneNumber.eq(account.phone))
            .one(db)
            .await?
            .is_some();
        if exists {
            tracing::info!(phone = account.phone, "test user already exists, skipping");
            continue;
        }

        let now = time::now();
        let saved = user::ActiveModel {
            phone_number: Set(Some(account.phone.to_string())),
            email: Set(None),
            password_hash: Set(password_hash.clone()),
            first_name: Set(account.first_name.to_string()),
            last_name: Set(account.last_name.to_string()),
            age: Set(Some(25)),
            telegram_id: Set(None),
            role: Set(account.role.as_str().to_string()),
            is_staff: Set(account.role == Role::Admin),
            is_active: Set(true),
            phone_verified: Set(true),
            email_verified: Set(false),
            date_joined: Set(now.clone()),
            last_login: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        match account.role {
            Role::Student => {
                student_service::ensure_profile(db, saved.id).await?;
            }
            Role::Author => {
                let (profile, balance) = author_service::ensure_records(db, saved.id).await?;

                let mut profile: author_profile::ActiveModel = profile.into();
                profile.is_verified = Set(true);
                profile.verified_at = Set(Some(now.clone()));
                profile.bio = Set("Test author account".to_string());
                profile.update(db).await?;

                let mut balance: author_balance::ActiveModel = balance.into();
                balance.available_balance = Set(500_000_000);
                balance.lifetime_earnings = Set(1_000_000_000);
                balance.updated_at = Set(now);
                balance.update(db).await?;
            }
            Role::Admin => {}
        }

        tracing::info!(phone = account.phone, role = %account.role, "created test user");
        created += 1;
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::init_db;

    #[tokio::test]
    async fn creates_accounts_once() {
        let db = init_db("sqlite::memory:").await.unwrap();

        assert_eq!(create_test_users(&db).await.unwrap(), 3);
        assert_eq!(create_test_users(&db).await.unwrap(), 0);

        let admin = User::find()
            .filter(user::Column::PhoneNumber.eq("+998901234569"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_staff);
        assert_eq!(admin.role, "ADMIN");

        let author = User::find()
            .filter(user::Column::PhoneNumber.eq("+998901234568"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let balance = author_service::balance_for(&db, author.id).await.unwrap();
        assert_eq!(balance.available_balance, 500_000_000);
        assert_eq!(balance.lifetime_earnings, 1_000_000_000);
    }
}
