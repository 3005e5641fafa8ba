mod common;

use chrono::{Duration, Utc};
use common::*;
use ilmspace::domain::OtpPurpose;
use ilmspace::models::phone_verification::{self, MAX_ATTEMPTS};
use ilmspace::services::otp_service;
use ilmspace::utils::time;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

const PHONE: &str = "+998907770000";

fn wrong_code(code: &str) -> &'static str {
    if code == "000000" { "111111" } else { "000000" }
}

#[tokio::test]
async fn test_code_is_valid_for_five_minutes() {
    let db = setup_test_db().await;
    let record = otp_service::issue(&db, PHONE, OtpPurpose::Register).await.unwrap();

    let created = time::parse(&record.created_at).unwrap();
    let expires = time::parse(&record.expires_at).unwrap();
    assert_eq!(expires - created, Duration::minutes(5));

    let mut active: phone_verification::ActiveModel = record.clone().into();
    active.expires_at = Set(time::to_db(Utc::now() - Duration::seconds(1)));
    active.update(&db).await.unwrap();

    let err = otp_service::verify(&db, PHONE, OtpPurpose::Register, &record.otp_code).await;
    assert!(err.is_err());
    assert!(otp_service::pending_code(&db, PHONE, OtpPurpose::Register).await.unwrap().is_none());
}

#[tokio::test]
async fn test_third_attempt_is_the_last() {
    let db = setup_test_db().await;
    let record = otp_service::issue(&db, PHONE, OtpPurpose::Login).await.unwrap();
    let wrong = wrong_code(&record.otp_code);

    for _ in 1..MAX_ATTEMPTS {
        assert!(otp_service::verify(&db, PHONE, OtpPurpose::Login, wrong).await.is_err());
    }
    otp_service::verify(&db, PHONE, OtpPurpose::Login, &record.otp_code)
        .await
        .expect("third attempt with the right code");

    let stored = phone_verification::Entity::find_by_id(record.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_verified);
    assert_eq!(stored.attempts, MAX_ATTEMPTS);
}

#[tokio::test]
async fn test_code_is_burnt_after_three_misses() {
    let db = setup_test_db().await;
    let record = otp_service::issue(&db, PHONE, OtpPurpose::Login).await.unwrap();
    let wrong = wrong_code(&record.otp_code);

    for _ in 0..MAX_ATTEMPTS {
        assert!(otp_service::verify(&db, PHONE, OtpPurpose::Login, wrong).await.is_err());
    }
    assert!(
        otp_service::verify(&db, PHONE, OtpPurpose::Login, &record.otp_code)
            .await
            .is_err()
    );
    assert!(otp_service::pending_code(&db, PHONE, OtpPurpose::Login).await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_code_retires_the_previous_one() {
    let db = setup_test_db().await;
    let first = otp_service::issue(&db, PHONE, OtpPurpose::Register).await.unwrap();
    let second = otp_service::issue(&db, PHONE, OtpPurpose::Register).await.unwrap();

    let retired = phone_verification::Entity::find_by_id(first.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(retired.is_deleted);
    assert_eq!(
        otp_service::pending_code(&db, PHONE, OtpPurpose::Register).await.unwrap(),
        Some(second.otp_code.clone())
    );
    if first.otp_code != second.otp_code {
        assert!(
            otp_service::verify(&db, PHONE, OtpPurpose::Register, &first.otp_code)
                .await
                .is_err()
        );
    }
    otp_service::verify(&db, PHONE, OtpPurpose::Register, &second.otp_code)
        .await
        .expect("latest code verifies");

    // Other purposes are untouched
    let login = otp_service::issue(&db, PHONE, OtpPurpose::Login).await.unwrap();
    let _ = otp_service::issue(&db, "+998907770001", OtpPurpose::Login).await.unwrap();
    assert_eq!(
        otp_service::pending_code(&db, PHONE, OtpPurpose::Login).await.unwrap(),
        Some(login.otp_code)
    );
}
