use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::request_registration_otp,
        api::auth::login,
        api::catalog::list_courses,
        api::catalog::course_detail,
        api::learning::verify_certificate,
        api::payments::checkout,
        api::payments::gateway_callback,
    ),
    tags(
        (name = "ilmspace", description = "IlmSpace marketplace API")
    )
)]
pub struct ApiDoc;
