//! Request metadata extractors

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
};
use std::convert::Infallible;

use crate::domain::AppError;
use crate::services::moderation_service::AuditContext;

/// JSON body whose rejections use the API error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Client address as seen behind a reverse proxy: the first
/// `X-Forwarded-For` entry, else `X-Real-IP`.
pub fn client_ip(parts: &Parts) -> Option<String> {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header("x-real-ip"))
        .map(str::to_string)
}

/// Audit metadata for admin handlers
pub struct ClientMeta(pub AuditContext);

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(ClientMeta(AuditContext {
            ip: client_ip(parts),
            user_agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let p = parts(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(client_ip(&p).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn falls_back_to_real_ip() {
        let p = parts(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_ip(&p).as_deref(), Some("198.51.100.4"));
        assert_eq!(client_ip(&parts(&[])), None);
    }
}
