//! Payment provider adapters
//!
//! Each provider turns a pending transaction into the URL the payer is sent
//! to. Provider callbacks are authenticated with an HMAC-SHA256 signature
//! over a canonical payload.

pub mod click;
pub mod payme;
pub mod uzum;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::{AppError, AppResult, Gateway};
use crate::models::payment_gateway_config;

type HmacSha256 = Hmac<Sha256>;

/// What a provider needs to know about the order being paid
#[derive(Debug, Clone, Copy)]
pub struct CheckoutOrder<'a> {
    pub transaction_id: &'a str,
    pub amount_tiyin: i64,
}

pub trait CheckoutProvider: Send + Sync {
    fn checkout_url(&self, order: CheckoutOrder<'_>) -> AppResult<String>;
}

/// Default API base for a provider when the stored config has none
pub fn default_api_url(gateway: Gateway) -> &'static str {
    match gateway {
        Gateway::Click => "https://my.click.uz",
        Gateway::Payme => "https://checkout.paycom.uz",
        Gateway::Uzum => "https://checkout.uzum.uz",
    }
}

pub fn provider(
    gateway: Gateway,
    cfg: &payment_gateway_config::Model,
) -> AppResult<Box<dyn CheckoutProvider>> {
    let api_url = if cfg.api_url.trim().is_empty() {
        default_api_url(gateway).to_string()
    } else {
        cfg.api_url.trim_end_matches('/').to_string()
    };
    let merchant_id = cfg.merchant_id.trim().to_string();
    if merchant_id.is_empty() || cfg.secret_key.is_empty() {
        return Err(AppError::validation(format!("{gateway} payments are not configured")));
    }

    Ok(match gateway {
        Gateway::Click => {
            let extra: serde_json::Value = serde_json::from_str(&cfg.config).unwrap_or_default();
            let service_id = extra
                .get("service_id")
                .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| AppError::validation("Click payments need a service_id"))?;
            Box::new(click::Click {
                api_url,
                merchant_id,
                service_id,
            })
        }
        Gateway::Payme => Box::new(payme::Payme {
            api_url,
            merchant_id,
        }),
        Gateway::Uzum => Box::new(uzum::Uzum {
            api_url,
            merchant_id,
        }),
    })
}

/// Canonical string covered by a callback signature
pub fn callback_payload(
    transaction_id: &str,
    gateway_transaction_id: &str,
    amount: i64,
    status: &str,
) -> String {
    format!("{transaction_id}|{gateway_transaction_id}|{amount}|{status}")
}

/// Lowercase hex HMAC-SHA256
pub fn sign(secret: &str, payload: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. An empty secret never verifies.
pub fn verify_signature(secret: &str, payload: &str, signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Tiyin as a UZS decimal string, e.g. 150000 -> "1500.00"
pub fn format_uzs(amount_tiyin: i64) -> String {
    format!("{}.{:02}", amount_tiyin / 100, (amount_tiyin % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifies_and_rejects_tampering() {
        let payload = callback_payload("TXN-1", "G-9", 150000, "success");
        assert_eq!(payload, "TXN-1|G-9|150000|success");
        let sig = sign("topsecret", &payload).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_signature("topsecret", &payload, &sig));
        assert!(verify_signature("topsecret", &payload, &sig.to_uppercase()));

        let tampered = callback_payload("TXN-1", "G-9", 1, "success");
        assert!(!verify_signature("topsecret", &tampered, &sig));
        assert!(!verify_signature("other", &payload, &sig));
        assert!(!verify_signature("", &payload, &sig));
        assert!(!verify_signature("topsecret", &payload, "not-hex"));
    }

    fn row(gateway: Gateway, merchant_id: &str, secret_key: &str, config: &str) -> payment_gateway_config::Model {
        payment_gateway_config::Model {
            id: 1,
            gateway: gateway.as_str().to_string(),
            is_active: true,
            merchant_id: merchant_id.into(),
            secret_key: secret_key.into(),
            api_url: String::new(),
            commission_percentage: 2.0,
            config: config.into(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn provider_requires_credentials() {
        let order = CheckoutOrder {
            transaction_id: "TXN-1",
            amount_tiyin: 100,
        };
        assert!(provider(Gateway::Uzum, &row(Gateway::Uzum, "", "k", "{}")).is_err());
        assert!(provider(Gateway::Payme, &row(Gateway::Payme, "m", "", "{}")).is_err());
        assert!(provider(Gateway::Click, &row(Gateway::Click, "m", "k", "{}")).is_err());

        let click = provider(Gateway::Click, &row(Gateway::Click, "m", "k", r#"{"service_id":77}"#)).unwrap();
        assert!(click.checkout_url(order).unwrap().contains("service_id=77"));
        let uzum = provider(Gateway::Uzum, &row(Gateway::Uzum, "m", "k", "{}")).unwrap();
        assert!(uzum.checkout_url(order).unwrap().starts_with("https://checkout.uzum.uz/"));
    }

    #[test]
    fn formats_uzs() {
        assert_eq!(format_uzs(150000), "1500.00");
        assert_eq!(format_uzs(5), "0.05");
    }
}
