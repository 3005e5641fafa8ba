use base64::{Engine, engine::general_purpose::STANDARD};

use super::{CheckoutOrder, CheckoutProvider};
use crate::domain::AppResult;

/// Payme encodes the order as base64 `key=value` pairs in the path
pub struct Payme {
    pub api_url: String,
    pub merchant_id: String,
}

impl CheckoutProvider for Payme {
    fn checkout_url(&self, order: CheckoutOrder<'_>) -> AppResult<String> {
        let params = format!(
            "m={};ac.order_id={};a={}",
            self.merchant_id, order.transaction_id, order.amount_tiyin
        );
        Ok(format!("{}/{}", self.api_url, STANDARD.encode(params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_params() {
        let payme = Payme {
            api_url: "https://checkout.paycom.uz".into(),
            merchant_id: "abc".into(),
        };
        let url = payme
            .checkout_url(CheckoutOrder {
                transaction_id: "TXN-1",
                amount_tiyin: 500,
            })
            .unwrap();
        let encoded = url.rsplit('/').next().unwrap();
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "m=abc;ac.order_id=TXN-1;a=500");
    }
}
