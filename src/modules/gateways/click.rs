use url::Url;

use super::{CheckoutOrder, CheckoutProvider, format_uzs};
use crate::domain::{AppError, AppResult};

pub struct Click {
    pub api_url: String,
    pub merchant_id: String,
    pub service_id: String,
}

impl CheckoutProvider for Click {
    fn checkout_url(&self, order: CheckoutOrder<'_>) -> AppResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/services/pay", self.api_url),
            &[
                ("service_id", self.service_id.as_str()),
                ("merchant_id", self.merchant_id.as_str()),
                ("amount", format_uzs(order.amount_tiyin).as_str()),
                ("transaction_param", order.transaction_id),
            ],
        )
        .map_err(|e| AppError::Internal(format!("bad Click URL: {e}")))?;
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_pay_url() {
        let click = Click {
            api_url: "https://my.click.uz".into(),
            merchant_id: "m1".into(),
            service_id: "77".into(),
        };
        let url = click
            .checkout_url(CheckoutOrder {
                transaction_id: "TXN-20250101000000-ABCDEF12",
                amount_tiyin: 9_900_000,
            })
            .unwrap();
        assert_eq!(
            url,
            "https://my.click.uz/services/pay?service_id=77&merchant_id=m1&amount=99000.00&transaction_param=TXN-20250101000000-ABCDEF12"
        );
    }
}
