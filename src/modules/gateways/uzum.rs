use url::Url;

use super::{CheckoutOrder, CheckoutProvider, format_uzs};
use crate::domain::{AppError, AppResult};

pub struct Uzum {
    pub api_url: String,
    pub merchant_id: String,
}

impl CheckoutProvider for Uzum {
    fn checkout_url(&self, order: CheckoutOrder<'_>) -> AppResult<String> {
        let amount = format_uzs(order.amount_tiyin);
        let url = Url::parse_with_params(
            &format!("{}/checkout", self.api_url),
            &[
                ("merchant_id", self.merchant_id.as_str()),
                ("order_id", order.transaction_id),
                ("amount", amount.as_str()),
            ],
        )
        .map_err(|e| AppError::Internal(format!("bad Uzum URL: {e}")))?;
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_checkout_url() {
        let uzum = Uzum {
            api_url: "https://checkout.uzum.uz".into(),
            merchant_id: "u-1".into(),
        };
        let url = uzum
            .checkout_url(CheckoutOrder {
                transaction_id: "TXN-20250101000000-ABCDEF12",
                amount_tiyin: 10_000_050,
            })
            .unwrap();
        assert_eq!(
            url,
            "https://checkout.uzum.uz/checkout?merchant_id=u-1&order_id=TXN-20250101000000-ABCDEF12&amount=100000.50"
        );
    }
}
