//! Uzbek mobile number handling

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::AppError;

static UZ_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+998[0-9]{9}$").expect("static phone pattern"));

/// Validate a `+998XXXXXXXXX` number, returning it trimmed.
pub fn validate_phone(raw: &str) -> Result<String, AppError> {
    let phone = raw.trim();
    if UZ_PHONE.is_match(phone) {
        Ok(phone.to_string())
    } else {
        Err(AppError::validation(
            "Phone number must be in format: +998XXXXXXXXX",
        ))
    }
}

/// Telegram contacts may arrive without the leading '+'
pub fn normalize_contact_phone(raw: &str) -> String {
    let digits = raw.trim();
    if digits.starts_with('+') {
        digits.to_string()
    } else {
        format!("+{digits}")
    }
}

pub fn looks_like_phone(identifier: &str) -> bool {
    identifier.trim_start().starts_with('+')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uzbek_numbers() {
        assert_eq!(validate_phone(" +998901234567 ").unwrap(), "+998901234567");
    }

    #[test]
    fn rejects_malformed_numbers() {
        for bad in ["998901234567", "+99890123456", "+9989012345678", "+7901234567", "+998 90 123 45 67"] {
            assert!(validate_phone(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn normalizes_contact() {
        assert_eq!(normalize_contact_phone("998901234567"), "+998901234567");
        assert_eq!(normalize_contact_phone("+998901234567"), "+998901234567");
    }
}
