//! Runtime configuration read from the process environment

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEV_SECRET_KEY: &str = "ilmspace-insecure-dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SECRET_KEY must be set when DEBUG is off")]
    MissingSecretKey,
    #[error("TELEGRAM_WEBHOOK_SECRET must be set when BOT_TOKEN is set and DEBUG is off")]
    MissingWebhookSecret,
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Merchant credentials for one payment provider
#[derive(Clone, Debug, Default)]
pub struct GatewayCredentials {
    pub merchant_id: String,
    pub secret_key: String,
    pub service_id: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub debug: bool,
    pub secret_key: String,
    pub allowed_hosts: Vec<String>,
    pub database_url: String,
    pub port: u16,
    pub workers: usize,
    pub request_timeout: Duration,
    pub static_root: PathBuf,
    pub media_root: PathBuf,
    pub cors_allowed_origins: Vec<String>,
    pub platform_commission_rate: f64,
    pub click: GatewayCredentials,
    pub payme: GatewayCredentials,
    pub uzum: GatewayCredentials,
    pub bot_token: String,
    pub telegram_api_url: String,
    pub telegram_webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let debug = get("DEBUG")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let secret_key = match get("SECRET_KEY") {
            Some(key) => key,
            None if debug => DEV_SECRET_KEY.to_string(),
            None => return Err(ConfigError::MissingSecretKey),
        };

        let port = match get("PORT") {
            Some(v) => v.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: v,
                reason: "expected a port number",
            })?,
            None => 8000,
        };

        let workers = positive_int(get("WORKERS").or_else(|| get("GUNICORN_WORKERS")), "WORKERS", 3)?;
        let timeout_secs = positive_int(
            get("REQUEST_TIMEOUT").or_else(|| get("GUNICORN_TIMEOUT")),
            "REQUEST_TIMEOUT",
            120,
        )?;

        let platform_commission_rate = match get("PLATFORM_COMMISSION_RATE") {
            Some(v) => match v.trim().parse::<f64>() {
                Ok(rate) if (0.0..=100.0).contains(&rate) => rate,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "PLATFORM_COMMISSION_RATE",
                        value: v,
                        reason: "expected a percentage between 0 and 100",
                    });
                }
            },
            None => 20.0,
        };

        // The webhook is unauthenticated without a shared secret
        let bot_token = text("BOT_TOKEN", "");
        let telegram_webhook_secret = get("TELEGRAM_WEBHOOK_SECRET");
        if !debug && !bot_token.is_empty() && telegram_webhook_secret.is_none() {
            return Err(ConfigError::MissingWebhookSecret);
        }

        Ok(Self {
            debug,
            secret_key,
            allowed_hosts: split_list(&text("ALLOWED_HOSTS", "localhost,127.0.0.1")),
            database_url: text("DATABASE_URL", "sqlite://ilmspace.db?mode=rwc"),
            port,
            workers,
            request_timeout: Duration::from_secs(timeout_secs as u64),
            static_root: PathBuf::from(text("STATIC_ROOT", "staticfiles")),
            media_root: PathBuf::from(text("MEDIA_ROOT", "media")),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            platform_commission_rate,
            click: GatewayCredentials {
                merchant_id: text("CLICK_MERCHANT_ID", ""),
                secret_key: text("CLICK_SECRET_KEY", ""),
                service_id: text("CLICK_SERVICE_ID", ""),
            },
            payme: GatewayCredentials {
                merchant_id: text("PAYME_MERCHANT_ID", ""),
                secret_key: text("PAYME_SECRET_KEY", ""),
                service_id: String::new(),
            },
            uzum: GatewayCredentials {
                merchant_id: text("UZUM_MERCHANT_ID", ""),
                secret_key: text("UZUM_SECRET_KEY", ""),
                service_id: String::new(),
            },
            bot_token,
            telegram_api_url: text("TELEGRAM_API_URL", "https://api.telegram.org")
                .trim_end_matches('/')
                .to_string(),
            telegram_webhook_secret,
        })
    }

    /// Host header check. `*` allows everything, a leading `.` matches the
    /// domain and all of its subdomains. Any `:port` suffix is ignored.
    pub fn host_allowed(&self, host: &str) -> bool {
        let host = strip_port(host).to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        self.allowed_hosts.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            if pattern == "*" {
                true
            } else if let Some(domain) = pattern.strip_prefix('.') {
                host == domain || host.ends_with(&pattern)
            } else {
                host == pattern
            }
        })
    }
}

fn positive_int(value: Option<String>, var: &'static str, default: usize) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid {
                var,
                value: v,
                reason: "expected a positive integer",
            }),
        },
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_port(host: &str) -> &str {
    let host = host.trim();
    // bracketed IPv6 literal
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default();
    }
    host.rsplit_once(':')
        .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
        .map(|(name, _)| name)
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_in_debug() {
        let cfg = config(&[("DEBUG", "True")]).unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.request_timeout, Duration::from_secs(120));
        assert_eq!(cfg.allowed_hosts, vec!["localhost", "127.0.0.1"]);
        assert_eq!(cfg.platform_commission_rate, 20.0);
        assert_eq!(cfg.telegram_api_url, "https://api.telegram.org");
        assert!(cfg.telegram_webhook_secret.is_none());
    }

    #[test]
    fn production_requires_secret() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingSecretKey)));
        assert!(config(&[("SECRET_KEY", "s3cret")]).is_ok());
    }

    #[test]
    fn bot_token_requires_webhook_secret_in_production() {
        assert!(matches!(
            config(&[("SECRET_KEY", "s3cret"), ("BOT_TOKEN", "123:abc")]),
            Err(ConfigError::MissingWebhookSecret)
        ));
        let cfg = config(&[
            ("SECRET_KEY", "s3cret"),
            ("BOT_TOKEN", "123:abc"),
            ("TELEGRAM_WEBHOOK_SECRET", "hook"),
        ])
        .unwrap();
        assert_eq!(cfg.telegram_webhook_secret.as_deref(), Some("hook"));

        // No bot, nothing to protect; DEBUG keeps local setups simple
        assert!(config(&[("SECRET_KEY", "s3cret")]).is_ok());
        assert!(config(&[("DEBUG", "1"), ("BOT_TOKEN", "123:abc")]).is_ok());
    }

    #[test]
    fn gunicorn_aliases_are_honoured() {
        let cfg = config(&[("DEBUG", "1"), ("GUNICORN_WORKERS", "5"), ("GUNICORN_TIMEOUT", "30")]).unwrap();
        assert_eq!(cfg.workers, 5);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));

        let cfg = config(&[("DEBUG", "1"), ("GUNICORN_WORKERS", "5"), ("WORKERS", "2")]).unwrap();
        assert_eq!(cfg.workers, 2);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config(&[("DEBUG", "1"), ("WORKERS", "0")]).is_err());
        assert!(config(&[("DEBUG", "1"), ("REQUEST_TIMEOUT", "soon")]).is_err());
        assert!(config(&[("DEBUG", "1"), ("PLATFORM_COMMISSION_RATE", "150")]).is_err());
        assert!(config(&[("DEBUG", "1"), ("PORT", "99999")]).is_err());
    }

    #[test]
    fn host_matching() {
        let cfg = config(&[("DEBUG", "1"), ("ALLOWED_HOSTS", "ilmspace.uz, .example.com,localhost")]).unwrap();
        assert!(cfg.host_allowed("ilmspace.uz"));
        assert!(cfg.host_allowed("localhost:8000"));
        assert!(cfg.host_allowed("example.com"));
        assert!(cfg.host_allowed("api.example.com"));
        assert!(!cfg.host_allowed("evil.com"));
        assert!(!cfg.host_allowed("notexample.com"));
        assert!(!cfg.host_allowed(""));

        let open = config(&[("DEBUG", "1"), ("ALLOWED_HOSTS", "*")]).unwrap();
        assert!(open.host_allowed("anything.test"));
    }
}
