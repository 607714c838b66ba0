use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;

use crate::errors::{ServiceError, ServiceResult};

/// Runtime configuration threaded explicitly into the services that need it
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Public base URL used to build booking links in notifications
    pub site_url: String,
    pub default_from_email: String,
    pub support_emails: Vec<String>,
    /// HMAC key for opaque user tokens
    pub user_token_secret: String,
    /// Lowest final price allowed, as a percentage of the base price
    pub min_price_percent: Decimal,
    pub api_version: String,
}

impl AppConfig {
    pub const DEFAULT_MIN_PRICE_PERCENT: Decimal = dec!(80);

    /// Load configuration from the process environment, reading `.env` first when present.
    pub fn from_env() -> ServiceResult<Self> {
        let _ = dotenv::dotenv();

        let user_token_secret = env::var("USER_TOKEN_SECRET")
            .map_err(|_| ServiceError::Configuration("USER_TOKEN_SECRET is not set".to_string()))?;
        if user_token_secret.is_empty() {
            return Err(ServiceError::Configuration("USER_TOKEN_SECRET is empty".to_string()));
        }

        let min_price_percent = match env::var("MIN_PRICE_PERCENT") {
            Ok(raw) => Decimal::from_str(raw.trim()).map_err(|_| {
                ServiceError::Configuration(format!("MIN_PRICE_PERCENT is not a number: {}", raw))
            })?,
            Err(_) => Self::DEFAULT_MIN_PRICE_PERCENT,
        };
        if min_price_percent < Decimal::ZERO || min_price_percent > dec!(100) {
            return Err(ServiceError::Configuration(format!(
                "MIN_PRICE_PERCENT must be between 0 and 100, got {}",
                min_price_percent
            )));
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://rental.db".to_string()),
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@localhost".to_string()),
            support_emails: env::var("SUPPORT_EMAILS")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),
            user_token_secret,
            min_price_percent,
            api_version: env::var("API_VERSION").unwrap_or_else(|_| "v1".to_string()),
        })
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            site_url: "https://rentals.test".to_string(),
            default_from_email: "noreply@rentals.test".to_string(),
            support_emails: vec!["support@rentals.test".to_string()],
            user_token_secret: "test-secret".to_string(),
            min_price_percent: Self::DEFAULT_MIN_PRICE_PERCENT,
            api_version: "v1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_list() {
        assert_eq!(
            parse_email_list(" a@x.io, ,b@x.io "),
            vec!["a@x.io".to_string(), "b@x.io".to_string()]
        );
        assert!(parse_email_list("").is_empty());
    }
}
