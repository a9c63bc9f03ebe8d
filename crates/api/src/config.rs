//! Application configuration loaded from environment variables.

use domain::{
    Charges, DEFAULT_DELIVERY_CHARGE, DEFAULT_EXCHANGE_FACTOR, DEFAULT_OTHER_CHARGES, Money,
    OrderComposer,
};
use std::time::Duration;

use rust_decimal::Decimal;

const DEFAULT_PAYMENT_BACKEND_URL: &str = "http://127.0.0.1:8081";
const DEFAULT_MERCHANT_DISPLAY_NAME: &str = "Fake Store";
const DEFAULT_SESSION_IDLE_SECS: u64 = 900;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres document store; unset means in-memory
/// - `PAYMENT_BACKEND_URL`: payment-sheet backend (default: `http://127.0.0.1:8081`)
/// - `MERCHANT_DISPLAY_NAME`: shown on the payment sheet (default: `"Fake Store"`)
/// - `EXCHANGE_FACTOR`, `DELIVERY_CHARGE`, `OTHER_CHARGES`: order pricing
///   (defaults: `85`, `50`, `20`)
/// - `SESSION_IDLE_SECS`: idle time before a user session and its cart
///   subscription are closed (default: `900`)
///
/// Unparseable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub payment_backend_url: String,
    pub merchant_display_name: String,
    pub exchange_factor: Decimal,
    pub delivery_charge: Decimal,
    pub other_charges: Decimal,
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed_var("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            payment_backend_url: std::env::var("PAYMENT_BACKEND_URL")
                .unwrap_or(defaults.payment_backend_url),
            merchant_display_name: std::env::var("MERCHANT_DISPLAY_NAME")
                .unwrap_or(defaults.merchant_display_name),
            exchange_factor: parsed_var("EXCHANGE_FACTOR").unwrap_or(defaults.exchange_factor),
            delivery_charge: parsed_var("DELIVERY_CHARGE").unwrap_or(defaults.delivery_charge),
            other_charges: parsed_var("OTHER_CHARGES").unwrap_or(defaults.other_charges),
            session_idle_timeout: parsed_var("SESSION_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_idle_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn charges(&self) -> Charges {
        Charges::new(
            Money::new(self.delivery_charge),
            Money::new(self.other_charges),
        )
    }

    pub fn composer(&self) -> OrderComposer {
        OrderComposer::new(self.exchange_factor)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            payment_backend_url: DEFAULT_PAYMENT_BACKEND_URL.to_string(),
            merchant_display_name: DEFAULT_MERCHANT_DISPLAY_NAME.to_string(),
            exchange_factor: Decimal::from(DEFAULT_EXCHANGE_FACTOR),
            delivery_charge: Decimal::from(DEFAULT_DELIVERY_CHARGE),
            other_charges: Decimal::from(DEFAULT_OTHER_CHARGES),
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
