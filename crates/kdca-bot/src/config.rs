//! Application configuration.
//!
//! Loaded once from TOML before anything runs. `KDCA_API_KEY` and
//! `KDCA_SECRET_KEY` override the file's credentials so secrets can stay
//! out of the config file.

use crate::error::{AppError, AppResult};
use kdca_core::{DcaTarget, DEFAULT_PRICE_MARGIN};
use kdca_exchange::{Backoff, ClientConfig, Credentials, RetryConfig, DEFAULT_API_URL};
use kdca_schedule::{CronTrigger, ScheduleSpec, ScheduleTimezone};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_ENV: &str = "KDCA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const API_KEY_ENV: &str = "KDCA_API_KEY";
pub const SECRET_KEY_ENV: &str = "KDCA_SECRET_KEY";

/// Backoff for read-only requests (ticker, balance, closed orders).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.base_delay_ms),
                factor: 2.0,
                max: Duration::from_millis(self.max_delay_ms),
                jitter: self.jitter,
            },
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Balance key of the fiat currency spent (e.g., "ZEUR").
    pub base_currency: String,
    /// Display symbol used in log lines (e.g., "€").
    #[serde(default)]
    pub base_currency_symbol: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Subtracted from the rounded best bid to get the limit price.
    #[serde(default = "default_price_margin")]
    pub price_margin: Decimal,
    /// Send orders with `validate=true`; nothing is placed.
    #[serde(default)]
    pub validate_only: bool,
    /// Timezone the schedule is evaluated in.
    #[serde(default)]
    pub timezone: ScheduleTimezone,
    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub credentials: Credentials,
    pub schedule: ScheduleSpec,
    #[serde(rename = "dca", default)]
    pub dca_targets: Vec<DcaTarget>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_price_margin() -> Decimal {
    DEFAULT_PRICE_MARGIN
}

impl AppConfig {
    /// Config path: CLI arg > `KDCA_CONFIG` > `config/default.toml`.
    pub fn resolve_path(cli: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> String {
        cli.or_else(|| lookup(CONFIG_ENV).filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Read a file and apply environment overrides. Does not validate.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Replace credentials with non-empty values from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty(API_KEY_ENV) {
            self.credentials.api_key = key;
        }
        if let Some(secret) = non_empty(SECRET_KEY_ENV) {
            self.credentials.secret_key = secret;
        }
    }

    /// Reject configurations that cannot produce a single valid run.
    ///
    /// # Errors
    /// `AppError::Config` for missing credentials or targets and bad numbers;
    /// `AppError::Schedule` for an invalid schedule.
    pub fn validate(&self) -> AppResult<()> {
        if self.credentials.is_empty() {
            return Err(AppError::Config(format!(
                "credentials missing: set [credentials] or {API_KEY_ENV}/{SECRET_KEY_ENV}"
            )));
        }
        if self.base_currency.trim().is_empty() {
            return Err(AppError::Config("base_currency is empty".to_string()));
        }
        if self.dca_targets.is_empty() {
            return Err(AppError::Config("no [[dca]] targets configured".to_string()));
        }
        for target in &self.dca_targets {
            target
                .validate()
                .map_err(|e| AppError::Config(e.to_string()))?;
        }
        if self.price_margin.is_sign_negative() {
            return Err(AppError::Config(format!(
                "price_margin must not be negative, got {}",
                self.price_margin
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config("request_timeout_secs must be positive".to_string()));
        }
        CronTrigger::new(&self.schedule)?;
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry: self.retry.to_retry_config(),
            validate_only: self.validate_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdca_schedule::{FieldValue, ScheduleError};
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        base_currency = "ZEUR"
        base_currency_symbol = "€"

        [credentials]
        api_key = "file-key"
        secret_key = "c2VjcmV0"

        [schedule]
        hour = 18
        minute = 0

        [[dca]]
        pair = "XXBTZEUR"
        amount_worth = "10"
        symbol = "BTC"

        [[dca]]
        pair = "XETHZEUR"
        amount_worth = "5.50"
        symbol = "ETH"
    "#;

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.base_currency, "ZEUR");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.price_margin, dec!(0.5));
        assert!(!config.validate_only);
        assert_eq!(config.timezone, ScheduleTimezone::Local);
        assert_eq!(config.schedule.hour, Some(FieldValue::Number(18)));
        assert_eq!(config.dca_targets.len(), 2);
        assert_eq!(config.dca_targets[1].amount_worth, dec!(5.50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_replace_credentials() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.apply_overrides(|name| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            SECRET_KEY_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.credentials.api_key, "env-key");
        // Blank values do not clobber the file
        assert_eq!(config.credentials.secret_key, "c2VjcmV0");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let raw = SAMPLE.replace("api_key = \"file-key\"", "api_key = \"\"");
        let config = AppConfig::from_toml_str(&raw).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_non_positive_budget_rejected() {
        let raw = SAMPLE.replace("amount_worth = \"5.50\"", "amount_worth = \"0\"");
        let config = AppConfig::from_toml_str(&raw).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.dca_targets.clear();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.schedule.minute = Some("*/0".into());
        assert!(matches!(
            config.validate(),
            Err(AppError::Schedule(ScheduleError::InvalidExpression { .. }))
        ));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let raw = SAMPLE.replace(
            "minute = 0",
            "minute = 0\nstart_date = \"2025-06-01\"\nend_date = \"2025-01-01\"",
        );
        let config = AppConfig::from_toml_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(AppError::Schedule(ScheduleError::EndBeforeStart { .. }))
        ));
    }

    #[test]
    fn test_unknown_schedule_field_is_parse_error() {
        let raw = SAMPLE.replace("minute = 0", "minutes = 0");
        assert!(matches!(AppConfig::from_toml_str(&raw), Err(AppError::Config(_))));
    }

    #[test]
    fn test_client_config_mapping() {
        let raw = format!(
            "api_url = \"http://127.0.0.1:8080\"\nrequest_timeout_secs = 5\nvalidate_only = true\ntimezone = \"utc\"\n{SAMPLE}"
        );
        let config = AppConfig::from_toml_str(&raw).unwrap();
        let client = config.client_config();

        assert_eq!(client.base_url, "http://127.0.0.1:8080");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert!(client.validate_only);
        assert_eq!(client.retry.max_retries, 2);
        assert_eq!(config.timezone, ScheduleTimezone::Utc);
    }

    #[test]
    fn test_resolve_path_fallback_order() {
        let env = |name: &str| (name == CONFIG_ENV).then(|| "from-env.toml".to_string());
        let no_env = |_: &str| None;

        assert_eq!(
            AppConfig::resolve_path(Some("custom.toml".to_string()), env),
            "custom.toml"
        );
        assert_eq!(AppConfig::resolve_path(None, env), "from-env.toml");
        assert_eq!(AppConfig::resolve_path(None, no_env), DEFAULT_CONFIG_PATH);
        assert_eq!(
            AppConfig::resolve_path(None, |_: &str| Some(" ".to_string())),
            DEFAULT_CONFIG_PATH
        );
    }

    #[test]
    fn test_retry_settings_mapping() {
        let raw = format!("{SAMPLE}\n[retry]\nmax_retries = 4\nbase_delay_ms = 100\njitter = false\n");
        let config = AppConfig::from_toml_str(&raw).unwrap();
        let retry = config.retry.to_retry_config();

        assert_eq!(retry.max_retries, 4);
        assert_eq!(
            retry.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(100),
                factor: 2.0,
                max: Duration::from_millis(5_000),
                jitter: false,
            }
        );
        assert!(AppConfig::from_toml_str(SAMPLE).unwrap().retry.jitter);
    }
}
