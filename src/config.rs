//! Kiosk configuration.
//!
//! Values resolve in three layers: built-in defaults, the `kiosk` category
//! of the local settings table, then `SHARETEA_*` environment variables.
//! A value that fails to parse is logged and the lower layer wins.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::api;
use crate::db::{self, DbState};
use crate::error::{KioskError, KioskResult};
use crate::money;
use crate::pricing::{DiscountPolicy, PricingEngine};

const SETTINGS_CATEGORY: &str = "kiosk";

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_LOG_FILTER: &str = "info,sharetea_kiosk_lib=debug";

const KEY_API_URL: &str = "api_url";
const KEY_EMPLOYEE_ID: &str = "employee_id";
const KEY_TAX_RATE: &str = "tax_rate";
const KEY_DISCOUNT_POLICY: &str = "discount_policy";
const KEY_REQUEST_TIMEOUT: &str = "request_timeout_secs";
const KEY_LOG_FILTER: &str = "log_filter";

const ENV_API_URL: &str = "SHARETEA_API_URL";
const ENV_EMPLOYEE_ID: &str = "SHARETEA_EMPLOYEE_ID";
const ENV_TAX_RATE: &str = "SHARETEA_TAX_RATE";
const ENV_DISCOUNT_POLICY: &str = "SHARETEA_DISCOUNT_POLICY";
const ENV_REQUEST_TIMEOUT: &str = "SHARETEA_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct KioskConfig {
    pub api_url: String,
    /// Employee credited with kiosk orders when nobody is signed in.
    pub employee_id: Option<String>,
    pub tax_rate: Decimal,
    pub discount_policy: DiscountPolicy,
    pub request_timeout: Duration,
    pub log_filter: String,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            employee_id: None,
            tax_rate: money::DEFAULT_TAX_RATE,
            discount_policy: DiscountPolicy::default(),
            request_timeout: api::DEFAULT_TIMEOUT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parse_tax_rate(raw: &str) -> Result<Decimal, String> {
    let rate = Decimal::from_str(raw.trim()).map_err(|e| e.to_string())?;
    if rate.is_sign_negative() || rate >= Decimal::ONE {
        return Err(format!("tax rate {rate} must be in [0, 1)"));
    }
    Ok(rate)
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
    if secs == 0 {
        return Err("timeout must be at least 1 second".into());
    }
    Ok(Duration::from_secs(secs))
}

impl KioskConfig {
    /// Resolve configuration from defaults, the settings table (if given)
    /// and the environment.
    pub fn load(db: Option<&DbState>) -> KioskResult<Self> {
        let mut config = Self::default();

        if let Some(db) = db {
            let conn = db
                .conn
                .lock()
                .map_err(|e| KioskError::Storage(e.to_string()))?;
            config.apply_layer("settings", |key| {
                db::get_setting(&conn, SETTINGS_CATEGORY, key)
            });
        }

        config.apply_layer("env", |key| {
            let env_key = match key {
                KEY_API_URL => ENV_API_URL,
                KEY_EMPLOYEE_ID => ENV_EMPLOYEE_ID,
                KEY_TAX_RATE => ENV_TAX_RATE,
                KEY_DISCOUNT_POLICY => ENV_DISCOUNT_POLICY,
                KEY_REQUEST_TIMEOUT => ENV_REQUEST_TIMEOUT,
                _ => return None,
            };
            std::env::var(env_key).ok()
        });

        info!(
            api_url = %config.api_url,
            tax_rate = %config.tax_rate,
            discount_policy = %config.discount_policy,
            employee_configured = config.employee_id.is_some(),
            "kiosk configuration loaded"
        );
        Ok(config)
    }

    fn apply_layer(&mut self, source: &str, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(KEY_API_URL) {
            self.api_url = api::normalize_api_url(&url);
        }
        if let Some(id) = get(KEY_EMPLOYEE_ID) {
            self.employee_id = Some(id.trim().to_string());
        }
        if let Some(raw) = get(KEY_TAX_RATE) {
            match parse_tax_rate(&raw) {
                Ok(rate) => self.tax_rate = rate,
                Err(e) => warn!(source, key = KEY_TAX_RATE, error = %e, "ignoring invalid setting"),
            }
        }
        if let Some(raw) = get(KEY_DISCOUNT_POLICY) {
            match raw.parse::<DiscountPolicy>() {
                Ok(policy) => self.discount_policy = policy,
                Err(e) => {
                    warn!(source, key = KEY_DISCOUNT_POLICY, error = %e, "ignoring invalid setting")
                }
            }
        }
        if let Some(raw) = get(KEY_REQUEST_TIMEOUT) {
            match parse_timeout(&raw) {
                Ok(timeout) => self.request_timeout = timeout,
                Err(e) => {
                    warn!(source, key = KEY_REQUEST_TIMEOUT, error = %e, "ignoring invalid setting")
                }
            }
        }
        if let Some(filter) = get(KEY_LOG_FILTER) {
            self.log_filter = filter;
        }
    }

    /// Persist the current values to the settings table.
    pub fn save(&self, db: &DbState) -> KioskResult<()> {
        let conn = db
            .conn
            .lock()
            .map_err(|e| KioskError::Storage(e.to_string()))?;
        db::set_setting(&conn, SETTINGS_CATEGORY, KEY_API_URL, &self.api_url)?;
        match &self.employee_id {
            Some(id) => db::set_setting(&conn, SETTINGS_CATEGORY, KEY_EMPLOYEE_ID, id)?,
            None => db::delete_setting(&conn, SETTINGS_CATEGORY, KEY_EMPLOYEE_ID)?,
        }
        db::set_setting(
            &conn,
            SETTINGS_CATEGORY,
            KEY_TAX_RATE,
            &self.tax_rate.to_string(),
        )?;
        db::set_setting(
            &conn,
            SETTINGS_CATEGORY,
            KEY_DISCOUNT_POLICY,
            &self.discount_policy.to_string(),
        )?;
        db::set_setting(
            &conn,
            SETTINGS_CATEGORY,
            KEY_REQUEST_TIMEOUT,
            &self.request_timeout.as_secs().to_string(),
        )?;
        db::set_setting(&conn, SETTINGS_CATEGORY, KEY_LOG_FILTER, &self.log_filter)?;
        Ok(())
    }

    pub fn pricing_engine(&self) -> PricingEngine {
        PricingEngine::new(self.tax_rate, self.discount_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            ENV_API_URL,
            ENV_EMPLOYEE_ID,
            ENV_TAX_RATE,
            ENV_DISCOUNT_POLICY,
            ENV_REQUEST_TIMEOUT,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_db_or_env() {
        clear_env();
        let config = KioskConfig::load(None).unwrap();
        assert_eq!(config, KioskConfig::default());
        assert_eq!(config.tax_rate, dec!(0.0825));
        assert_eq!(config.discount_policy, DiscountPolicy::Sticky);
    }

    #[test]
    #[serial]
    fn test_settings_layer_then_env_override() {
        clear_env();
        let db = db::open_in_memory().unwrap();
        {
            let conn = db.conn.lock().unwrap();
            db::set_setting(&conn, "kiosk", "api_url", "backend.local/").unwrap();
            db::set_setting(&conn, "kiosk", "employee_id", "e-42").unwrap();
            db::set_setting(&conn, "kiosk", "discount_policy", "clear_on_change").unwrap();
        }
        std::env::set_var(ENV_API_URL, "localhost:8080");

        let config = KioskConfig::load(Some(&db)).unwrap();
        clear_env();

        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.employee_id.as_deref(), Some("e-42"));
        assert_eq!(config.discount_policy, DiscountPolicy::ClearOnChange);
    }

    #[test]
    #[serial]
    fn test_invalid_values_keep_lower_layer() {
        clear_env();
        std::env::set_var(ENV_TAX_RATE, "eight percent");
        std::env::set_var(ENV_REQUEST_TIMEOUT, "0");
        std::env::set_var(ENV_DISCOUNT_POLICY, "sometimes");
        let config = KioskConfig::load(None).unwrap();
        clear_env();

        assert_eq!(config.tax_rate, money::DEFAULT_TAX_RATE);
        assert_eq!(config.request_timeout, api::DEFAULT_TIMEOUT);
        assert_eq!(config.discount_policy, DiscountPolicy::Sticky);
    }

    #[test]
    #[serial]
    fn test_save_then_load_roundtrip() {
        clear_env();
        let db = db::open_in_memory().unwrap();
        let config = KioskConfig {
            api_url: "https://api.sharetea.example".into(),
            employee_id: Some("e-7".into()),
            tax_rate: dec!(0.0625),
            discount_policy: DiscountPolicy::ClearOnChange,
            request_timeout: Duration::from_secs(12),
            log_filter: "warn".into(),
        };
        config.save(&db).unwrap();
        assert_eq!(KioskConfig::load(Some(&db)).unwrap(), config);
    }

    #[test]
    fn test_tax_rate_bounds() {
        assert!(parse_tax_rate("0.0825").is_ok());
        assert!(parse_tax_rate("0").is_ok());
        assert!(parse_tax_rate("-0.01").is_err());
        assert!(parse_tax_rate("1.5").is_err());
    }

    #[test]
    fn test_pricing_engine_uses_configured_rate() {
        let config = KioskConfig {
            tax_rate: dec!(0.10),
            ..KioskConfig::default()
        };
        let engine = config.pricing_engine();
        assert_eq!(engine.tax_rate(), dec!(0.10));
        assert_eq!(engine.policy(), DiscountPolicy::Sticky);
    }
}
