// src/config.rs

use crate::core::risk::RiskConfig;
use crate::error::TradingError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct StrategyConfig {
    pub short_window: usize,
    pub long_window: usize,
}

/// Raw risk inputs. Kept as strings so a malformed value falls back to its
/// default instead of failing startup.
#[derive(Debug, Deserialize, Clone)]
pub struct RiskInputs {
    pub position_size_usd: String,
    pub stop_loss_pct: String,
    pub take_profit_pct: String,
}

impl RiskInputs {
    pub fn to_risk_config(&self) -> RiskConfig {
        RiskConfig::from_inputs(
            &self.position_size_usd,
            &self.stop_loss_pct,
            &self.take_profit_pct,
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub asset_id: String,
    pub vs_currency: String,
    pub price_api_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub starting_equity: Decimal,
    pub autostart: bool,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub strategy: StrategyConfig,
    pub risk: RiskInputs,
}

impl AppConfig {
    /// Defaults, then an optional `Settings.*` file, then `APP_*` env vars
    /// (`APP_RISK__STOP_LOSS_PCT=0.015`).
    pub fn new() -> Result<Self, TradingError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("Settings").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, TradingError> {
        Ok(Config::builder()
            .set_default("asset_id", "bitcoin")?
            .set_default("vs_currency", "usd")?
            .set_default("price_api_url", "https://api.coingecko.com/api/v3")?
            .set_default("poll_interval_secs", 60)?
            .set_default("request_timeout_secs", 5)?
            .set_default("starting_equity", "10000")?
            .set_default("autostart", true)?
            .set_default("log_level", "info")?
            .set_default("strategy.short_window", 20)?
            .set_default("strategy.long_window", 50)?
            .set_default("risk.position_size_usd", "200")?
            .set_default("risk.stop_loss_pct", "0.01")?
            .set_default("risk.take_profit_pct", "0.02")?)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, TradingError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), TradingError> {
        if self.poll_interval_secs == 0 {
            return Err(TradingError::InvalidSetting {
                key: "poll_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(TradingError::InvalidSetting {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.starting_equity <= Decimal::ZERO {
            return Err(TradingError::InvalidSetting {
                key: "starting_equity",
                reason: format!("{} must be > 0", self.starting_equity),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use rust_decimal_macros::dec;

    fn from_toml(toml: &str) -> Result<AppConfig, TradingError> {
        AppConfig::finish(AppConfig::defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_when_no_sources() {
        let cfg = from_toml("").unwrap();
        assert_eq!(cfg.asset_id, "bitcoin");
        assert_eq!(cfg.poll_interval_secs, 60);
        assert_eq!(cfg.request_timeout_secs, 5);
        assert_eq!(cfg.starting_equity, dec!(10000));
        assert_eq!(cfg.strategy.short_window, 20);
        assert_eq!(cfg.strategy.long_window, 50);
        assert!(cfg.log_dir.is_none());
        assert_eq!(cfg.risk.to_risk_config(), RiskConfig::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let cfg = from_toml(
            r#"
            asset_id = "ethereum"
            poll_interval_secs = 15
            starting_equity = "2500.50"

            [strategy]
            short_window = 5
            long_window = 10

            [risk]
            position_size_usd = "50"
            stop_loss_pct = "0.05"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.asset_id, "ethereum");
        assert_eq!(cfg.poll_interval_secs, 15);
        assert_eq!(cfg.starting_equity, dec!(2500.50));
        assert_eq!(cfg.strategy.long_window, 10);
        let risk = cfg.risk.to_risk_config();
        assert_eq!(risk.position_size_usd(), dec!(50));
        assert_eq!(risk.stop_loss_pct(), dec!(0.05));
        assert_eq!(risk.take_profit_pct(), dec!(0.02));
    }

    #[test]
    fn malformed_risk_input_falls_back() {
        let cfg = from_toml(
            r#"
            [risk]
            take_profit_pct = "lots"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.risk.to_risk_config().take_profit_pct(), dec!(0.02));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = from_toml("poll_interval_secs = 0").unwrap_err();
        assert!(matches!(
            err,
            TradingError::InvalidSetting {
                key: "poll_interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn negative_equity_is_rejected() {
        assert!(from_toml(r#"starting_equity = "-1""#).is_err());
    }
}
