// src/core/risk.rs
use crate::error::TradingError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_POSITION_SIZE_USD: Decimal = Decimal::from_parts(200, 0, 0, false, 0);
pub const DEFAULT_STOP_LOSS_PCT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const DEFAULT_TAKE_PROFIT_PCT: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Sizing and exit thresholds applied at entry time.
///
/// Fields are private so a value can only exist in a validated state;
/// changing risk means building a new `RiskConfig` and swapping it in whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskConfig {
    position_size_usd: Decimal,
    stop_loss_pct: Decimal,
    take_profit_pct: Decimal,
}

/// Which risk parameter an operator edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskField {
    PositionSize,
    StopLoss,
    TakeProfit,
}

impl RiskField {
    fn key(self) -> &'static str {
        match self {
            RiskField::PositionSize => "position_size_usd",
            RiskField::StopLoss => "stop_loss_pct",
            RiskField::TakeProfit => "take_profit_pct",
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            position_size_usd: DEFAULT_POSITION_SIZE_USD,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
        }
    }
}

impl RiskConfig {
    /// Strict constructor for known-good values; runtime input goes through
    /// `from_inputs` / `with_input`.
    #[cfg(test)]
    pub fn new(
        position_size_usd: Decimal,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
    ) -> Result<Self, TradingError> {
        validate(RiskField::PositionSize, position_size_usd)?;
        validate(RiskField::StopLoss, stop_loss_pct)?;
        validate(RiskField::TakeProfit, take_profit_pct)?;
        Ok(Self {
            position_size_usd,
            stop_loss_pct,
            take_profit_pct,
        })
    }

    /// Builds a config from raw operator input. Each field that does not parse
    /// or is out of range falls back to its default, with a warning.
    pub fn from_inputs(size: &str, stop_loss: &str, take_profit: &str) -> Self {
        Self::default()
            .with_input(RiskField::PositionSize, size)
            .with_input(RiskField::StopLoss, stop_loss)
            .with_input(RiskField::TakeProfit, take_profit)
    }

    /// Returns a copy with one field replaced from raw input. Invalid input
    /// resets that field to its default; the other fields are kept.
    pub fn with_input(self, field: RiskField, raw: &str) -> Self {
        let value = match parse_field(field, raw) {
            Ok(v) => v,
            Err(e) => {
                let fallback = default_for(field);
                warn!("{}; falling back to {}", e, fallback);
                fallback
            }
        };
        let mut next = self;
        match field {
            RiskField::PositionSize => next.position_size_usd = value,
            RiskField::StopLoss => next.stop_loss_pct = value,
            RiskField::TakeProfit => next.take_profit_pct = value,
        }
        next
    }

    pub fn position_size_usd(&self) -> Decimal {
        self.position_size_usd
    }

    pub fn stop_loss_pct(&self) -> Decimal {
        self.stop_loss_pct
    }

    pub fn take_profit_pct(&self) -> Decimal {
        self.take_profit_pct
    }
}

fn default_for(field: RiskField) -> Decimal {
    match field {
        RiskField::PositionSize => DEFAULT_POSITION_SIZE_USD,
        RiskField::StopLoss => DEFAULT_STOP_LOSS_PCT,
        RiskField::TakeProfit => DEFAULT_TAKE_PROFIT_PCT,
    }
}

fn parse_field(field: RiskField, raw: &str) -> Result<Decimal, TradingError> {
    let value = Decimal::from_str(raw.trim()).map_err(|e| TradingError::InvalidSetting {
        key: field.key(),
        reason: format!("{:?} is not a number ({})", raw, e),
    })?;
    validate(field, value)?;
    Ok(value)
}

fn validate(field: RiskField, value: Decimal) -> Result<(), TradingError> {
    let ok = match field {
        RiskField::PositionSize => value > Decimal::ZERO,
        RiskField::StopLoss | RiskField::TakeProfit => {
            value > Decimal::ZERO && value < Decimal::ONE
        }
    };
    if ok {
        Ok(())
    } else {
        let range = match field {
            RiskField::PositionSize => "> 0",
            _ => "in (0, 1)",
        };
        Err(TradingError::InvalidSetting {
            key: field.key(),
            reason: format!("{} must be {}", value, range),
        })
    }
}
