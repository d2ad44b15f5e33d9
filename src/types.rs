// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Direction of an open position or of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// What the engine is holding right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Long,
    Short,
    Flat,
}

impl From<Side> for Position {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Position::Long,
            Side::Short => Position::Short,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Position::Long => "LONG",
            Position::Short => "SHORT",
            Position::Flat => "FLAT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Enter,
    Exit(ExitReason),
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Enter => f.write_str("ENTER"),
            TradeAction::Exit(ExitReason::StopLoss) => f.write_str("EXIT: SL hit"),
            TradeAction::Exit(ExitReason::TakeProfit) => f.write_str("EXIT: TP hit"),
            TradeAction::Exit(ExitReason::Reversal) => f.write_str("EXIT: reversal"),
        }
    }
}

/// One entry of the trade log. Never mutated after it is emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub action: TradeAction,
    /// Side entered, or side that was held at exit.
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Realized PnL, only set on exits.
    pub pnl: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ ${} ({})",
            self.action,
            Position::from(self.side),
            self.quantity,
            self.price,
            self.timestamp.to_rfc3339()
        )?;
        if let Some(pnl) = self.pnl {
            write!(f, " pnl ${}", pnl.round_dp(2))?;
        }
        Ok(())
    }
}

/// Levels of the currently open position, for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPositionView {
    pub side: Side,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// State published after every cycle; replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub position: Position,
    pub open: Option<OpenPositionView>,
    pub realized_pnl: Decimal,
    pub equity: Decimal,
    pub last_signal: Option<Signal>,
    pub last_price: Option<Decimal>,
}

/// Everything one cycle produced: trades in emission order (0..=2) and the snapshot.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub trades: Vec<Trade>,
    pub snapshot: EngineSnapshot,
}
