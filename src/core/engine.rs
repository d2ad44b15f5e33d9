// src/core/engine.rs
use crate::core::risk::RiskConfig;
use crate::types::{
    EngineSnapshot, ExitReason, OpenPositionView, Position, Side, Signal, Trade, TradeAction,
};
use crate::utils::precision::floored_quantity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Levels fixed at entry. Later config changes do not touch them.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
enum PositionState {
    Flat,
    Long(OpenPosition),
    Short(OpenPosition),
}

/// Trades produced by one signal: nothing, an entry, or a reversal's exit+entry pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    None,
    Entry(Trade),
    Reversal { exit: Trade, entry: Trade },
}

impl SignalOutcome {
    /// Trades in emission order.
    pub fn into_trades(self) -> Vec<Trade> {
        match self {
            SignalOutcome::None => Vec::new(),
            SignalOutcome::Entry(t) => vec![t],
            SignalOutcome::Reversal { exit, entry } => vec![exit, entry],
        }
    }
}

impl IntoIterator for SignalOutcome {
    type Item = Trade;
    type IntoIter = std::vec::IntoIter<Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_trades().into_iter()
    }
}

/// Paper execution: position lifecycle, stop/take-profit exits and PnL accounting.
///
/// Single writer. Every method is synchronous and infallible; price validation
/// is the caller's job. Levels and PnL saturate at the `Decimal` bounds
/// instead of overflowing.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    config: RiskConfig,
    starting_equity: Decimal,
    state: PositionState,
    realized_pnl: Decimal,
}

impl ExecutionEngine {
    pub fn new(config: RiskConfig, starting_equity: Decimal) -> Self {
        Self {
            config,
            starting_equity,
            state: PositionState::Flat,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn position(&self) -> Position {
        match self.state {
            PositionState::Flat => Position::Flat,
            PositionState::Long(_) => Position::Long,
            PositionState::Short(_) => Position::Short,
        }
    }

    pub fn open_position(&self) -> Option<(Side, &OpenPosition)> {
        match &self.state {
            PositionState::Flat => None,
            PositionState::Long(p) => Some((Side::Long, p)),
            PositionState::Short(p) => Some((Side::Short, p)),
        }
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Always `starting_equity + realized_pnl`.
    pub fn equity(&self) -> Decimal {
        self.starting_equity.saturating_add(self.realized_pnl)
    }

    pub fn starting_equity(&self) -> Decimal {
        self.starting_equity
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Takes effect on the next entry only.
    pub fn update_config(&mut self, config: RiskConfig) {
        if config != self.config {
            info!(
                "Risk config updated: size ${}, SL {}, TP {}",
                config.position_size_usd(),
                config.stop_loss_pct(),
                config.take_profit_pct()
            );
        }
        self.config = config;
    }

    /// Back to Flat with untouched starting equity. The risk config is kept.
    pub fn reset(&mut self) {
        self.state = PositionState::Flat;
        self.realized_pnl = Decimal::ZERO;
    }

    /// Stop-loss / take-profit check. Emits at most one exit trade.
    pub fn on_tick(&mut self, price: Decimal) -> Option<Trade> {
        let reason = match &self.state {
            PositionState::Flat => return None,
            PositionState::Long(p) => {
                if price <= p.stop_price {
                    ExitReason::StopLoss
                } else if price >= p.take_profit_price {
                    ExitReason::TakeProfit
                } else {
                    return None;
                }
            }
            PositionState::Short(p) => {
                if price >= p.stop_price {
                    ExitReason::StopLoss
                } else if price <= p.take_profit_price {
                    ExitReason::TakeProfit
                } else {
                    return None;
                }
            }
        };
        let (side, open) = self.take_open()?;
        Some(self.close(side, open, price, reason))
    }

    pub fn on_signal(&mut self, signal: Signal, price: Decimal) -> SignalOutcome {
        let target = match signal {
            Signal::Buy => Side::Long,
            Signal::Sell => Side::Short,
            Signal::Hold => return SignalOutcome::None,
        };
        if matches!(self.open_position(), Some((held, _)) if held == target) {
            return SignalOutcome::None;
        }
        match self.take_open() {
            None => SignalOutcome::Entry(self.enter(target, price)),
            Some((held, open)) => {
                let exit = self.close(held, open, price, ExitReason::Reversal);
                let entry = self.enter(target, price);
                SignalOutcome::Reversal { exit, entry }
            }
        }
    }

    pub fn snapshot(&self, last_signal: Option<Signal>, last_price: Option<Decimal>) -> EngineSnapshot {
        EngineSnapshot {
            position: self.position(),
            open: self.open_position().map(|(side, p)| OpenPositionView {
                side,
                entry_price: p.entry_price,
                quantity: p.quantity,
                stop_price: p.stop_price,
                take_profit_price: p.take_profit_price,
                opened_at: p.opened_at,
            }),
            realized_pnl: self.realized_pnl(),
            equity: self.equity(),
            last_signal,
            last_price,
        }
    }

    fn take_open(&mut self) -> Option<(Side, OpenPosition)> {
        match std::mem::replace(&mut self.state, PositionState::Flat) {
            PositionState::Flat => None,
            PositionState::Long(p) => Some((Side::Long, p)),
            PositionState::Short(p) => Some((Side::Short, p)),
        }
    }

    fn enter(&mut self, side: Side, price: Decimal) -> Trade {
        debug_assert!(
            self.state == PositionState::Flat,
            "entry requested while already positioned"
        );
        let sl = self.config.stop_loss_pct();
        let tp = self.config.take_profit_pct();
        let quantity = floored_quantity(self.config.position_size_usd(), price);
        let (stop_price, take_profit_price) = match side {
            Side::Long => (
                price.saturating_mul(Decimal::ONE - sl),
                price.saturating_mul(Decimal::ONE + tp),
            ),
            Side::Short => (
                price.saturating_mul(Decimal::ONE + sl),
                price.saturating_mul(Decimal::ONE - tp),
            ),
        };
        let now = Utc::now();
        let open = OpenPosition {
            entry_price: price,
            quantity,
            stop_price,
            take_profit_price,
            opened_at: now,
        };
        self.state = match side {
            Side::Long => PositionState::Long(open),
            Side::Short => PositionState::Short(open),
        };

        info!(
            "Paper {}: {} units at ${} (SL ${}, TP ${})",
            Position::from(side),
            quantity,
            price,
            stop_price,
            take_profit_price
        );

        Trade {
            id: Uuid::new_v4(),
            action: TradeAction::Enter,
            side,
            price,
            quantity,
            pnl: None,
            timestamp: now,
        }
    }

    // Expects `self.state` to be Flat already (see `take_open`).
    fn close(&mut self, side: Side, open: OpenPosition, price: Decimal, reason: ExitReason) -> Trade {
        let pnl = match side {
            Side::Long => price.saturating_sub(open.entry_price),
            Side::Short => open.entry_price.saturating_sub(price),
        }
        .saturating_mul(open.quantity);
        self.realized_pnl = self.realized_pnl.saturating_add(pnl);

        info!(
            "Paper exit ({:?}): closed {} {} units at ${}, pnl ${}, equity ${}",
            reason,
            Position::from(side),
            open.quantity,
            price,
            pnl.round_dp(2),
            self.equity().round_dp(2)
        );

        Trade {
            id: Uuid::new_v4(),
            action: TradeAction::Exit(reason),
            side,
            price,
            quantity: open.quantity,
            pnl: Some(pnl),
            timestamp: Utc::now(),
        }
    }
}
