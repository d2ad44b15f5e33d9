// src/core/ledger.rs
use crate::types::Trade;
use rust_decimal::Decimal;

/// Append-only journal of every trade the session emitted.
#[derive(Debug, Default, Clone)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub trades: usize,
    pub round_trips: usize,
    pub wins: usize,
    pub losses: usize,
    pub realized_pnl: Decimal,
}

impl LedgerSummary {
    /// Share of closed round trips with positive PnL, if any closed.
    pub fn win_rate(&self) -> Option<Decimal> {
        if self.round_trips == 0 {
            return None;
        }
        Some(Decimal::from(self.wins) / Decimal::from(self.round_trips))
    }
}

impl TradeLedger {
    pub fn record<I>(&mut self, trades: I)
    where
        I: IntoIterator<Item = Trade>,
    {
        self.trades.extend(trades);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Last `n` trades, oldest first.
    pub fn recent(&self, n: usize) -> &[Trade] {
        let start = self.trades.len().saturating_sub(n);
        &self.trades[start..]
    }

    pub fn summary(&self) -> LedgerSummary {
        let pnls: Vec<Decimal> = self.trades.iter().filter_map(|t| t.pnl).collect();
        LedgerSummary {
            trades: self.trades.len(),
            round_trips: pnls.len(),
            wins: pnls.iter().filter(|p| p.is_sign_positive() && !p.is_zero()).count(),
            losses: pnls.iter().filter(|p| p.is_sign_negative() && !p.is_zero()).count(),
            realized_pnl: pnls.iter().fold(Decimal::ZERO, |acc, p| acc.saturating_add(*p)),
        }
    }

    // Only a full session reset may clear history.
    pub fn clear(&mut self) {
        self.trades.clear();
    }
}
