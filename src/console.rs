// src/console.rs
use crate::core::ledger::TradeLedger;
use crate::core::risk::RiskField;
use crate::types::{CycleReport, EngineSnapshot};
use rust_decimal::Decimal;
use std::fmt::Write;

/// Operator commands read from stdin, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reset,
    Status,
    Trades(usize),
    Risk,
    Edit(RiskField, String),
    Help,
    Quit,
}

const DEFAULT_TRADES_SHOWN: usize = 10;

pub const HELP: &str = "commands: start | stop | reset | status | trades [n] | risk | \
size <usd> | sl <fraction> | tp <fraction> | help | quit";

impl Command {
    /// `Ok(None)` for a blank line, `Err` with a message for anything unknown.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        let cmd = match (head.to_ascii_lowercase().as_str(), arg) {
            ("start", None) => Command::Start,
            ("stop", None) => Command::Stop,
            ("reset", None) => Command::Reset,
            ("status", None) => Command::Status,
            ("risk", None) => Command::Risk,
            ("help" | "?", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            ("trades", None) => Command::Trades(DEFAULT_TRADES_SHOWN),
            ("trades", Some(n)) => Command::Trades(
                n.parse()
                    .map_err(|_| format!("trades expects a count, got {:?}", n))?,
            ),
            ("size", Some(v)) => Command::Edit(RiskField::PositionSize, v.to_string()),
            ("sl", Some(v)) => Command::Edit(RiskField::StopLoss, v.to_string()),
            ("tp", Some(v)) => Command::Edit(RiskField::TakeProfit, v.to_string()),
            (other, _) => return Err(format!("unknown command {:?}; {}", other, HELP)),
        };
        Ok(Some(cmd))
    }
}

/// Observer side of the report channel: the trade log plus the latest snapshot.
#[derive(Debug, Default)]
pub struct Observer {
    ledger: TradeLedger,
    last: Option<EngineSnapshot>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_report(&mut self, report: CycleReport) {
        self.ledger.record(report.trades);
        self.last = Some(report.snapshot);
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn last_snapshot(&self) -> Option<&EngineSnapshot> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.ledger.clear();
        self.last = None;
    }

    /// One-line status for `snapshot`, which is the session's own state while
    /// idle or the last published one while running.
    pub fn status_line(&self, running: bool, snapshot: Option<&EngineSnapshot>) -> String {
        let mut out = format!("running: {}", if running { "yes" } else { "no" });
        if let Some(s) = snapshot {
            let last = s
                .last_price
                .map_or_else(|| "-".to_string(), |p| format!("${}", p));
            let signal = s
                .last_signal
                .map_or_else(|| "-".to_string(), |sig| sig.to_string());
            let _ = write!(
                out,
                " | last {} | signal {} | pos {} | pnl ${} | equity ${}",
                last,
                signal,
                s.position,
                s.realized_pnl.round_dp(2),
                s.equity.round_dp(2)
            );
            if let Some(open) = &s.open {
                let _ = write!(
                    out,
                    " | {} units @ ${} since {} SL ${} TP ${}",
                    open.quantity,
                    open.entry_price,
                    open.opened_at.format("%H:%M:%S"),
                    open.stop_price.round_dp(2),
                    open.take_profit_price.round_dp(2)
                );
            }
        }
        let summary = self.ledger.summary();
        let _ = write!(out, " | trades {}", summary.trades);
        if let Some(rate) = summary.win_rate() {
            let _ = write!(
                out,
                " | W/L {}/{} | win rate {}%",
                summary.wins,
                summary.losses,
                (rate * Decimal::ONE_HUNDRED).round_dp(1)
            );
        }
        out
    }
}
