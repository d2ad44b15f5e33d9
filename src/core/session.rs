// src/core/session.rs
use crate::core::engine::ExecutionEngine;
use crate::core::risk::RiskConfig;
use crate::strategies::traits::Strategy;
use crate::types::{CycleReport, EngineSnapshot, Signal};
use rust_decimal::Decimal;
use tracing::debug;

/// One strategy driving one engine, stepped once per price.
pub struct Session<S> {
    strategy: S,
    engine: ExecutionEngine,
    last_signal: Option<Signal>,
    last_price: Option<Decimal>,
}

impl<S> Session<S>
where
    S: Strategy,
{
    pub fn new(strategy: S, engine: ExecutionEngine) -> Self {
        Self {
            strategy,
            engine,
            last_signal: None,
            last_price: None,
        }
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn update_config(&mut self, config: RiskConfig) {
        self.engine.update_config(config);
    }

    /// Runs one cycle: risk exits first, then the signal on the same price.
    /// A stop-out may be followed by a fresh entry in the same cycle.
    pub fn step(&mut self, price: Decimal) -> CycleReport {
        let mut trades = Vec::with_capacity(2);
        trades.extend(self.engine.on_tick(price));

        self.strategy.add_price(price);
        let signal = self.strategy.signal();
        trades.extend(self.engine.on_signal(signal, price));

        self.last_signal = Some(signal);
        self.last_price = Some(price);

        let snapshot = self.snapshot();
        debug!(
            "Cycle @ ${}: signal {}, position {}, pnl ${}",
            price, signal, snapshot.position, snapshot.realized_pnl
        );
        CycleReport { trades, snapshot }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot(self.last_signal, self.last_price)
    }

    pub fn reset(&mut self) {
        self.strategy.reset();
        self.engine.reset();
        self.last_signal = None;
        self.last_price = None;
    }
}
