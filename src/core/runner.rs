// src/core/runner.rs
use crate::connectors::traits::PriceSource;
use crate::core::risk::{RiskConfig, RiskField};
use crate::core::session::Session;
use crate::error::TradingError;
use crate::strategies::traits::Strategy;
use crate::types::{CycleReport, EngineSnapshot};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Why a trading loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    FeedFailed,
    ObserverGone,
}

/// Operator-side handle for risk edits. Every edit publishes a complete
/// `RiskConfig`, so the loop can never see a partially updated one.
pub struct RiskConfigHandle {
    tx: watch::Sender<RiskConfig>,
}

impl RiskConfigHandle {
    pub fn channel(initial: RiskConfig) -> (Self, watch::Receiver<RiskConfig>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, rx)
    }

    pub fn current(&self) -> RiskConfig {
        *self.tx.borrow()
    }

    pub fn replace(&self, config: RiskConfig) {
        self.tx.send_replace(config);
    }

    /// Applies one raw operator edit on top of the current config.
    pub fn edit(&self, field: RiskField, raw: &str) -> RiskConfig {
        let next = self.current().with_input(field, raw);
        self.replace(next);
        next
    }
}

/// Polls a price source and steps the session once per interval.
pub struct TradingLoop<P, S> {
    source: P,
    session: Session<S>,
    config_rx: watch::Receiver<RiskConfig>,
    report_tx: mpsc::Sender<CycleReport>,
    // report of a cycle that was stepped but not delivered before shutdown
    pending: Option<CycleReport>,
    interval: Duration,
}

impl<P, S> TradingLoop<P, S>
where
    P: PriceSource,
    S: Strategy,
{
    pub fn new(
        source: P,
        session: Session<S>,
        config_rx: watch::Receiver<RiskConfig>,
        report_tx: mpsc::Sender<CycleReport>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            session,
            config_rx,
            report_tx,
            pending: None,
            interval,
        }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Clears session state and drops any undelivered report.
    pub fn reset(&mut self) {
        self.session.reset();
        self.pending = None;
    }

    /// Runs until shutdown, a fatal feed error, or the observer going away,
    /// then hands the loop back so it can be reset or restarted.
    ///
    /// Shutdown is checked at the top of every cycle and raced against the
    /// price fetch, the report hand-off and the sleep, so neither a stuck
    /// request nor a full report channel can keep the loop alive.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> (Self, LoopExit) {
        let risk = *self.session.engine().config();
        info!(
            "Trading loop running: {} on {}, every {:?}, ${} per trade",
            self.session.strategy().name(),
            self.source.name(),
            self.interval,
            risk.position_size_usd()
        );

        let exit = loop {
            if *shutdown.borrow() {
                break LoopExit::Stopped;
            }

            if let Some(report) = self.pending.take() {
                if let Some(exit) = self.publish(report, &mut shutdown).await {
                    break exit;
                }
            }

            let config = *self.config_rx.borrow_and_update();
            self.session.update_config(config);

            let fetched = tokio::select! {
                _ = shutdown.changed() => None,
                res = self.source.fetch_price() => Some(res),
            };
            let Some(fetched) = fetched else {
                break LoopExit::Stopped;
            };

            match fetched {
                Ok(price) => {
                    let report = self.session.step(price);
                    for trade in &report.trades {
                        info!("Trade: {}", trade);
                    }
                    if let Some(exit) = self.publish(report, &mut shutdown).await {
                        break exit;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!("Skipping cycle, price fetch failed: {}", e);
                }
                Err(e) => {
                    error!("Price feed failed permanently: {}", e);
                    break LoopExit::FeedFailed;
                }
            }

            let stopped = tokio::select! {
                _ = shutdown.changed() => true,
                _ = tokio::time::sleep(self.interval) => false,
            };
            if stopped {
                break LoopExit::Stopped;
            }
        };

        info!(
            "Trading loop exited: {:?}, realized pnl ${}",
            exit,
            self.session.engine().realized_pnl().round_dp(2)
        );
        (self, exit)
    }

    /// Waits for room in the report channel. If shutdown wins, the report is
    /// kept and delivered first when the loop runs again.
    async fn publish(
        &mut self,
        report: CycleReport,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<LoopExit> {
        let reserved = tokio::select! {
            _ = shutdown.changed() => None,
            permit = self.report_tx.reserve() => Some(permit),
        };
        match reserved {
            Some(Ok(permit)) => {
                permit.send(report);
                None
            }
            Some(Err(_)) => {
                error!("Report channel closed! Observer is likely dead.");
                Some(LoopExit::ObserverGone)
            }
            None => {
                warn!("Shutdown while the observer was busy; holding the report");
                self.pending = Some(report);
                Some(LoopExit::Stopped)
            }
        }
    }
}

type LoopTask<P, S> = JoinHandle<(TradingLoop<P, S>, LoopExit)>;

/// Start/stop/reset control over a single trading loop.
///
/// At most one task runs against the session. Reset stops the task and waits
/// for it to hand the session back before clearing state, so a stale cycle
/// can never write over a fresh reset. A task that panics takes the session
/// with it; every later call reports `TradingError::LoopLost`.
pub struct Runner<P, S> {
    idle: Option<TradingLoop<P, S>>,
    running: Option<(watch::Sender<bool>, LoopTask<P, S>)>,
}

impl<P, S> Runner<P, S>
where
    P: PriceSource + 'static,
    S: Strategy + 'static,
{
    pub fn new(trading_loop: TradingLoop<P, S>) -> Self {
        Self {
            idle: Some(trading_loop),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }

    /// Spawns the loop. Returns `false` if it was already running.
    pub async fn start(&mut self) -> Result<bool, TradingError> {
        if self.is_running() {
            return Ok(false);
        }
        // reclaim a loop that ended on its own
        self.stop().await?;

        let Some(trading_loop) = self.idle.take() else {
            return Err(TradingError::LoopLost);
        };
        let (tx, rx) = watch::channel(false);
        self.running = Some((tx, tokio::spawn(trading_loop.run(rx))));
        Ok(true)
    }

    /// Signals shutdown and waits for the task to finish its current step.
    pub async fn stop(&mut self) -> Result<Option<LoopExit>, TradingError> {
        let Some((tx, task)) = self.running.take() else {
            return Ok(None);
        };
        let _ = tx.send(true);
        let (trading_loop, exit) = task.await?;
        self.idle = Some(trading_loop);
        Ok(Some(exit))
    }

    /// Stops the loop if needed, then clears strategy history and engine state.
    pub async fn reset(&mut self) -> Result<(), TradingError> {
        self.stop().await?;
        let trading_loop = self.idle.as_mut().ok_or(TradingError::LoopLost)?;
        trading_loop.reset();
        info!("Session reset");
        Ok(())
    }

    /// Current state, available only while the loop is not running.
    pub fn snapshot(&self) -> Option<EngineSnapshot> {
        self.idle.as_ref().map(|l| l.session().snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::traits::FeedError;
    use crate::core::engine::ExecutionEngine;
    use crate::strategies::sma_crossover::SmaCrossover;
    use crate::types::{Position, Side, Signal, TradeAction};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::timeout;

    /// Replays a fixed script, then hangs forever like a stuck request.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Decimal, FeedError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Decimal, FeedError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn fetch_price(&self) -> Result<Decimal, FeedError> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(r) => r,
                None => std::future::pending().await,
            }
        }
    }

    struct Harness {
        runner: Runner<ScriptedSource, SmaCrossover>,
        reports: mpsc::Receiver<CycleReport>,
        risk: RiskConfigHandle,
    }

    fn harness(script: Vec<Result<Decimal, FeedError>>) -> Harness {
        harness_with_capacity(script, 16)
    }

    fn harness_with_capacity(script: Vec<Result<Decimal, FeedError>>, capacity: usize) -> Harness {
        let (risk, config_rx) = RiskConfigHandle::channel(RiskConfig::default());
        let (report_tx, reports) = mpsc::channel(capacity);
        let session = Session::new(
            SmaCrossover::new(2, 3).unwrap(),
            ExecutionEngine::new(RiskConfig::default(), dec!(10000)),
        );
        let trading_loop = TradingLoop::new(
            ScriptedSource::new(script),
            session,
            config_rx,
            report_tx,
            Duration::from_millis(1),
        );
        Harness {
            runner: Runner::new(trading_loop),
            reports,
            risk,
        }
    }

    async fn next_report(rx: &mut mpsc::Receiver<CycleReport>) -> CycleReport {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for report")
            .expect("report channel closed")
    }

    async fn wait_until_finished<P>(runner: &Runner<P, SmaCrossover>)
    where
        P: PriceSource + 'static,
    {
        timeout(Duration::from_secs(5), async {
            while runner.is_running() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("loop did not finish on its own");
    }

    #[tokio::test]
    async fn skips_transient_errors_and_keeps_state() {
        let mut h = harness(vec![
            Ok(dec!(100)),
            Ok(dec!(100)),
            Err(FeedError::Malformed("bad body".into())),
            Ok(dec!(101)),
        ]);
        assert!(h.runner.start().await.unwrap());
        assert!(h.runner.is_running());

        let first = next_report(&mut h.reports).await;
        assert_eq!(first.snapshot.last_price, Some(dec!(100)));
        next_report(&mut h.reports).await;
        let third = next_report(&mut h.reports).await;
        assert_eq!(third.snapshot.last_price, Some(dec!(101)));
        assert_eq!(third.trades.len(), 1);
        assert_eq!(third.trades[0].side, Side::Long);

        // source now hangs mid-fetch; stop must not wait for it
        let exit = timeout(Duration::from_secs(5), h.runner.stop())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, Some(LoopExit::Stopped));
        assert!(!h.runner.is_running());
        assert_eq!(h.runner.snapshot().unwrap().position, Position::Long);
    }

    #[tokio::test]
    async fn fatal_feed_error_ends_loop() {
        let mut h = harness(vec![Err(FeedError::Status(StatusCode::NOT_FOUND))]);
        h.runner.start().await.unwrap();
        wait_until_finished(&h.runner).await;
        let exit = h.runner.stop().await.unwrap();
        assert_eq!(exit, Some(LoopExit::FeedFailed));
        assert!(h.reports.try_recv().is_err());
    }

    #[tokio::test]
    async fn reset_waits_for_loop_then_clears_state() {
        let mut h = harness(vec![Ok(dec!(100)), Ok(dec!(100)), Ok(dec!(101))]);
        h.runner.start().await.unwrap();
        for _ in 0..3 {
            next_report(&mut h.reports).await;
        }

        h.runner.reset().await.unwrap();
        assert!(!h.runner.is_running());
        let snap = h.runner.snapshot().unwrap();
        assert_eq!(snap.position, Position::Flat);
        assert_eq!(snap.realized_pnl, Decimal::ZERO);
        assert_eq!(snap.equity, dec!(10000));
        assert_eq!(snap.last_price, None);

        // reset twice is harmless; stop on an idle runner is a no-op
        h.runner.reset().await.unwrap();
        assert_eq!(h.runner.stop().await.unwrap(), None);
    }

    #[test]
    fn invalid_edit_resets_only_that_field() {
        let (risk, rx) = RiskConfigHandle::channel(RiskConfig::default());
        risk.edit(RiskField::PositionSize, "1000");
        risk.edit(RiskField::StopLoss, "not-a-number");
        assert_eq!(risk.current().position_size_usd(), dec!(1000));
        assert_eq!(risk.current().stop_loss_pct(), dec!(0.01));
        assert_eq!(*rx.borrow(), risk.current());
    }

    #[tokio::test]
    async fn risk_edits_apply_to_next_entry() {
        let mut h = harness(vec![Ok(dec!(10)), Ok(dec!(10)), Ok(dec!(20))]);
        h.risk.edit(RiskField::PositionSize, "1000");
        h.runner.start().await.unwrap();
        next_report(&mut h.reports).await;
        next_report(&mut h.reports).await;
        let entry = next_report(&mut h.reports).await;
        assert_eq!(entry.trades[0].action, TradeAction::Enter);
        assert_eq!(entry.trades[0].quantity, dec!(50));
        let open = entry.snapshot.open.unwrap();
        assert_eq!(open.stop_price, dec!(19.8));
        h.runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_observer_stops_loop() {
        let Harness {
            mut runner,
            reports,
            ..
        } = harness(vec![Ok(dec!(100))]);
        drop(reports);
        runner.start().await.unwrap();
        wait_until_finished(&runner).await;
        assert_eq!(runner.stop().await.unwrap(), Some(LoopExit::ObserverGone));
    }

    #[tokio::test]
    async fn restart_resumes_same_session() {
        let mut h = harness(vec![Ok(dec!(100)), Ok(dec!(100)), Ok(dec!(101))]);
        h.runner.start().await.unwrap();
        next_report(&mut h.reports).await;
        next_report(&mut h.reports).await;
        h.runner.stop().await.unwrap();

        assert!(h.runner.start().await.unwrap());
        assert!(!h.runner.start().await.unwrap());
        let report = next_report(&mut h.reports).await;
        // history survived the pause, so the third price completes the window
        assert_eq!(report.snapshot.position, Position::Long);
        h.runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_not_blocked_by_a_full_report_channel() {
        let mut h = harness_with_capacity(vec![Ok(dec!(100)), Ok(dec!(100)), Ok(dec!(101))], 1);
        h.runner.start().await.unwrap();
        // first report fills the channel, the second cycle waits for room
        tokio::time::sleep(Duration::from_millis(50)).await;

        let exit = timeout(Duration::from_secs(2), h.runner.stop())
            .await
            .expect("stop hung on a full report channel")
            .unwrap();
        assert_eq!(exit, Some(LoopExit::Stopped));

        let first = next_report(&mut h.reports).await;
        assert_eq!(first.snapshot.last_price, Some(dec!(100)));
        assert!(h.reports.try_recv().is_err());

        // the held report goes out before the next cycle
        h.runner.start().await.unwrap();
        let held = next_report(&mut h.reports).await;
        assert_eq!(held.snapshot.last_signal, Some(Signal::Hold));
        assert!(held.trades.is_empty());
        let entry = next_report(&mut h.reports).await;
        assert_eq!(entry.snapshot.last_price, Some(dec!(101)));
        assert_eq!(entry.trades[0].action, TradeAction::Enter);
        h.runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn reset_drops_a_held_report() {
        let mut h = harness_with_capacity(vec![Ok(dec!(100)), Ok(dec!(100))], 1);
        h.runner.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        timeout(Duration::from_secs(2), h.runner.reset())
            .await
            .expect("reset hung on a full report channel")
            .unwrap();
        next_report(&mut h.reports).await;

        // nothing left to deliver and no prices left to fetch
        h.runner.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.reports.try_recv().is_err());
        h.runner.stop().await.unwrap();
    }

    struct PanickingSource;

    #[async_trait]
    impl PriceSource for PanickingSource {
        fn name(&self) -> String {
            "panicking".to_string()
        }

        async fn fetch_price(&self) -> Result<Decimal, FeedError> {
            panic!("feed blew up");
        }
    }

    #[tokio::test]
    async fn panicked_loop_is_reported_as_lost() {
        let (_risk, config_rx) = RiskConfigHandle::channel(RiskConfig::default());
        let (report_tx, _reports) = mpsc::channel(1);
        let session = Session::new(
            SmaCrossover::new(2, 3).unwrap(),
            ExecutionEngine::new(RiskConfig::default(), dec!(10000)),
        );
        let trading_loop = TradingLoop::new(
            PanickingSource,
            session,
            config_rx,
            report_tx,
            Duration::from_millis(1),
        );
        let mut runner = Runner::new(trading_loop);

        assert!(runner.start().await.unwrap());
        wait_until_finished(&runner).await;
        assert!(matches!(runner.stop().await, Err(TradingError::LoopPanicked(_))));
        assert!(!runner.is_running());
        assert!(matches!(runner.start().await, Err(TradingError::LoopLost)));
        assert!(matches!(runner.reset().await, Err(TradingError::LoopLost)));
        assert!(runner.snapshot().is_none());
        assert_eq!(runner.stop().await.unwrap(), None);
    }
}
