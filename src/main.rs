// src/main.rs
use crate::config::AppConfig;
use crate::connectors::coingecko::CoinGeckoClient;
use crate::console::{Command, Observer, HELP};
use crate::core::engine::ExecutionEngine;
use crate::core::runner::{RiskConfigHandle, Runner, TradingLoop};
use crate::core::session::Session;
use crate::error::TradingError;
use crate::strategies::sma_crossover::SmaCrossover;
use crate::strategies::traits::Strategy;
use crate::types::CycleReport;
use dotenvy::dotenv;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

mod config;
mod connectors;
mod console;
mod core;
mod error;
mod strategies;
mod types;
mod utils;

type PaperRunner = Runner<CoinGeckoClient, SmaCrossover>;

enum Event {
    Report(CycleReport),
    Line(std::io::Result<Option<String>>),
    Shutdown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Load Configuration
    let settings = AppConfig::new()?;
    let _log_guard = utils::logging::init(&settings.log_level, settings.log_dir.as_deref());

    let risk = settings.risk.to_risk_config();
    let strategy = SmaCrossover::new(settings.strategy.short_window, settings.strategy.long_window)?;
    let client = CoinGeckoClient::new(
        &settings.price_api_url,
        &settings.asset_id,
        &settings.vs_currency,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    let engine = ExecutionEngine::new(risk, settings.starting_equity);

    println!("========================================");
    println!("       THE PAPER SNIPER - v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("Target:   {}/{}", settings.asset_id, settings.vs_currency);
    println!("Feed:     {}", client.endpoint());
    println!("Strategy: {}", strategy.name());
    println!("Equity:   ${}", engine.starting_equity());
    println!(
        "Risk:     ${} per trade, SL {}, TP {}",
        risk.position_size_usd(),
        risk.stop_loss_pct(),
        risk.take_profit_pct()
    );
    println!("Mode:     📝 PAPER TRADING");
    println!("========================================");

    // 2. Create Channels
    let (risk_handle, config_rx) = RiskConfigHandle::channel(risk);
    let (report_tx, mut report_rx) = mpsc::channel(100);

    let trading_loop = TradingLoop::new(
        client,
        Session::new(strategy, engine),
        config_rx,
        report_tx,
        Duration::from_secs(settings.poll_interval_secs),
    );
    let mut runner = Runner::new(trading_loop);
    let mut observer = Observer::new();

    // 3. Run
    if settings.autostart {
        runner.start().await?;
    }
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let event = tokio::select! {
            Some(report) = report_rx.recv() => Event::Report(report),
            line = lines.next_line(), if stdin_open => Event::Line(line),
            _ = tokio::signal::ctrl_c() => Event::Shutdown,
        };

        match event {
            Event::Report(report) => observer.on_report(report),
            Event::Line(Ok(Some(line))) => match Command::parse(&line) {
                Ok(Some(cmd)) => {
                    let keep_going = execute(
                        cmd,
                        &mut runner,
                        &risk_handle,
                        &mut observer,
                        &mut report_rx,
                    )
                    .await?;
                    if !keep_going {
                        break;
                    }
                }
                Ok(None) => {}
                Err(msg) => println!("{}", msg),
            },
            Event::Line(Ok(None)) => {
                info!("stdin closed, running until Ctrl+C");
                stdin_open = false;
            }
            Event::Line(Err(e)) => {
                warn!("Failed to read stdin: {}", e);
                stdin_open = false;
            }
            Event::Shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Err(e) = runner.stop().await {
        warn!("{}", e);
    }
    while let Ok(report) = report_rx.try_recv() {
        observer.on_report(report);
    }
    let idle = runner.snapshot();
    let snapshot = idle.as_ref().or(observer.last_snapshot());
    println!("{}", observer.status_line(false, snapshot));
    Ok(())
}

/// A panicked loop is reported and the console stays up; the trade log
/// survives in the observer.
fn report_loop_error(e: TradingError) -> anyhow::Result<()> {
    match e {
        TradingError::LoopPanicked(_) | TradingError::LoopLost => {
            println!("{}", e);
            Ok(())
        }
        other => Err(other.into()),
    }
}

/// Returns `false` when the operator asked to quit.
async fn execute(
    cmd: Command,
    runner: &mut PaperRunner,
    risk: &RiskConfigHandle,
    observer: &mut Observer,
    report_rx: &mut mpsc::Receiver<CycleReport>,
) -> anyhow::Result<bool> {
    match cmd {
        Command::Start => match runner.start().await {
            Ok(true) => println!("started"),
            Ok(false) => println!("already running"),
            Err(e) => report_loop_error(e)?,
        },
        Command::Stop => match runner.stop().await {
            Ok(Some(exit)) => println!("stopped ({:?})", exit),
            Ok(None) => println!("not running"),
            Err(e) => report_loop_error(e)?,
        },
        Command::Reset => match runner.reset().await {
            Ok(()) => {
                // reports queued before the reset describe state that no longer exists
                while report_rx.try_recv().is_ok() {}
                observer.reset();
                println!("reset; press start to resume");
            }
            Err(e) => report_loop_error(e)?,
        },
        Command::Status => {
            let idle = runner.snapshot();
            let snapshot = idle.as_ref().or(observer.last_snapshot());
            println!("{}", observer.status_line(runner.is_running(), snapshot));
        }
        Command::Trades(n) => {
            let ledger = observer.ledger();
            if ledger.is_empty() {
                println!("no trades yet");
            }
            let shown = ledger.recent(n);
            for trade in shown {
                println!("{}", trade);
            }
            if !shown.is_empty() {
                let summary = ledger.summary();
                println!(
                    "showing {} of {} trades, realized ${}",
                    shown.len(),
                    ledger.len(),
                    summary.realized_pnl.round_dp(2)
                );
            }
        }
        Command::Risk => {
            let cfg = risk.current();
            println!(
                "size ${} | SL {} | TP {}",
                cfg.position_size_usd(),
                cfg.stop_loss_pct(),
                cfg.take_profit_pct()
            );
        }
        Command::Edit(field, raw) => {
            let cfg = risk.edit(field, &raw);
            println!(
                "risk now: size ${} | SL {} | TP {} (applies to the next entry)",
                cfg.position_size_usd(),
                cfg.stop_loss_pct(),
                cfg.take_profit_pct()
            );
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}
