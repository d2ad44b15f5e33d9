// src/error.rs
use thiserror::Error;

/// Startup, configuration and loop supervision errors. The engine itself never fails.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("invalid moving-average windows: short={short}, long={long} (need 0 < short <= long)")]
    InvalidWindows { short: usize, long: usize },

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid price api url: {0}")]
    Url(#[from] url::ParseError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("trading loop panicked: {0}")]
    LoopPanicked(#[from] tokio::task::JoinError),

    #[error("trading loop was lost to an earlier panic; restart the bot")]
    LoopLost,
}
