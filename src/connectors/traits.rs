// src/connectors/traits.rs
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(StatusCode),

    #[error("malformed price payload: {0}")]
    Malformed(String),

    #[error("price out of range, got {0}")]
    InvalidPrice(Decimal),
}

impl FeedError {
    /// Transient errors skip one cycle; anything else stops the loop.
    /// Client errors other than throttling mean the request itself is wrong
    /// and retrying every cycle will not fix it.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Status(status) => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            FeedError::Transport(_) | FeedError::Malformed(_) | FeedError::InvalidPrice(_) => true,
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> String;

    async fn fetch_price(&self) -> Result<Decimal, FeedError>;
}
