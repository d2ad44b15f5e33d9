// src/connectors/coingecko.rs
use crate::connectors::messages::SimplePriceResponse;
use crate::connectors::traits::{FeedError, PriceSource};
use crate::error::TradingError;
use crate::utils::precision::MAX_PRICE;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Spot price from CoinGecko's public `simple/price` endpoint.
pub struct CoinGeckoClient {
    http_client: Client,
    endpoint: Url,
    asset_id: String,
    vs_currency: String,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: &str,
        asset_id: &str,
        vs_currency: &str,
        timeout: Duration,
    ) -> Result<Self, TradingError> {
        let endpoint = Url::parse_with_params(
            &format!("{}/simple/price", base_url.trim_end_matches('/')),
            &[("ids", asset_id), ("vs_currencies", vs_currency)],
        )?;
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint,
            asset_id: asset_id.to_string(),
            vs_currency: vs_currency.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn name(&self) -> String {
        format!("coingecko:{}/{}", self.asset_id, self.vs_currency)
    }

    async fn fetch_price(&self) -> Result<Decimal, FeedError> {
        let response = self.http_client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }
        let body = response.text().await?;
        let price = parse_price(&body, &self.asset_id, &self.vs_currency)?;
        debug!("Fetched {} = {}", self.name(), price);
        Ok(price)
    }
}

/// Extracts a decimal price in `(0, MAX_PRICE]` for `asset_id` in `vs_currency`.
pub fn parse_price(body: &str, asset_id: &str, vs_currency: &str) -> Result<Decimal, FeedError> {
    let resp: SimplePriceResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;
    let raw = resp
        .quote(asset_id, vs_currency)
        .ok_or_else(|| FeedError::Malformed(format!("no {}/{} quote in response", asset_id, vs_currency)))?
        .to_string();

    let price = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| FeedError::Malformed(format!("unparsable price {:?}: {}", raw, e)))?;

    if price <= Decimal::ZERO || price > MAX_PRICE {
        return Err(FeedError::InvalidPrice(price));
    }
    Ok(price)
}
