// src/connectors/messages.rs
use serde::Deserialize;
use std::collections::HashMap;

/// Body of `GET /simple/price?ids=<asset>&vs_currencies=<vs>`:
/// `{"bitcoin": {"usd": 64123.5}}`.
///
/// Prices stay as raw JSON numbers so they can be parsed straight into
/// `Decimal` without a detour through `f64`.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct SimplePriceResponse(pub HashMap<String, HashMap<String, serde_json::Number>>);

impl SimplePriceResponse {
    pub fn quote(&self, asset_id: &str, vs_currency: &str) -> Option<&serde_json::Number> {
        self.0.get(asset_id)?.get(vs_currency)
    }
}
