pub mod coingecko;
pub mod messages;
pub mod traits;
