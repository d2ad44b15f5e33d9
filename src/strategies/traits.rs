// src/strategies/traits.rs
use crate::types::Signal;
use rust_decimal::Decimal;

/// Something that turns a price stream into trading advice.
pub trait Strategy: Send {
    fn name(&self) -> String;

    // Feed one observed price
    fn add_price(&mut self, price: Decimal);

    // Current advice; pure with respect to the stored history
    fn signal(&self) -> Signal;

    // Forget all history
    fn reset(&mut self);
}
