// src/utils/precision.rs
use rust_decimal::Decimal;

/// Smallest quantity the engine will ever hold: 0.000001 units.
pub const MIN_QUANTITY: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Converts a USD notional into a quantity at `price`, floored at [`MIN_QUANTITY`].
/// A price the division cannot handle (zero, or so small the result overflows)
/// also yields the floor instead of panicking.
pub fn floored_quantity(notional: Decimal, price: Decimal) -> Decimal {
    notional
        .checked_div(price)
        .map_or(MIN_QUANTITY, |qty| qty.max(MIN_QUANTITY))
}

/// Largest price a feed may report. Keeps entry levels and PnL well inside
/// `Decimal` range for any sane position size.
pub const MAX_PRICE: Decimal = Decimal::from_parts(2_808_348_672, 232_830_643, 0, false, 0);

/// Arithmetic mean of the last `window` values, or `None` if there are fewer.
///
/// Sums exactly when the total fits in a `Decimal`; otherwise each value is
/// scaled down by `window` before summing.
pub fn trailing_mean<'a, I>(values: I, len: usize, window: usize) -> Option<Decimal>
where
    I: DoubleEndedIterator<Item = &'a Decimal> + Clone,
{
    if window == 0 || len < window {
        return None;
    }
    let n = Decimal::from(window);
    let tail = values.rev().take(window);
    match tail
        .clone()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
    {
        Some(sum) => Some(sum / n),
        None => Some(tail.map(|v| *v / n).fold(Decimal::ZERO, Decimal::saturating_add)),
    }
}
