// src/strategies/sma_crossover.rs
use crate::error::TradingError;
use crate::strategies::traits::Strategy;
use crate::types::Signal;
use crate::utils::precision::trailing_mean;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Simple moving-average crossover over a bounded price history.
///
/// Only the direction of the spread matters: short SMA above long SMA is a
/// `Buy`, below is a `Sell`, and an exact tie is a `Hold`.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    short: usize,
    long: usize,
    prices: VecDeque<Decimal>,
}

impl SmaCrossover {
    /// # Arguments
    /// * `short` - Fast window, e.g. 20.
    /// * `long` - Slow window, e.g. 50. Also the history capacity.
    pub fn new(short: usize, long: usize) -> Result<Self, TradingError> {
        if short == 0 || long == 0 || short > long {
            return Err(TradingError::InvalidWindows { short, long });
        }
        Ok(Self {
            short,
            long,
            prices: VecDeque::with_capacity(long + 1),
        })
    }

    fn sma(&self, window: usize) -> Option<Decimal> {
        trailing_mean(self.prices.iter(), self.prices.len(), window)
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> String {
        format!("SMA({}/{})", self.short, self.long)
    }

    fn add_price(&mut self, price: Decimal) {
        self.prices.push_back(price);
        while self.prices.len() > self.long {
            self.prices.pop_front();
        }
    }

    fn signal(&self) -> Signal {
        let (Some(short), Some(long)) = (self.sma(self.short), self.sma(self.long)) else {
            return Signal::Hold;
        };
        match short.cmp(&long) {
            std::cmp::Ordering::Greater => Signal::Buy,
            std::cmp::Ordering::Less => Signal::Sell,
            std::cmp::Ordering::Equal => Signal::Hold,
        }
    }

    fn reset(&mut self) {
        self.prices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn feed(strategy: &mut SmaCrossover, prices: &[Decimal]) {
        for p in prices {
            strategy.add_price(*p);
        }
    }

    #[test]
    fn holds_until_long_window_fills() {
        let mut s = SmaCrossover::new(2, 3).unwrap();
        feed(&mut s, &[dec!(1), dec!(1)]);
        assert_eq!(s.signal(), Signal::Hold);
        s.add_price(dec!(1));
        // short == long == 1
        assert_eq!(s.signal(), Signal::Hold);
    }

    #[test]
    fn rising_tail_is_buy() {
        let mut s = SmaCrossover::new(2, 3).unwrap();
        feed(&mut s, &[dec!(1), dec!(1), dec!(3)]);
        assert_eq!(s.signal(), Signal::Buy);
    }

    #[test]
    fn falling_tail_is_sell() {
        let mut s = SmaCrossover::new(2, 3).unwrap();
        feed(&mut s, &[dec!(3), dec!(3), dec!(1)]);
        assert_eq!(s.signal(), Signal::Sell);
    }

    #[test]
    fn history_is_bounded_by_long_window() {
        let mut s = SmaCrossover::new(2, 3).unwrap();
        feed(&mut s, &[dec!(100), dec!(1), dec!(1), dec!(1)]);
        assert_eq!(s.prices.len(), 3);
        // the 100 was evicted, so the averages are equal again
        assert_eq!(s.signal(), Signal::Hold);
    }

    #[test]
    fn reset_clears_history() {
        let mut s = SmaCrossover::new(2, 3).unwrap();
        feed(&mut s, &[dec!(1), dec!(1), dec!(3)]);
        s.reset();
        assert!(s.prices.is_empty());
        assert_eq!(s.signal(), Signal::Hold);
        feed(&mut s, &[dec!(1), dec!(1)]);
        assert_eq!(s.signal(), Signal::Hold);
    }

    #[test]
    fn equal_windows_never_signal() {
        let mut s = SmaCrossover::new(3, 3).unwrap();
        feed(&mut s, &[dec!(1), dec!(2), dec!(9)]);
        assert_eq!(s.signal(), Signal::Hold);
    }

    #[test]
    fn rejects_bad_windows() {
        assert!(SmaCrossover::new(0, 3).is_err());
        assert!(SmaCrossover::new(2, 0).is_err());
        assert!(SmaCrossover::new(5, 3).is_err());
    }

    #[test]
    fn name_shows_windows() {
        assert_eq!(SmaCrossover::new(20, 50).unwrap().name(), "SMA(20/50)");
    }
}
