pub mod sma_crossover;
pub mod traits;
