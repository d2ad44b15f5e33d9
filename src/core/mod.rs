pub mod engine;
pub mod ledger;
pub mod risk;
pub mod runner;
pub mod session;
