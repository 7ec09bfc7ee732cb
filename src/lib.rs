pub mod backtesting;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
#[cfg(test)]
pub mod test_helpers;
pub mod trading;
