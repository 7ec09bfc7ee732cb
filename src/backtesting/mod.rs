pub mod export;
pub mod journal;
pub mod report;
pub mod runner;

pub use report::BacktestReport;
pub use runner::BacktestRunner;
