use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::levels::LevelCalculator;
use crate::error::LedgerError;
use crate::trading::ledger::Session;

use super::journal::JournalEntry;
use super::report::BacktestReport;

/// Replays a trade journal through a fresh session, one entry at a time.
pub struct BacktestRunner {
    pub config: Config,
    pub session: Session,
    calculator: LevelCalculator,
    /// Journal rows the ledger rejected, by 1-based row number.
    pub skipped: Vec<(usize, LedgerError)>,
}

impl BacktestRunner {
    pub fn new(config: Config) -> Self {
        let calculator = LevelCalculator::new(&config);
        Self {
            config,
            session: Session::new(),
            calculator,
            skipped: Vec::new(),
        }
    }

    /// Run the replay and end the session. Returns the summary report.
    pub fn run(&mut self, start_equity: f64, entries: &[JournalEntry]) -> Result<BacktestReport> {
        self.session = Session::new();
        self.skipped.clear();
        self.session.start(start_equity)?;

        info!("=== REPLAY START ===");
        info!(
            "{} journal entries | start equity ${:.2}",
            entries.len(),
            start_equity
        );

        for (i, entry) in entries.iter().enumerate() {
            self.session.sim_time = entry.time;
            if let Err(e) = self.replay_entry(entry) {
                warn!("  Row {} skipped: {}", i + 1, e);
                self.skipped.push((i + 1, e));
            }
        }
        self.session.sim_time = None;

        self.session.end()?;
        let report = BacktestReport::from_session(&self.session);

        info!("=== REPLAY COMPLETE ===");
        info!(
            "Recorded {} | skipped {} | final equity ${:.2}",
            report.total_trades,
            self.skipped.len(),
            report.end_equity
        );
        Ok(report)
    }

    fn replay_entry(&mut self, entry: &JournalEntry) -> Result<(), LedgerError> {
        self.session.calculate(
            &self.calculator,
            entry.entry,
            entry.atr,
            entry.side,
            entry.sl_multiple,
        )?;
        self.session.record_outcome(entry.outcome)?;
        Ok(())
    }
}
