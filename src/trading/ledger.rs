use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::levels::{LevelCalculator, LevelSet};
use crate::core::outcome::resolve;
use crate::error::{require_positive, LedgerError, LedgerResult};
use crate::models::{Direction, OutcomeKind, SessionPhase};
use crate::trading::trade_record::Trade;

/// Relative tolerance when checking a persisted equity against its trades.
const INTEGRITY_TOLERANCE: f64 = 1e-9;

/// Floor on |growth factor| when undoing, so a -100% trade does not divide by zero.
pub const UNDO_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// A backtest session: phase, compounding equity and the ordered trade log.
///
/// Every operation either succeeds or returns an error with the session untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    phase: SessionPhase,
    start_equity: f64,
    equity: f64,
    trades: Vec<Trade>,
    #[serde(default)]
    equity_samples: Vec<EquitySample>,
    #[serde(default)]
    last_levels: Option<LevelSet>,
    /// When set, used instead of Utc::now() for trade timestamps (journal replay)
    #[serde(skip)]
    pub sim_time: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            start_equity: 0.0,
            equity: 0.0,
            trades: Vec::new(),
            equity_samples: Vec::new(),
            last_levels: None,
            sim_time: None,
        }
    }

    /// Rebuilds a finished session from a persisted trade log.
    pub fn restore(start_equity: f64, trades: Vec<Trade>) -> LedgerResult<Self> {
        require_positive("start equity", start_equity)?;
        let mut equity = start_equity;
        let mut equity_samples = Vec::with_capacity(trades.len());
        for t in &trades {
            equity *= t.growth_factor();
            equity_samples.push(EquitySample {
                timestamp: t.timestamp,
                equity,
            });
        }
        info!(
            "Restored session: {} trades | ${:.2} -> ${:.2}",
            trades.len(),
            start_equity,
            equity
        );
        Ok(Self {
            phase: SessionPhase::Ended,
            start_equity,
            equity,
            trades,
            equity_samples,
            last_levels: None,
            sim_time: None,
        })
    }

    /// Checks state read from outside the ledger: an Idle session holds no trades,
    /// otherwise start equity is positive and the trades compound to `equity`.
    pub fn check_integrity(&self) -> LedgerResult<()> {
        if self.phase == SessionPhase::Idle {
            if !self.trades.is_empty() {
                return Err(LedgerError::InvalidInput(format!(
                    "idle session holds {} trades",
                    self.trades.len()
                )));
            }
            return Ok(());
        }
        require_positive("start equity", self.start_equity)?;

        let replayed = self
            .trades
            .iter()
            .fold(self.start_equity, |eq, t| eq * t.growth_factor());
        let scale = replayed.abs().max(self.equity.abs()).max(1.0);
        let drift = (replayed - self.equity).abs();
        if !self.equity.is_finite() || drift > INTEGRITY_TOLERANCE * scale {
            return Err(LedgerError::InvalidInput(format!(
                "equity {} does not match {} replayed from {} trades",
                self.equity,
                replayed,
                self.trades.len()
            )));
        }
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.sim_time.unwrap_or_else(Utc::now)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn start_equity(&self) -> f64 {
        self.start_equity
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_samples(&self) -> &[EquitySample] {
        &self.equity_samples
    }

    pub fn last_levels(&self) -> Option<&LevelSet> {
        self.last_levels.as_ref()
    }

    /// Replaces the pending calculation. Recorded trades are unaffected.
    pub fn set_levels(&mut self, levels: LevelSet) {
        debug!(
            "Levels updated: {} entry {} | SL {} | TP {}",
            levels.side, levels.entry, levels.stop_loss, levels.take_profit
        );
        self.last_levels = Some(levels);
    }

    /// Computes levels with `calc` and keeps them as the pending calculation.
    /// Invalid inputs leave the previous calculation in place.
    pub fn calculate(
        &mut self,
        calc: &LevelCalculator,
        entry: f64,
        atr: f64,
        side: Direction,
        sl_multiple: f64,
    ) -> LedgerResult<LevelSet> {
        let levels = calc.compute(entry, atr, side, sl_multiple)?;
        self.set_levels(levels);
        Ok(levels)
    }

    pub fn start(&mut self, start_equity: f64) -> LedgerResult<()> {
        if self.phase == SessionPhase::Recording {
            return Err(self.reject("start"));
        }
        require_positive("start equity", start_equity)?;

        self.phase = SessionPhase::Recording;
        self.start_equity = start_equity;
        self.equity = start_equity;
        self.trades.clear();
        self.equity_samples.clear();

        info!("Backtest session started with ${:.2}", start_equity);
        Ok(())
    }

    /// Resolves `outcome` against the pending levels, compounds equity and logs the trade.
    pub fn record_outcome(&mut self, outcome: OutcomeKind) -> LedgerResult<&Trade> {
        if self.phase != SessionPhase::Recording {
            return Err(self.reject("record a trade"));
        }
        let levels = self.last_levels.ok_or(LedgerError::NoPendingCalculation)?;
        let resolution = resolve(&levels, outcome)?;

        let timestamp = self.now();
        let trade = Trade::new(timestamp, &levels, &resolution);

        self.equity *= trade.growth_factor();
        self.equity_samples.push(EquitySample {
            timestamp,
            equity: self.equity,
        });

        info!(
            "Recorded {} #{} ({}): {:+.2}% | equity ${:.2}",
            trade.result,
            self.trades.len() + 1,
            outcome,
            trade.pct_gain,
            self.equity
        );

        self.trades.push(trade);
        Ok(&self.trades[self.trades.len() - 1])
    }

    /// Removes the most recent trade and divides its growth back out of equity.
    pub fn undo_last(&mut self) -> LedgerResult<Trade> {
        if self.phase != SessionPhase::Recording {
            return Err(self.reject("undo"));
        }
        let trade = self.trades.pop().ok_or(LedgerError::EmptyLedger)?;

        let mut factor = trade.growth_factor();
        if factor.abs() < UNDO_EPSILON {
            factor = UNDO_EPSILON.copysign(factor);
        }
        self.equity /= factor;
        self.equity_samples.pop();

        info!(
            "Undid {} ({:+.2}%) | equity ${:.2}",
            trade.result, trade.pct_gain, self.equity
        );
        Ok(trade)
    }

    pub fn end(&mut self) -> LedgerResult<()> {
        if self.phase != SessionPhase::Recording {
            return Err(self.reject("end the session"));
        }
        self.phase = SessionPhase::Ended;
        info!(
            "Backtest session ended: {} trades | equity ${:.2}",
            self.trades.len(),
            self.equity
        );
        Ok(())
    }

    fn reject(&self, operation: &'static str) -> LedgerError {
        warn!("Rejected {} while session is {}", operation, self.phase);
        LedgerError::InvalidPhase {
            operation,
            phase: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::levels::compute_levels;
    use crate::models::{ExitSpec, TradeResult};
    use crate::test_helpers::{long_reference_levels, recording_session};

    #[test]
    fn new_session_is_idle() {
        let s = Session::new();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.trades().is_empty());
        assert!(s.last_levels().is_none());
    }

    #[test]
    fn start_rejects_non_positive_equity_without_change() {
        let mut s = Session::new();
        assert!(matches!(s.start(0.0), Err(LedgerError::InvalidInput(_))));
        assert!(matches!(s.start(-5.0), Err(LedgerError::InvalidInput(_))));
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        let err = s.start(500.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPhase { .. }));
        assert_eq!(s.trades().len(), 1);
        assert!((s.equity() - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn record_requires_pending_calculation() {
        let mut s = Session::new();
        s.start(1000.0).unwrap();
        assert_eq!(
            s.record_outcome(OutcomeKind::Win).unwrap_err(),
            LedgerError::NoPendingCalculation
        );
        assert!(s.trades().is_empty());
        assert_eq!(s.equity(), 1000.0);
    }

    #[test]
    fn record_requires_recording_phase() {
        let mut s = Session::new();
        s.set_levels(long_reference_levels());
        assert!(matches!(
            s.record_outcome(OutcomeKind::Win),
            Err(LedgerError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn win_then_undo_restores_equity() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        assert!((s.equity() - 1200.0).abs() < 1e-9);
        assert_eq!(s.equity_samples().len(), 1);

        let undone = s.undo_last().unwrap();
        assert_eq!(undone.result, TradeResult::Win);
        assert!((s.equity() - 1000.0).abs() < 1e-9);
        assert!(s.trades().is_empty());
        assert!(s.equity_samples().is_empty());
    }

    #[test]
    fn undo_on_empty_ledger() {
        let mut s = recording_session(1000.0);
        assert_eq!(s.undo_last().unwrap_err(), LedgerError::EmptyLedger);
        assert_eq!(s.equity(), 1000.0);
    }

    #[test]
    fn closed_at_105_compounds_five_percent() {
        let mut s = recording_session(1000.0);
        let t = s
            .record_outcome(OutcomeKind::Closed { exit_price: 105.0 })
            .unwrap();
        assert_eq!(t.exit_price, Some(105.0));
        assert!((s.equity() - 1050.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_partial_win_leaves_state() {
        let mut s = recording_session(1000.0);
        let err = s
            .record_outcome(OutcomeKind::PartialWin {
                exit: ExitSpec::Price(99.0),
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(s.trades().is_empty());
        assert_eq!(s.equity(), 1000.0);
    }

    #[test]
    fn changing_levels_does_not_touch_recorded_trades() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        s.set_levels(compute_levels(50.0, 1.0, Direction::Short, 1.5, 2.0).unwrap());
        assert_eq!(s.trades()[0].entry, 100.0);
        assert_eq!(s.trades()[0].side, Direction::Long);
    }

    #[test]
    fn win_then_loss_compounds_multiplicatively() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        s.record_outcome(OutcomeKind::Loss).unwrap();
        assert!((s.equity() - 1000.0 * 1.2 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn end_blocks_record_and_undo_until_restart() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        s.end().unwrap();
        assert_eq!(s.phase(), SessionPhase::Ended);
        assert!(s.record_outcome(OutcomeKind::Win).is_err());
        assert!(s.undo_last().is_err());
        assert!(s.end().is_err());
        assert_eq!(s.trades().len(), 1);

        s.start(500.0).unwrap();
        assert_eq!(s.phase(), SessionPhase::Recording);
        assert!(s.trades().is_empty());
        assert_eq!(s.equity(), 500.0);
    }

    #[test]
    fn undo_after_total_loss_stays_finite() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Closed { exit_price: 1e-300 }).unwrap();
        s.record_outcome(OutcomeKind::Closed { exit_price: 200.0 }).unwrap();
        s.undo_last().unwrap();
        assert!(s.equity().is_finite());
    }

    #[test]
    fn sim_time_stamps_trades() {
        let mut s = recording_session(1000.0);
        let ts = DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        s.sim_time = Some(ts);
        let t = s.record_outcome(OutcomeKind::Loss).unwrap();
        assert_eq!(t.timestamp, ts);
    }

    #[test]
    fn restore_replays_compounding() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        s.record_outcome(OutcomeKind::Closed { exit_price: 97.0 }).unwrap();
        let restored = Session::restore(1000.0, s.trades().to_vec()).unwrap();
        assert_eq!(restored.phase(), SessionPhase::Ended);
        assert!((restored.equity() - s.equity()).abs() < 1e-9);
        assert_eq!(restored.equity_samples().len(), 2);
    }

    #[test]
    fn integrity_holds_for_recorded_and_restored_sessions() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        s.record_outcome(OutcomeKind::Loss).unwrap();
        assert!(s.check_integrity().is_ok());
        assert!(Session::new().check_integrity().is_ok());

        let restored = Session::restore(1000.0, s.trades().to_vec()).unwrap();
        assert!(restored.check_integrity().is_ok());
    }

    #[test]
    fn integrity_rejects_drifted_equity() {
        let mut s = recording_session(1000.0);
        s.record_outcome(OutcomeKind::Win).unwrap();
        s.equity = 1100.0;
        assert!(matches!(
            s.check_integrity(),
            Err(LedgerError::InvalidInput(_))
        ));

        s.equity = 1200.0;
        s.start_equity = 0.0;
        assert!(s.check_integrity().is_err());
    }
}
