use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{require_positive, LedgerError, LedgerResult};
use crate::models::Direction;

/// Floor on the risk distance so a vanishing ATR saturates the ratio instead of dividing by zero.
pub const RISK_EPSILON: f64 = 1e-12;

/// Stop-loss / take-profit levels derived from one set of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub side: Direction,
    pub entry: f64,
    pub atr: f64,
    pub sl_multiple: f64,
    pub tp_multiple: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reward_risk: f64,
    /// Price distance from entry to the stop, always >= 0.
    pub sl_distance: f64,
    /// Price distance from entry to the target, always >= 0.
    pub tp_distance: f64,
    pub sl_percent: f64,
    pub tp_percent: f64,
}

/// Derives SL/TP/RR for `side` from an entry price and ATR.
pub fn compute_levels(
    entry: f64,
    atr: f64,
    side: Direction,
    sl_multiple: f64,
    tp_multiple: f64,
) -> LedgerResult<LevelSet> {
    require_positive("entry", entry)?;
    require_positive("atr", atr)?;
    require_positive("stop-loss multiple", sl_multiple)?;
    require_positive("take-profit multiple", tp_multiple)?;

    let (stop_loss, take_profit) = match side {
        Direction::Long => (entry - sl_multiple * atr, entry + tp_multiple * atr),
        Direction::Short => (entry + sl_multiple * atr, entry - tp_multiple * atr),
    };

    let (sl_distance, tp_distance) = match side {
        Direction::Long => (entry - stop_loss, take_profit - entry),
        Direction::Short => (stop_loss - entry, entry - take_profit),
    };

    let reward_risk = tp_distance / sl_distance.max(RISK_EPSILON);

    Ok(LevelSet {
        side,
        entry,
        atr,
        sl_multiple,
        tp_multiple,
        stop_loss,
        take_profit,
        reward_risk,
        sl_distance,
        tp_distance,
        sl_percent: sl_distance.abs() / entry * 100.0,
        tp_percent: tp_distance.abs() / entry * 100.0,
    })
}

/// Calculator bound to the configured multiples.
#[derive(Debug, Clone)]
pub struct LevelCalculator {
    sl_multiples: Vec<f64>,
    tp_multiple: f64,
}

impl LevelCalculator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            sl_multiples: cfg.sl_multiples.clone(),
            tp_multiple: cfg.tp_multiple,
        }
    }

    pub fn tp_multiple(&self) -> f64 {
        self.tp_multiple
    }

    /// Whether `multiple` is one of the configured stop-loss multiples.
    pub fn allows_sl_multiple(&self, multiple: f64) -> bool {
        self.sl_multiples
            .iter()
            .any(|m| (m - multiple).abs() < 1e-9)
    }

    pub fn compute(
        &self,
        entry: f64,
        atr: f64,
        side: Direction,
        sl_multiple: f64,
    ) -> LedgerResult<LevelSet> {
        if !self.allows_sl_multiple(sl_multiple) {
            return Err(LedgerError::InvalidInput(format!(
                "stop-loss multiple {} is not one of {:?}",
                sl_multiple, self.sl_multiples
            )));
        }
        compute_levels(entry, atr, side, sl_multiple, self.tp_multiple)
    }
}

/// Output-boundary view of a [`LevelSet`], rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelsDisplay {
    pub side: Direction,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub sl_distance: f64,
    pub tp_distance: f64,
    pub reward_risk: f64,
    pub sl_percent: f64,
    pub tp_percent: f64,
}

impl LevelSet {
    pub fn display(&self, cfg: &Config) -> LevelsDisplay {
        let p = cfg.price_decimals;
        let q = cfg.percent_decimals;
        LevelsDisplay {
            side: self.side,
            stop_loss: round_to(self.stop_loss, p),
            take_profit: round_to(self.take_profit, p),
            sl_distance: round_to(self.sl_distance, p),
            tp_distance: round_to(self.tp_distance, p),
            reward_risk: round_to(self.reward_risk, q),
            sl_percent: round_to(self.sl_percent, q),
            tp_percent: round_to(self.tp_percent, q),
        }
    }
}

impl std::fmt::Display for LevelsDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | SL {} (Δ {} / {}%) | TP {} (Δ {} / {}%) | R:R {} : 1",
            self.side,
            self.stop_loss,
            self.sl_distance,
            self.sl_percent,
            self.take_profit,
            self.tp_distance,
            self.tp_percent,
            self.reward_risk
        )
    }
}

pub fn round_to(x: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor).round() / factor
}
