use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::levels::LevelSet;
use crate::core::outcome::Resolution;
use crate::models::{Direction, TradeResult};

/// One recorded trade. Never mutated once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub side: Direction,
    pub entry: f64,
    pub atr: f64,
    pub sl_multiple: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reward_risk: f64,
    pub result: TradeResult,
    #[serde(default)]
    pub exit_price: Option<f64>,
    /// Signed percent applied to equity.
    pub pct_gain: f64,
}

impl Trade {
    pub fn new(timestamp: DateTime<Utc>, levels: &LevelSet, resolution: &Resolution) -> Self {
        Self {
            timestamp,
            side: levels.side,
            entry: levels.entry,
            atr: levels.atr,
            sl_multiple: levels.sl_multiple,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            reward_risk: levels.reward_risk,
            result: resolution.result,
            exit_price: resolution.exit_price,
            pct_gain: resolution.pct_gain,
        }
    }

    /// Counts toward wins: every `WIN`, and `CLOSED` trades that did not lose.
    pub fn is_win(&self) -> bool {
        match self.result {
            TradeResult::Win => true,
            TradeResult::Loss => false,
            TradeResult::Closed => self.pct_gain >= 0.0,
        }
    }

    /// Multiplier this trade applies to equity.
    pub fn growth_factor(&self) -> f64 {
        1.0 + self.pct_gain / 100.0
    }
}
