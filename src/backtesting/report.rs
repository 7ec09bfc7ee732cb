use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::models::SessionPhase;
use crate::trading::ledger::Session;
use crate::trading::trade_record::Trade;

/// Relative tolerance when comparing replayed equity with the ledger's own value.
const CONSISTENCY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    /// 0 is the starting equity, n is the equity after trade n.
    pub trade_index: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub equity: f64,
}

/// Aggregate statistics over a session's trade log. Building one never mutates the session.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub phase: SessionPhase,

    // Performance
    pub start_equity: f64,
    pub end_equity: f64,
    pub total_return_pct: f64,

    // Trades
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    pub profit_factor: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    // Equity curve, replayed from the trade log
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn from_session(session: &Session) -> Self {
        Self::from_trades(session.phase(), session.start_equity(), session.trades())
    }

    pub fn from_trades(phase: SessionPhase, start_equity: f64, trades: &[Trade]) -> Self {
        let total_trades = trades.len();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let losses = total_trades - wins;
        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let equity_curve = replay_equity_curve(start_equity, trades);
        let end_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(start_equity);

        let gains: Vec<f64> = trades.iter().map(|t| t.pct_gain).collect();
        let win_gains: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_win())
            .map(|t| t.pct_gain)
            .collect();
        let loss_gains: Vec<f64> = trades
            .iter()
            .filter(|t| !t.is_win())
            .map(|t| t.pct_gain)
            .collect();

        let avg_win_pct = mean(&win_gains);
        let avg_loss_pct = mean(&loss_gains);

        let gross_profit: f64 = gains.iter().filter(|g| **g > 0.0).sum();
        let gross_loss: f64 = gains.iter().filter(|g| **g < 0.0).sum::<f64>().abs();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (best_trade_pct, worst_trade_pct) = if gains.is_empty() {
            (0.0, 0.0)
        } else {
            (
                gains.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                gains.iter().copied().fold(f64::INFINITY, f64::min),
            )
        };

        let (max_drawdown, max_drawdown_pct) = max_drawdown(&equity_curve);

        BacktestReport {
            phase,
            start_equity,
            end_equity,
            total_return_pct: if start_equity > 0.0 {
                (end_equity / start_equity - 1.0) * 100.0
            } else {
                0.0
            },
            total_trades,
            wins,
            losses,
            win_rate,
            avg_win_pct,
            avg_loss_pct,
            best_trade_pct,
            worst_trade_pct,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio: compute_sharpe(&gains),
            equity_curve,
        }
    }

    /// Whether the replayed curve ends where the ledger's live equity is.
    pub fn consistent_with(&self, ledger_equity: f64) -> bool {
        let scale = ledger_equity.abs().max(self.end_equity.abs()).max(1.0);
        (self.end_equity - ledger_equity).abs() <= CONSISTENCY_TOLERANCE * scale
    }

    pub fn print_summary(&self) {
        println!("{}", self);
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{}", "=".repeat(70))?;
        writeln!(f, "  BACKTEST SUMMARY ({})", self.phase)?;
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f)?;
        writeln!(f, "  PERFORMANCE")?;
        writeln!(f, "  ───────────────────────────────────")?;
        writeln!(f, "  Start:       ${:.2}", self.start_equity)?;
        writeln!(f, "  End:         ${:.2}", self.end_equity)?;
        writeln!(f, "  Return:      {:+.2}%", self.total_return_pct)?;
        writeln!(f)?;
        writeln!(f, "  TRADES")?;
        writeln!(f, "  ───────────────────────────────────")?;
        writeln!(f, "  Total:       {}", self.total_trades)?;
        writeln!(f, "  Win/Loss:    {} / {}", self.wins, self.losses)?;
        writeln!(f, "  Win Rate:    {:.2}%", self.win_rate)?;
        writeln!(f, "  Avg Win:     {:+.2}%", self.avg_win_pct)?;
        writeln!(f, "  Avg Loss:    {:+.2}%", self.avg_loss_pct)?;
        writeln!(f, "  Best:        {:+.2}%", self.best_trade_pct)?;
        writeln!(f, "  Worst:       {:+.2}%", self.worst_trade_pct)?;
        writeln!(f, "  Profit Factor: {:.2}", self.profit_factor)?;
        writeln!(f)?;
        writeln!(f, "  RISK")?;
        writeln!(f, "  ───────────────────────────────────")?;
        writeln!(
            f,
            "  Max DD:      ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        )?;
        writeln!(f, "  Sharpe:      {:.2}", self.sharpe_ratio)?;
        write!(f, "{}", "=".repeat(70))
    }
}

/// Replays `trades` from `start_equity` with the ledger's compounding rule.
pub fn replay_equity_curve(start_equity: f64, trades: &[Trade]) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    curve.push(EquityPoint {
        trade_index: 0,
        timestamp: None,
        equity: start_equity,
    });
    let mut equity = start_equity;
    for (i, t) in trades.iter().enumerate() {
        equity *= t.growth_factor();
        curve.push(EquityPoint {
            trade_index: i + 1,
            timestamp: Some(t.timestamp),
            equity,
        });
    }
    curve
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Peak-to-trough drop, absolute and as percent of the peak.
fn max_drawdown(curve: &[EquityPoint]) -> (f64, f64) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0f64;
    let mut max_dd_pct = 0.0f64;
    for p in curve {
        peak = peak.max(p.equity);
        let dd = peak - p.equity;
        if dd > max_dd {
            max_dd = dd;
            max_dd_pct = if peak > 0.0 { dd / peak * 100.0 } else { 0.0 };
        }
    }
    (max_dd, max_dd_pct)
}

/// Per-trade Sharpe-style ratio: mean / std-dev of % returns, scaled by sqrt(n).
fn compute_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    mean / std_dev * n.sqrt()
}
