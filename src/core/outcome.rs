use serde::{Deserialize, Serialize};

use crate::core::levels::LevelSet;
use crate::error::{require_positive, LedgerError, LedgerResult};
use crate::models::{ExitSpec, OutcomeKind, TradeResult};

/// Percentage return to apply to equity for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub pct_gain: f64,
    pub result: TradeResult,
    /// Exit price stored on the trade; only `Closed` outcomes carry one.
    pub exit_price: Option<f64>,
}

/// Turns a realized outcome on `levels` into a signed percent gain.
///
/// `Closed` is recorded as-is even beyond either level. `PartialWin` must be
/// strictly profitable and is capped at a full take-profit.
pub fn resolve(levels: &LevelSet, outcome: OutcomeKind) -> LedgerResult<Resolution> {
    match outcome {
        OutcomeKind::Win => Ok(Resolution {
            pct_gain: levels.tp_percent,
            result: TradeResult::Win,
            exit_price: None,
        }),
        OutcomeKind::Loss => Ok(Resolution {
            pct_gain: -levels.sl_percent,
            result: TradeResult::Loss,
            exit_price: None,
        }),
        OutcomeKind::Closed { exit_price } => {
            require_positive("exit price", exit_price)?;
            Ok(Resolution {
                pct_gain: levels.side.directional_percent(levels.entry, exit_price),
                result: TradeResult::Closed,
                exit_price: Some(exit_price),
            })
        }
        OutcomeKind::PartialWin { exit } => {
            let exit_price = match exit {
                ExitSpec::Price(p) => p,
                ExitSpec::Delta(d) => levels.side.favorable_price(levels.entry, d),
            };
            require_positive("exit price", exit_price)?;
            let raw = levels.side.directional_percent(levels.entry, exit_price);
            if raw <= 0.0 {
                return Err(LedgerError::InvalidInput(format!(
                    "partial win must be in profit, exit {} gives {:.4}%",
                    exit_price, raw
                )));
            }
            Ok(Resolution {
                pct_gain: raw.min(levels.tp_percent),
                result: TradeResult::Win,
                exit_price: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::levels::compute_levels;
    use crate::models::Direction;

    fn long_setup() -> LevelSet {
        compute_levels(100.0, 10.0, Direction::Long, 1.0, 2.0).unwrap()
    }

    fn short_setup() -> LevelSet {
        compute_levels(100.0, 10.0, Direction::Short, 1.0, 2.0).unwrap()
    }

    #[test]
    fn win_and_loss_use_level_percents() {
        let ls = long_setup();
        let win = resolve(&ls, OutcomeKind::Win).unwrap();
        assert!((win.pct_gain - 20.0).abs() < 1e-9);
        assert_eq!(win.result, TradeResult::Win);
        assert_eq!(win.exit_price, None);

        let loss = resolve(&ls, OutcomeKind::Loss).unwrap();
        assert!((loss.pct_gain + 10.0).abs() < 1e-9);
        assert_eq!(loss.result, TradeResult::Loss);
    }

    #[test]
    fn closed_long_at_105_is_five_percent() {
        let r = resolve(&long_setup(), OutcomeKind::Closed { exit_price: 105.0 }).unwrap();
        assert!((r.pct_gain - 5.0).abs() < 1e-9);
        assert_eq!(r.result, TradeResult::Closed);
        assert_eq!(r.exit_price, Some(105.0));
    }

    #[test]
    fn closed_is_not_clamped() {
        let beyond_tp = resolve(&long_setup(), OutcomeKind::Closed { exit_price: 130.0 }).unwrap();
        assert!((beyond_tp.pct_gain - 30.0).abs() < 1e-9);

        let gap_through_sl = resolve(&long_setup(), OutcomeKind::Closed { exit_price: 85.0 }).unwrap();
        assert!((gap_through_sl.pct_gain + 15.0).abs() < 1e-9);
    }

    #[test]
    fn closed_short_sign_is_inverted() {
        let r = resolve(&short_setup(), OutcomeKind::Closed { exit_price: 95.0 }).unwrap();
        assert!((r.pct_gain - 5.0).abs() < 1e-9);
    }

    #[test]
    fn closed_requires_positive_exit() {
        assert!(matches!(
            resolve(&long_setup(), OutcomeKind::Closed { exit_price: 0.0 }),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn partial_win_is_capped_at_tp() {
        let r = resolve(
            &long_setup(),
            OutcomeKind::PartialWin { exit: ExitSpec::Price(150.0) },
        )
        .unwrap();
        assert_eq!(r.pct_gain, long_setup().tp_percent);
        assert_eq!(r.result, TradeResult::Win);
    }

    #[test]
    fn partial_win_below_tp_keeps_raw_percent() {
        let r = resolve(
            &short_setup(),
            OutcomeKind::PartialWin { exit: ExitSpec::Delta(7.0) },
        )
        .unwrap();
        assert!((r.pct_gain - 7.0).abs() < 1e-9);
    }

    #[test]
    fn partial_win_must_be_profitable() {
        for exit in [ExitSpec::Price(100.0), ExitSpec::Price(95.0), ExitSpec::Delta(-1.0), ExitSpec::Delta(0.0)] {
            assert!(matches!(
                resolve(&long_setup(), OutcomeKind::PartialWin { exit }),
                Err(LedgerError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn partial_win_delta_past_zero_is_rejected() {
        // Short from 100 with a 150 delta implies an exit at -50
        let r = resolve(
            &short_setup(),
            OutcomeKind::PartialWin { exit: ExitSpec::Delta(150.0) },
        );
        assert!(matches!(r, Err(LedgerError::InvalidInput(_))));

        let nan = resolve(
            &short_setup(),
            OutcomeKind::PartialWin { exit: ExitSpec::Delta(f64::NAN) },
        );
        assert!(matches!(nan, Err(LedgerError::InvalidInput(_))));
    }
}
