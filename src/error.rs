use thiserror::Error;

use crate::models::SessionPhase;

/// Reasons a calculator or ledger operation was rejected.
///
/// A rejected operation never changes session state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no pending calculation: compute levels before recording a trade")]
    NoPendingCalculation,

    #[error("nothing to undo: the trade log is empty")]
    EmptyLedger,

    #[error("cannot {operation} while session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Rejects zero, negative and non-finite values.
pub(crate) fn require_positive(name: &str, value: f64) -> LedgerResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidInput(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}
