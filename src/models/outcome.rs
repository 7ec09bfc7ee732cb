use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the exit of a partial win is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitSpec {
    /// Absolute exit price.
    Price(f64),
    /// Favorable price distance from entry.
    Delta(f64),
}

impl FromStr for ExitSpec {
    type Err = String;

    /// `"110.5"` is a price, `"+2.5"` is a delta.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('+') {
            rest.parse::<f64>()
                .map(ExitSpec::Delta)
                .map_err(|_| format!("invalid price delta '{}'", s))
        } else {
            s.parse::<f64>()
                .map(ExitSpec::Price)
                .map_err(|_| format!("invalid exit price '{}'", s))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Win,
    Loss,
    Closed { exit_price: f64 },
    PartialWin { exit: ExitSpec },
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Win => write!(f, "win"),
            OutcomeKind::Loss => write!(f, "loss"),
            OutcomeKind::Closed { exit_price } => write!(f, "closed @ {}", exit_price),
            OutcomeKind::PartialWin { exit: ExitSpec::Price(p) } => write!(f, "partial @ {}", p),
            OutcomeKind::PartialWin { exit: ExitSpec::Delta(d) } => write!(f, "partial +{}", d),
        }
    }
}

/// Label stored on a recorded trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Win,
    Loss,
    Closed,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TradeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeResult::Win => "WIN",
            TradeResult::Loss => "LOSS",
            TradeResult::Closed => "CLOSED",
        }
    }
}

impl FromStr for TradeResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WIN" => Ok(TradeResult::Win),
            "LOSS" => Ok(TradeResult::Loss),
            "CLOSED" => Ok(TradeResult::Closed),
            other => Err(format!("unknown trade result '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Recording => write!(f, "recording"),
            SessionPhase::Ended => write!(f, "ended"),
        }
    }
}
