use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "Long",
            Direction::Short => "Short",
        }
    }

    /// Signed percent move from `entry` to `exit`, positive when the move favors this side.
    pub fn directional_percent(self, entry: f64, exit: f64) -> f64 {
        match self {
            Direction::Long => (exit - entry) / entry * 100.0,
            Direction::Short => (entry - exit) / entry * 100.0,
        }
    }

    /// Price reached by moving `distance` in this side's favor.
    pub fn favorable_price(self, entry: f64, distance: f64) -> f64 {
        match self {
            Direction::Long => entry + distance,
            Direction::Short => entry - distance,
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" | "l" => Ok(Direction::Long),
            "short" | "sell" | "s" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}
