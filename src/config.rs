use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedConfig = Arc<RwLock<Config>>;

pub const DEFAULT_SL_MULTIPLES: &[f64] = &[1.0, 1.5];
pub const DEFAULT_TP_MULTIPLE: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Levels
    pub sl_multiples: Vec<f64>,
    pub tp_multiple: f64,

    // Output rounding (display only)
    pub price_decimals: usize,
    pub percent_decimals: usize,

    // Backtest
    pub start_equity: f64,

    // Presentation
    pub display_tz: Tz,
    pub data_dir: String,

    // Logging
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sl_multiples: DEFAULT_SL_MULTIPLES.to_vec(),
            tp_multiple: DEFAULT_TP_MULTIPLE,
            price_decimals: 4,
            percent_decimals: 2,
            start_equity: 10_000.0,
            display_tz: Tz::UTC,
            data_dir: "data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let defaults = Config::default();

        let sl_multiples = parse_multiples(&env("SL_MULTIPLES", ""))
            .unwrap_or_else(|| defaults.sl_multiples.clone());

        let tp_multiple = env("TP_MULTIPLE", "2.0")
            .parse::<f64>()
            .ok()
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(DEFAULT_TP_MULTIPLE);

        Config {
            sl_multiples,
            tp_multiple,
            price_decimals: env("PRICE_DECIMALS", "4").parse().unwrap_or(4),
            percent_decimals: env("PERCENT_DECIMALS", "2").parse().unwrap_or(2),
            start_equity: env("START_EQUITY", "10000")
                .parse::<f64>()
                .ok()
                .filter(|e| e.is_finite() && *e > 0.0)
                .unwrap_or(defaults.start_equity),
            display_tz: env("DISPLAY_TZ", "UTC").parse().unwrap_or(Tz::UTC),
            data_dir: env("DATA_DIR", "data"),
            log_level: env("LOG_LEVEL", "info"),
        }
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    /// Smallest configured multiple, used when a command omits one.
    pub fn default_sl_multiple(&self) -> f64 {
        let smallest = self
            .sl_multiples
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if smallest.is_finite() {
            smallest
        } else {
            DEFAULT_SL_MULTIPLES[0]
        }
    }
}

/// Parses a comma separated list of positive multiples. Empty or invalid lists yield `None`.
fn parse_multiples(raw: &str) -> Option<Vec<f64>> {
    let values: Vec<f64> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|m| m.is_finite() && *m > 0.0))
        .collect::<Option<Vec<_>>>()?;
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
