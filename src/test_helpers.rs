use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::core::levels::{compute_levels, LevelSet};
use crate::models::Direction;
use crate::trading::ledger::Session;

/// Config with the stock multiples, independent of the process environment.
pub fn default_test_config() -> Config {
    let mut cfg = Config::default();
    cfg.data_dir = std::env::temp_dir()
        .join(format!("tpsl_test_{}", std::process::id()))
        .to_string_lossy()
        .to_string();
    cfg
}

/// entry 100, ATR 10, long, 1.0 x SL, 2.0 x TP -> SL 90 / TP 120.
pub fn long_reference_levels() -> LevelSet {
    compute_levels(100.0, 10.0, Direction::Long, 1.0, 2.0).unwrap()
}

/// A recording session with the long reference levels pending.
pub fn recording_session(start_equity: f64) -> Session {
    let mut s = Session::new();
    s.start(start_equity).unwrap();
    s.set_levels(long_reference_levels());
    s
}

/// Fixed base time for deterministic timestamps.
pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn minutes_after_base(n: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(n)
}
