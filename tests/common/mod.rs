use chrono::{DateTime, Duration, Utc};
use tpsl_backtester::config::Config;

/// Config with stock multiples and a per-process temp data dir.
pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.data_dir = std::env::temp_dir()
        .join(format!("tpsl_integ_{}", std::process::id()))
        .to_string_lossy()
        .to_string();
    cfg
}

pub fn at_minute(n: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-17T13:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::minutes(n)
}

/// Builds a journal CSV from (side, entry, atr, sl_multiple, outcome, exit) rows,
/// one minute apart.
pub fn journal(rows: &[(&str, f64, f64, f64, &str, &str)]) -> String {
    let mut out = String::from("time,side,entry,atr,sl_multiple,outcome,exit\n");
    for (i, (side, entry, atr, sl, outcome, exit)) in rows.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            at_minute(i as i64).to_rfc3339(),
            side,
            entry,
            atr,
            sl,
            outcome,
            exit
        ));
    }
    out
}
