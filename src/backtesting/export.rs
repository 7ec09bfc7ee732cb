//! Trades-table and equity-curve emission, plus the session file round trip.
//!
//! The display table rounds prices and percentages for presentation. Session
//! files use the same columns but keep full precision so a reloaded session
//! compounds to the same equity.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtesting::report::EquityPoint;
use crate::config::Config;
use crate::models::{Direction, TradeResult};
use crate::trading::ledger::Session;
use crate::trading::trade_record::Trade;

pub const TABLE_COLUMNS: [&str; 12] = [
    "Serial Number",
    "Time",
    "Result",
    "Side",
    "Entry",
    "ATR",
    "SL Multiple",
    "Stop Loss",
    "Take Profit",
    "Risk/Return",
    "Exit Price",
    "% Gain",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NO_EXIT: &str = "None";

/// One rendered row of the trades table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub serial: usize,
    pub time: String,
    pub result: String,
    pub side: String,
    pub entry: String,
    pub atr: String,
    pub sl_multiple: String,
    pub stop_loss: String,
    pub take_profit: String,
    pub reward_risk: String,
    pub exit_price: String,
    pub pct_gain: String,
}

impl TableRow {
    fn fields(&self) -> [String; 12] {
        [
            self.serial.to_string(),
            self.time.clone(),
            self.result.clone(),
            self.side.clone(),
            self.entry.clone(),
            self.atr.clone(),
            self.sl_multiple.clone(),
            self.stop_loss.clone(),
            self.take_profit.clone(),
            self.reward_risk.clone(),
            self.exit_price.clone(),
            self.pct_gain.clone(),
        ]
    }
}

/// Renders the trades table with display rounding and the configured time zone.
pub fn trades_table(trades: &[Trade], cfg: &Config) -> Vec<TableRow> {
    let p = cfg.price_decimals;
    let q = cfg.percent_decimals;
    trades
        .iter()
        .enumerate()
        .map(|(i, t)| TableRow {
            serial: i + 1,
            time: t
                .timestamp
                .with_timezone(&cfg.display_tz)
                .format(TIME_FORMAT)
                .to_string(),
            result: t.result.to_string(),
            side: t.side.to_string(),
            entry: format!("{:.*}", p, t.entry),
            atr: format!("{:.*}", p, t.atr),
            sl_multiple: format!("{:.2}", t.sl_multiple),
            stop_loss: format!("{:.*}", p, t.stop_loss),
            take_profit: format!("{:.*}", p, t.take_profit),
            reward_risk: format!("{:.*}", q, t.reward_risk),
            exit_price: t
                .exit_price
                .map(|x| format!("{:.*}", p, x))
                .unwrap_or_else(|| NO_EXIT.to_string()),
            pct_gain: format!("{:.*}%", q, t.pct_gain),
        })
        .collect()
}

pub fn export_table_csv(rows: &[TableRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TABLE_COLUMNS)?;
    for row in rows {
        wtr.write_record(row.fields())?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["trade_index", "time", "equity"])?;
    for point in curve {
        wtr.write_record([
            point.trade_index.to_string(),
            point.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
            format!("{:.2}", point.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Full-precision session file using the table's column set.
pub fn save_session_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TABLE_COLUMNS)?;
    for (i, t) in trades.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            t.timestamp.to_rfc3339(),
            t.result.to_string(),
            t.side.to_string(),
            t.entry.to_string(),
            t.atr.to_string(),
            t.sl_multiple.to_string(),
            t.stop_loss.to_string(),
            t.take_profit.to_string(),
            t.reward_risk.to_string(),
            t.exit_price
                .map(|x| x.to_string())
                .unwrap_or_else(|| NO_EXIT.to_string()),
            t.pct_gain.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    #[serde(rename = "Serial Number")]
    serial: usize,
    #[serde(rename = "Time")]
    time: DateTime<Utc>,
    #[serde(rename = "Result")]
    result: TradeResult,
    #[serde(rename = "Side")]
    side: Direction,
    #[serde(rename = "Entry")]
    entry: f64,
    #[serde(rename = "ATR")]
    atr: f64,
    #[serde(rename = "SL Multiple")]
    sl_multiple: f64,
    #[serde(rename = "Stop Loss")]
    stop_loss: f64,
    #[serde(rename = "Take Profit")]
    take_profit: f64,
    #[serde(rename = "Risk/Return")]
    reward_risk: f64,
    #[serde(rename = "Exit Price")]
    exit_price: String,
    #[serde(rename = "% Gain")]
    pct_gain: String,
}

/// Parses a session file written by [`save_session_csv`].
pub fn load_session_csv(content: &str) -> Result<Vec<Trade>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut trades = Vec::new();
    for (i, row) in rdr.deserialize::<SessionRow>().enumerate() {
        let row = row.with_context(|| format!("malformed session row {}", i + 1))?;
        if row.serial != i + 1 {
            bail!("session row {} has serial number {}", i + 1, row.serial);
        }
        let exit_price = match row.exit_price.as_str() {
            "" | NO_EXIT => None,
            raw => Some(
                raw.parse::<f64>()
                    .with_context(|| format!("bad exit price '{}' in row {}", raw, i + 1))?,
            ),
        };
        let pct_gain = row
            .pct_gain
            .trim_end_matches('%')
            .parse::<f64>()
            .with_context(|| format!("bad % gain '{}' in row {}", row.pct_gain, i + 1))?;

        trades.push(Trade {
            timestamp: row.time,
            side: row.side,
            entry: row.entry,
            atr: row.atr,
            sl_multiple: row.sl_multiple,
            stop_loss: row.stop_loss,
            take_profit: row.take_profit,
            reward_risk: row.reward_risk,
            result: row.result,
            exit_price,
            pct_gain,
        });
    }
    Ok(trades)
}

/// Writes `trades.csv`, `equity.csv` and `session.csv` for `session` into a
/// timestamped directory under `output_dir`. Returns the directory.
pub fn save_artifacts(session: &Session, cfg: &Config, output_dir: &Path) -> Result<PathBuf> {
    let report = crate::backtesting::report::BacktestReport::from_session(session);
    let run_dir = create_run_dir(output_dir)?;

    let table = trades_table(session.trades(), cfg);
    std::fs::write(run_dir.join("trades.csv"), export_table_csv(&table)?)?;
    std::fs::write(
        run_dir.join("equity.csv"),
        export_equity_csv(&report.equity_curve)?,
    )?;
    std::fs::write(run_dir.join("session.csv"), save_session_csv(session.trades())?)?;

    Ok(run_dir)
}

/// Creates a fresh `backtest_<ts>` directory. An existing one is never reused.
fn create_run_dir(output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create export dir: {}", output_dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
    for attempt in 0..100 {
        let name = if attempt == 0 {
            format!("backtest_{}", stamp)
        } else {
            format!("backtest_{}_{}", stamp, attempt)
        };
        let run_dir = output_dir.join(name);
        match std::fs::create_dir(&run_dir) {
            Ok(()) => return Ok(run_dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to create export dir: {}", run_dir.display()))
            }
        }
    }
    bail!("no free export directory under {}", output_dir.display())
}
