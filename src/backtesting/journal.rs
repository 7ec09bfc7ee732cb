use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use crate::models::{Direction, ExitSpec, OutcomeKind};

/// One historical trade to replay: the inputs for the level calculation and how it ended.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub time: Option<DateTime<Utc>>,
    pub side: Direction,
    pub entry: f64,
    pub atr: f64,
    pub sl_multiple: f64,
    pub outcome: OutcomeKind,
}

#[derive(Debug, Deserialize)]
struct JournalRow {
    #[serde(default)]
    time: Option<String>,
    side: String,
    entry: f64,
    atr: f64,
    sl_multiple: f64,
    outcome: String,
    #[serde(default)]
    exit: Option<String>,
}

impl JournalRow {
    fn into_entry(self) -> Result<JournalEntry> {
        let time = match self.time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .with_context(|| format!("bad time '{}'", raw))?
                    .with_timezone(&Utc),
            ),
        };
        let side: Direction = self.side.parse().map_err(|e: String| anyhow!(e))?;
        let exit = self
            .exit
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let outcome = match self.outcome.trim().to_lowercase().as_str() {
            "win" => OutcomeKind::Win,
            "loss" => OutcomeKind::Loss,
            "closed" | "close" => {
                let raw = exit.ok_or_else(|| anyhow!("closed trade needs an exit price"))?;
                let exit_price = raw
                    .parse::<f64>()
                    .with_context(|| format!("bad exit price '{}'", raw))?;
                OutcomeKind::Closed { exit_price }
            }
            "partial" | "partial_win" => {
                let raw = exit.ok_or_else(|| anyhow!("partial win needs an exit price or +delta"))?;
                let exit: ExitSpec = raw.parse().map_err(|e: String| anyhow!(e))?;
                OutcomeKind::PartialWin { exit }
            }
            other => bail!("unknown outcome '{}'", other),
        };

        Ok(JournalEntry {
            time,
            side,
            entry: self.entry,
            atr: self.atr,
            sl_multiple: self.sl_multiple,
            outcome,
        })
    }
}

/// Parses a journal with header `time,side,entry,atr,sl_multiple,outcome,exit`.
pub fn parse_journal(content: &str) -> Result<Vec<JournalEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    rdr.deserialize::<JournalRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(anyhow::Error::from)
                .and_then(JournalRow::into_entry)
                .with_context(|| format!("journal line {}", i + 2))
        })
        .collect()
}

pub fn load_journal(path: &Path) -> Result<Vec<JournalEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read journal {}", path.display()))?;
    parse_journal(&content)
}
