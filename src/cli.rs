use anyhow::{anyhow, bail, Context, Result};
use std::str::FromStr;

use crate::backtesting::export::{trades_table, TABLE_COLUMNS};
use crate::backtesting::BacktestReport;
use crate::config::Config;
use crate::core::levels::LevelCalculator;
use crate::models::{Direction, ExitSpec, OutcomeKind};
use crate::trading::ledger::Session;

pub const HELP: &str = "\
Commands:
  calc <long|short> <entry> <atr> [slmult]   compute SL/TP/RR (kept for recording)
  start [equity]                             start a new backtest session
  win | loss                                 record a full TP / full SL on the last calculation
  close <price>                              record a close at an arbitrary price
  partial <price|+delta>                     record a partial win (capped at TP)
  undo                                       remove the last trade
  end                                        end the session
  summary | table                            show statistics / the trades table
  export [dir]                               write trades, equity and session CSVs
  save <name> | load <name>                  snapshot / restore the session
  user <id> | users                          switch user / list users
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Calc {
        side: Direction,
        entry: f64,
        atr: f64,
        sl_multiple: Option<f64>,
    },
    Start {
        equity: Option<f64>,
    },
    Record(OutcomeKind),
    Undo,
    End,
    Summary,
    Table,
    Export {
        dir: Option<String>,
    },
    Save {
        name: String,
    },
    Load {
        name: String,
    },
    User {
        id: String,
    },
    Users,
    Help,
    Quit,
}

fn number(arg: Option<&str>, what: &str) -> Result<f64> {
    let raw = arg.ok_or_else(|| anyhow!("missing {}", what))?;
    raw.parse::<f64>()
        .with_context(|| format!("invalid {} '{}'", what, raw))
}

fn word(arg: Option<&str>, what: &str) -> Result<String> {
    arg.map(str::to_string)
        .ok_or_else(|| anyhow!("missing {}", what))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_lowercase();

        let cmd = match verb.as_str() {
            "calc" | "c" => {
                let side: Direction = parts
                    .next()
                    .ok_or_else(|| anyhow!("missing direction"))?
                    .parse()
                    .map_err(|e: String| anyhow!(e))?;
                let entry = number(parts.next(), "entry price")?;
                let atr = number(parts.next(), "ATR")?;
                let sl_multiple = match parts.next() {
                    Some(raw) => Some(
                        raw.parse::<f64>()
                            .with_context(|| format!("invalid SL multiple '{}'", raw))?,
                    ),
                    None => None,
                };
                Command::Calc {
                    side,
                    entry,
                    atr,
                    sl_multiple,
                }
            }
            "start" => Command::Start {
                equity: match parts.next() {
                    Some(raw) => Some(number(Some(raw), "equity")?),
                    None => None,
                },
            },
            "win" | "w" => Command::Record(OutcomeKind::Win),
            "loss" | "l" => Command::Record(OutcomeKind::Loss),
            "close" => Command::Record(OutcomeKind::Closed {
                exit_price: number(parts.next(), "exit price")?,
            }),
            "partial" | "p" => {
                let raw = parts
                    .next()
                    .ok_or_else(|| anyhow!("missing exit price or +delta"))?;
                let exit: ExitSpec = raw.parse().map_err(|e: String| anyhow!(e))?;
                Command::Record(OutcomeKind::PartialWin { exit })
            }
            "undo" | "u" => Command::Undo,
            "end" => Command::End,
            "summary" => Command::Summary,
            "table" => Command::Table,
            "export" => Command::Export {
                dir: parts.next().map(str::to_string),
            },
            "save" => Command::Save {
                name: word(parts.next(), "snapshot name")?,
            },
            "load" => Command::Load {
                name: word(parts.next(), "snapshot name")?,
            },
            "user" => Command::User {
                id: word(parts.next(), "user id")?,
            },
            "users" => Command::Users,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };

        if let Some(extra) = parts.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(cmd)
    }
}

/// Runs a session command and returns the text to show. Shell-level commands
/// (export, save, load, user, users, help, quit) are handled by the caller.
pub fn apply(
    session: &mut Session,
    cmd: &Command,
    cfg: &Config,
    calc: &LevelCalculator,
) -> Result<String> {
    match cmd {
        Command::Calc {
            side,
            entry,
            atr,
            sl_multiple,
        } => {
            let sl = sl_multiple.unwrap_or_else(|| cfg.default_sl_multiple());
            let levels = session.calculate(calc, *entry, *atr, *side, sl)?;
            Ok(format!(
                "SL = {} x ATR, TP = {} x ATR\n{}",
                sl,
                calc.tp_multiple(),
                levels.display(cfg)
            ))
        }
        Command::Start { equity } => {
            let equity = equity.unwrap_or(cfg.start_equity);
            session.start(equity)?;
            Ok(format!("Backtesting started with {:.2}.", equity))
        }
        Command::Record(outcome) => {
            let trade = session.record_outcome(*outcome)?;
            let msg = format!(
                "Recorded {} ({:+.*}%).",
                trade.result, cfg.percent_decimals, trade.pct_gain
            );
            Ok(format!("{} Equity {:.2}", msg, session.equity()))
        }
        Command::Undo => {
            let trade = session.undo_last()?;
            Ok(format!(
                "Removed {} ({:+.*}%). Equity {:.2}",
                trade.result,
                cfg.percent_decimals,
                trade.pct_gain,
                session.equity()
            ))
        }
        Command::End => {
            session.end()?;
            Ok(format!(
                "Backtesting ended.\n{}",
                BacktestReport::from_session(session)
            ))
        }
        Command::Summary => Ok(BacktestReport::from_session(session).to_string()),
        Command::Table => Ok(render_table(session, cfg)),
        other => bail!("{:?} is not a session command", other),
    }
}

fn render_table(session: &Session, cfg: &Config) -> String {
    let rows = trades_table(session.trades(), cfg);
    if rows.is_empty() {
        return "No trades recorded.".to_string();
    }
    let mut out = TABLE_COLUMNS.join(" | ");
    for row in rows {
        out.push('\n');
        out.push_str(
            &[
                row.serial.to_string(),
                row.time,
                row.result,
                row.side,
                row.entry,
                row.atr,
                row.sl_multiple,
                row.stop_loss,
                row.take_profit,
                row.reward_risk,
                row.exit_price,
                row.pct_gain,
            ]
            .join(" | "),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionPhase;
    use crate::test_helpers::default_test_config;

    fn run(session: &mut Session, line: &str) -> Result<String> {
        let cfg = default_test_config();
        let calc = LevelCalculator::new(&cfg);
        apply(session, &line.parse()?, &cfg, &calc)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            "calc long 100 10 1.5".parse::<Command>().unwrap(),
            Command::Calc {
                side: Direction::Long,
                entry: 100.0,
                atr: 10.0,
                sl_multiple: Some(1.5)
            }
        );
        assert_eq!(
            "partial +2".parse::<Command>().unwrap(),
            Command::Record(OutcomeKind::PartialWin {
                exit: ExitSpec::Delta(2.0)
            })
        );
        assert_eq!("START".parse::<Command>().unwrap(), Command::Start { equity: None });
        assert!("close".parse::<Command>().is_err());
        assert!("win now".parse::<Command>().is_err());
        assert!("fly".parse::<Command>().is_err());
    }

    #[test]
    fn shell_flow_matches_reference_example() {
        let mut s = Session::new();
        run(&mut s, "start 1000").unwrap();
        let out = run(&mut s, "calc long 100 10").unwrap();
        assert!(out.contains("SL 90"));
        assert!(out.contains("TP 120"));
        run(&mut s, "win").unwrap();
        assert!((s.equity() - 1200.0).abs() < 1e-9);
        run(&mut s, "undo").unwrap();
        assert!((s.equity() - 1000.0).abs() < 1e-9);
        run(&mut s, "close 105").unwrap();
        assert!((s.equity() - 1050.0).abs() < 1e-9);
        let table = run(&mut s, "table").unwrap();
        assert!(table.contains("CLOSED"));
        let out = run(&mut s, "end").unwrap();
        assert!(out.contains("BACKTEST SUMMARY"));
        assert_eq!(s.phase(), SessionPhase::Ended);
    }

    #[test]
    fn rejected_commands_report_reason() {
        let mut s = Session::new();
        let err = run(&mut s, "win").unwrap_err();
        assert!(err.to_string().contains("cannot record a trade"));
        run(&mut s, "start").unwrap();
        assert_eq!(s.equity(), default_test_config().start_equity);
        let err = run(&mut s, "loss").unwrap_err();
        assert!(err.to_string().contains("no pending calculation"));
        assert!(run(&mut s, "calc short 100 10 2.5").is_err());
    }
}
