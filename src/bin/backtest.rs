use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

use tpsl_backtester::backtesting::export::save_artifacts;
use tpsl_backtester::backtesting::journal::load_journal;
use tpsl_backtester::backtesting::{BacktestReport, BacktestRunner};
use tpsl_backtester::config::Config;

fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    // Parse CLI args: <journal.csv> [start_equity] [output_dir]
    let args: Vec<String> = std::env::args().collect();

    let Some(journal_path) = args.get(1).map(PathBuf::from) else {
        bail!("usage: backtest <journal.csv> [start_equity] [output_dir]");
    };

    let start_equity: f64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.start_equity);

    let output_dir = args
        .get(3)
        .cloned()
        .unwrap_or_else(|| cfg.data_dir.clone());

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║          TP/SL BACKTEST - JOURNAL REPLAY                 ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Journal:    {}", journal_path.display());
    println!("║  Equity:     ${:.2}", start_equity);
    println!("║  SL mult:    {:?} x ATR", cfg.sl_multiples);
    println!("║  TP mult:    {} x ATR", cfg.tp_multiple);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let entries = load_journal(&journal_path)?;
    if entries.is_empty() {
        println!("ERROR: journal has no trades. Nothing to replay.");
        return Ok(());
    }

    let mut runner = BacktestRunner::new(cfg.clone());
    let report = runner.run(start_equity, &entries)?;

    report.print_summary();

    if !runner.skipped.is_empty() {
        println!("\nSkipped rows:");
        for (row, reason) in &runner.skipped {
            println!("  #{}: {}", row, reason);
        }
    }

    if !report.consistent_with(runner.session.equity()) {
        println!(
            "WARNING: replayed equity {:.6} differs from ledger equity {:.6}",
            report.end_equity,
            runner.session.equity()
        );
    }

    let run_dir = save_artifacts(&runner.session, &cfg, Path::new(&output_dir))?;
    save_report_to_file(&report, &run_dir.join("summary.txt"))?;
    println!("\nArtifacts saved to: {}", run_dir.display());

    Ok(())
}

fn save_report_to_file(report: &BacktestReport, path: &Path) -> Result<()> {
    use std::io::Write;

    let mut f = std::fs::File::create(path)?;
    writeln!(f, "TP/SL Backtest Report")?;
    writeln!(f, "{}", report)?;
    Ok(())
}
