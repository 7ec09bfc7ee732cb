use anyhow::Result;
use std::path::PathBuf;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use tpsl_backtester::backtesting::export::save_artifacts;
use tpsl_backtester::cli::{apply, Command, HELP};
use tpsl_backtester::config::{Config, SharedConfig};
use tpsl_backtester::core::levels::LevelCalculator;
use tpsl_backtester::trading::store::{JsonFileStore, SessionStore};
use tpsl_backtester::trading::SessionRegistry;

const DEFAULT_USER: &str = "local";

/// Line-oriented front end: reads commands from stdin and drives one session per user.
pub struct Shell {
    config: SharedConfig,
    registry: SessionRegistry,
    store: JsonFileStore,
    user: String,
}

impl Shell {
    pub async fn new(config: SharedConfig) -> Self {
        let data_dir = config.read().await.data_dir.clone();
        Self {
            config,
            registry: SessionRegistry::new(),
            store: JsonFileStore::new(PathBuf::from(data_dir).join("sessions")),
            user: DEFAULT_USER.to_string(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let cfg = self.config.read().await.clone();
        let calc = LevelCalculator::new(&cfg);

        info!("{}", "=".repeat(60));
        info!("TP/SL calculator + backtest ledger");
        info!(
            "SL multiples {:?} | TP multiple {} | display tz {}",
            cfg.sl_multiples, cfg.tp_multiple, cfg.display_tz
        );
        info!("{}", "=".repeat(60));

        let mut stdout = io::stdout();
        let mut lines = BufReader::new(io::stdin()).lines();
        stdout.write_all(b"Type 'help' for commands.\n").await?;

        loop {
            stdout
                .write_all(format!("[{}]> ", self.user).as_bytes())
                .await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply = match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(cmd) => self.dispatch(cmd, &cfg, &calc).await,
                Err(e) => Err(e),
            };
            let text = match reply {
                Ok(text) => text,
                Err(e) => {
                    debug!("Command '{}' failed: {:#}", line, e);
                    format!("error: {:#}", e)
                }
            };
            stdout.write_all(text.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }

        info!("Shell closed");
        Ok(())
    }

    async fn dispatch(&mut self, cmd: Command, cfg: &Config, calc: &LevelCalculator) -> Result<String> {
        match cmd {
            Command::Help => Ok(HELP.to_string()),
            Command::User { id } => {
                self.registry.session(&id).await;
                self.user = id;
                Ok(format!("Switched to user '{}'.", self.user))
            }
            Command::Users => Ok(self.registry.users().await.join(", ")),
            Command::Save { name } => {
                let shared = self.registry.session(&self.user).await;
                let session = shared.lock().await;
                self.store.save(&name, &session).await?;
                Ok(format!("Saved snapshot '{}'.", name))
            }
            Command::Load { name } => {
                let session = self.store.load(&name).await?;
                let phase = session.phase();
                self.registry.replace(&self.user, session).await;
                Ok(format!("Loaded snapshot '{}' ({}).", name, phase))
            }
            Command::Export { dir } => {
                let dir = PathBuf::from(dir.unwrap_or_else(|| cfg.data_dir.clone()));
                let shared = self.registry.session(&self.user).await;
                let session = shared.lock().await;
                let run_dir = save_artifacts(&session, cfg, &dir)?;
                Ok(format!("Exported to {}", run_dir.display()))
            }
            cmd => {
                let shared = self.registry.session(&self.user).await;
                let mut session = shared.lock().await;
                apply(&mut session, &cmd, cfg, calc)
            }
        }
    }
}
