use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::protocol::Persona;

#[derive(Parser)]
#[command(name = "relief-sync")]
#[command(version)]
#[command(about = "Chat and supervisor client for the relief-logistics agent backend")]
pub struct Args {
    /// Base URL of the backend (overrides the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// TOML config file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Directory where the session id is persisted
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive chat: each stdin line is submitted, replies are polled
    Chat {
        /// Persona the chat runs under
        #[arg(long, value_enum, default_value = "victim")]
        persona: Persona,

        /// Send this recorded audio file before reading stdin
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Do not persist the session id; start a fresh conversation
        #[arg(long)]
        fresh: bool,
    },

    /// Interactive supervisor console
    Supervisor,

    /// One synchronous round trip through the legacy chat endpoint
    ChatOnce {
        /// Message text
        text: String,
    },
}

impl Args {
    /// Resolve the effective config: file (if any), then CLI overrides.
    pub fn client_config(&self) -> Result<ClientConfig, SyncError> {
        let base = match &self.config {
            Some(path) => ClientConfig::from_toml_file(path)?,
            None => ClientConfig::default(),
        };
        let persona = match &self.command {
            Command::Chat { persona, .. } => *persona,
            Command::Supervisor => Persona::Supervisor,
            Command::ChatOnce { .. } => Persona::Victim,
        };
        let mut b = ClientConfig::builder(self.base_url.clone().unwrap_or(base.base_url))
            .persona(persona)
            .result_poll_interval(base.result_poll_interval)
            .history_poll_interval(base.history_poll_interval)
            .connect_timeout(base.connect_timeout)
            .request_timeout(base.request_timeout)
            .dedup_prefix_len(base.dedup_prefix_len)
            .state_dir(base.state_dir);
        if let Some(dir) = &self.state_dir {
            b = b.state_dir(dir.clone());
        }
        b.build()
    }
}

/// Help text printed when the supervisor console starts.
pub const CONSOLE_HELP: &str = "\
  restock <item> <qty>        queue a restock for the agent
  add <item> <qty>            queue a new inventory item
  approve <id> | reject <id>  queue a request decision
  admin restock <item> <qty>  restock directly, bypassing the agent
  admin add <item> <qty>      add an item directly
  resolve <id>                resolve a flagged request directly
  refresh | audit | activity  show dashboard, audit log, activity log
  anything else               free-form command for the agent";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;

    #[test]
    fn test_args_parse_chat_defaults() {
        let args = Args::parse_from(["relief-sync", "chat"]);
        assert_eq!(
            args.command,
            Command::Chat { persona: Persona::Victim, audio: None, fresh: false }
        );
        assert!(args.base_url.is_none());
    }

    #[test]
    fn test_args_parse_chat_full() {
        let args = Args::parse_from([
            "relief-sync",
            "chat",
            "--persona",
            "supervisor",
            "--audio",
            "clip.webm",
            "--fresh",
            "--base-url",
            "http://10.0.0.2:5000",
        ]);
        assert_eq!(
            args.command,
            Command::Chat {
                persona: Persona::Supervisor,
                audio: Some(PathBuf::from("clip.webm")),
                fresh: true
            }
        );
        assert_eq!(args.base_url.as_deref(), Some("http://10.0.0.2:5000"));
    }

    #[test]
    fn test_args_parse_chat_once() {
        let args = Args::parse_from(["relief-sync", "chat-once", "need water"]);
        assert_eq!(args.command, Command::ChatOnce { text: "need water".into() });
    }

    #[test]
    fn test_client_config_cli_overrides() {
        let args = Args::parse_from([
            "relief-sync",
            "--base-url",
            "http://relief.local:8080",
            "--state-dir",
            "/tmp/relief-state",
            "supervisor",
        ]);
        let cfg = args.client_config().unwrap();
        assert_eq!(cfg.base_url, "http://relief.local:8080");
        assert_eq!(cfg.persona, Persona::Supervisor);
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/relief-state"));
    }

    #[test]
    fn test_client_config_defaults() {
        let args = Args::parse_from(["relief-sync", "chat"]);
        let cfg = args.client_config().unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.persona, Persona::Victim);
    }

    #[test]
    fn test_client_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relief.toml");
        std::fs::write(&path, "base_url = \"http://filehost:5000\"\nresult_poll_ms = 250\n").unwrap();
        let args = Args::parse_from(["relief-sync", "--config", path.to_str().unwrap(), "chat"]);
        let cfg = args.client_config().unwrap();
        assert_eq!(cfg.base_url, "http://filehost:5000");
        assert_eq!(cfg.result_poll_interval, std::time::Duration::from_millis(250));
    }
}
