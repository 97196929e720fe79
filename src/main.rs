use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use relief_sync::audio::{FileCapture, Recorder};
use relief_sync::cli::{Args, Command, CONSOLE_HELP};
use relief_sync::view::{TerminalDashboard, TerminalView};
use relief_sync::{
    submit_channel, BackendClient, ClientConfig, ClientSession, ConsoleCommand, Payload,
    SessionStore, SupervisorConsole, SyncClient,
};

const GREETING: &str = "Hello! How can I help you today?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.client_config()?;
    let backend = BackendClient::new(&config);

    match args.command {
        Command::Chat { audio, fresh, .. } => run_chat(config, backend, audio, fresh).await,
        Command::Supervisor => run_supervisor(config, backend).await,
        Command::ChatOnce { text } => {
            let store = SessionStore::new(&config.state_dir);
            let session = ClientSession::open(config.persona, &store)?;
            let reply = backend.victim_chat(&Payload::text(text), &session.session_id).await?;
            println!("{}", reply.bright_green());
            Ok(())
        }
    }
}

async fn run_chat(
    config: ClientConfig,
    backend: BackendClient,
    audio: Option<std::path::PathBuf>,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = if fresh {
        ClientSession::ephemeral(config.persona)
    } else {
        ClientSession::open(config.persona, &SessionStore::new(&config.state_dir))?
    };
    eprintln!(
        "{}",
        format!(
            "  {} session {} (client {}) → {}",
            session.persona, session.session_id, session.client_id, config.base_url
        )
        .bright_blue()
    );
    eprintln!("{}", "  Type a message and press Enter. Ctrl+C to quit.".dimmed());

    let mut client = SyncClient::new(backend, session, TerminalView::new(), &config);
    client.greet(GREETING);

    let (handle, inbox) = submit_channel();

    if let Some(path) = audio {
        let mut recorder = Recorder::new(FileCapture::new(path));
        // Start then stop: the file stands in for one complete recording.
        match recorder.toggle().and_then(|_| recorder.toggle()) {
            Ok(Some(payload)) => handle.submit(payload)?,
            Ok(None) => {}
            Err(e) => eprintln!("{}", format!("  audio not sent: {e}").bright_red()),
        }
    }

    let stdin_handle = handle.clone();
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        while let Some(Ok(line)) = lines.next().await {
            if line.trim().is_empty() {
                continue;
            }
            if stdin_handle.submit(Payload::text(line)).is_err() {
                break;
            }
        }
    });
    drop(handle);

    tokio::select! {
        _ = client.run(inbox) => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "\n  Bye.".dimmed());
            // The stdin reader parks a blocking thread that would stall runtime shutdown.
            std::process::exit(0);
        }
    }
    Ok(())
}

async fn run_supervisor(
    config: ClientConfig,
    backend: BackendClient,
) -> Result<(), Box<dyn std::error::Error>> {
    let console = SupervisorConsole::new(backend, TerminalDashboard::new(), &config);
    eprintln!(
        "{}",
        format!("  Supervisor console (client {}) → {}", console.client_id(), config.base_url)
            .bright_blue()
    );
    eprintln!("{}", CONSOLE_HELP.dimmed());

    let (tx, inbox) = tokio::sync::mpsc::unbounded_channel::<ConsoleCommand>();
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        while let Some(Ok(line)) = lines.next().await {
            if line.trim().is_empty() {
                continue;
            }
            match ConsoleCommand::parse(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", format!("  {e}").bright_red()),
            }
        }
    });

    tokio::select! {
        _ = console.run(inbox) => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "\n  Bye.".dimmed());
            // The stdin reader parks a blocking thread that would stall runtime shutdown.
            std::process::exit(0);
        }
    }
    Ok(())
}
