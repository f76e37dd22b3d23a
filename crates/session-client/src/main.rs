// crates/session-client/src/main.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use session_core::TransportEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use session_client::app::{say, App, Flow};
use session_client::commands::parse_line;
use session_client::{identity, ClientConfig, EventReceiver, WsConnector};

#[derive(Parser)]
#[clap(name = "game-client")]
#[clap(about = "Console client for the STOMP card game")]
struct Cli {
    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// WebSocket endpoint of the game server
    #[clap(long)]
    ws_url: Option<String>,

    /// Base URL for plain HTTP calls
    #[clap(long)]
    api_url: Option<String>,

    /// Session id (8 digits); a new one is generated when omitted
    #[clap(short, long)]
    user_id: Option<String>,

    /// Do not connect until `connect` is typed
    #[clap(long)]
    no_auto_connect: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.ws_url {
            config.websocket_url = url.clone();
        }
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if self.no_auto_connect {
            config.auto_connect = false;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let user_id = identity::resolve(cli.user_id.as_deref());

    // The session is single-threaded; keep everything on one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(config, user_id))
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: ClientConfig, user_id: String) -> Result<()> {
    let (connector, mut events) = WsConnector::new();
    let mut app = App::new(&config, user_id.clone(), connector);
    let mut status = app.watch_status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    say(&format!("session {user_id}, {} (type `help`)", app.status()));

    loop {
        tokio::select! {
            Some((id, event)) = events.recv() => app.on_transport_event(id, event),

            Ok(()) = status.changed() => {
                let now = *status.borrow_and_update();
                say(&format!("status: {now}"));
            }

            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(cmd)) => {
                        if app.handle(cmd) == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => say(&e.to_string()),
                }
            }
        }
    }

    let was_connected = app.status().is_connected();
    app.shutdown();
    if was_connected {
        wait_for_close(&mut events).await;
    }
    info!("bye");
    Ok(())
}

/// Give the transport a moment to send DISCONNECT before the runtime stops.
async fn wait_for_close(events: &mut EventReceiver) {
    let closed = async {
        while let Some((_, event)) = events.recv().await {
            if matches!(event, TransportEvent::Closed { .. }) {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(1), closed).await;
}
