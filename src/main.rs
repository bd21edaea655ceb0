//! Shellbridge CLI - attach the local console to a remote shell session.
//!
//! This is the main binary entry point. See the `shellbridge` library for
//! the core functionality.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;
use shellbridge::bridge::{BridgeEvent, BridgeOptions, CloseReason, EventKind, SessionBridge};
use shellbridge::config::{parse_key_value, Config};
use shellbridge::constants::LOG_FILE_NAME;
use shellbridge::listeners::listener;
use shellbridge::terminal::{restore_console, ConsoleTerminal, RawModeGuard, RunExit, Terminal};
use shellbridge::transport::{ReadyState, Transport, WebSocketTransport};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI
#[derive(Parser)]
#[command(name = "shellbridge")]
#[command(version = VERSION)]
#[command(about = "Attach this terminal to a remote shell session over WebSocket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a remote shell session (Ctrl+Q detaches)
    Connect(ConnectArgs),
    /// Print the resolved configuration
    Config,
}

#[derive(Args)]
struct ConnectArgs {
    /// Remote endpoint; falls back to the config file or SHELLBRIDGE_URL
    url: Option<String>,
    /// Session to join; a random one is generated when unset
    #[arg(long)]
    session_id: Option<String>,
    /// Envelope header entry, KEY=VALUE (repeatable)
    #[arg(long = "header", value_parser = parse_key_value)]
    headers: Vec<(String, String)>,
    /// HTTP header for the WebSocket upgrade, KEY=VALUE (repeatable)
    #[arg(long = "http-header", value_parser = parse_key_value)]
    http_headers: Vec<(String, String)>,
    /// Send CONNECT as soon as the socket opens
    #[arg(long)]
    connect_immediately: bool,
}

impl ConnectArgs {
    fn apply_to(self, config: &mut Config) {
        if let Some(url) = self.url {
            config.url = Some(url);
        }
        if let Some(session_id) = self.session_id {
            config.session_id = Some(session_id);
        }
        config.header.extend(self.headers);
        config.http_headers.extend(self.http_headers);
        config.connect_immediately |= self.connect_immediately;
    }
}

fn main() -> Result<()> {
    // Log to a file so log lines never land in the raw-mode console
    let log_path = match std::env::var("SHELLBRIDGE_LOG_FILE") {
        Ok(path) => PathBuf::from(path),
        Err(_) => Config::config_dir()?.join(LOG_FILE_NAME),
    };
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file at {}", log_path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_secs()
        .init();

    // Restore the console before the default hook prints the panic
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {:?}", panic_info);
        restore_console();
        default_hook(panic_info);
    }));

    let cli = Cli::parse();

    match cli.command {
        Commands::Connect(args) => {
            let mut config = Config::load()?;
            args.apply_to(&mut config);
            run_connect(&config)?;
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn run_connect(config: &Config) -> Result<()> {
    let url = config
        .url
        .clone()
        .context("No URL given (pass one, set SHELLBRIDGE_URL, or add it to the config file)")?;
    let session_id = config
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let transport = WebSocketTransport::connect(&url, &config.http_header_pairs())?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let close_reason: Arc<Mutex<Option<CloseReason>>> = Arc::new(Mutex::new(None));

    let options = BridgeOptions::new(session_id.clone())
        .header(config.header.clone())
        .connect_immediately(config.connect_immediately)
        .listener(EventKind::Close, {
            let shutdown = Arc::clone(&shutdown);
            let close_reason = Arc::clone(&close_reason);
            listener(move |event: &BridgeEvent| {
                if let BridgeEvent::Close(reason) = event {
                    *close_reason.lock().expect("Close reason mutex poisoned") = Some(reason.clone());
                }
                shutdown.store(true, Ordering::SeqCst);
                Ok(())
            })
        })
        .listener(
            EventKind::Connect,
            listener(|event: &BridgeEvent| {
                if let BridgeEvent::Connect { session_id } = event {
                    log::info!("Joined session {}", session_id);
                }
                Ok(())
            }),
        );

    let bridge = SessionBridge::new(Arc::clone(&transport) as Arc<dyn Transport>, options)?;
    println!("Connecting to {} (session {}). Press Ctrl+Q to detach.\r", transport.url(), session_id);

    let console = Arc::new(ConsoleTerminal::new());
    let exit = {
        let _guard = RawModeGuard::enable()?;
        console.mount();
        bridge.attach(Arc::clone(&console) as Arc<dyn Terminal>)?;
        // The connection may have failed before the bridge subscribed.
        if transport.ready_state() == ReadyState::Closed {
            shutdown.store(true, Ordering::SeqCst);
        }
        console.run(&shutdown)
    };

    bridge.dispose()?;
    transport.join();

    match exit? {
        RunExit::Detached => println!("Detached from session {session_id}"),
        RunExit::Shutdown => {
            let reason = close_reason.lock().expect("Close reason mutex poisoned").take();
            match reason {
                Some(CloseReason::TransportClosed { code, reason }) => {
                    println!("Session closed by remote (code {code}) {reason}");
                }
                Some(CloseReason::TransportError) => println!("Connection failed, see {LOG_FILE_NAME}"),
                Some(CloseReason::MalformedMessage) => println!("Session closed: server sent malformed data"),
                Some(CloseReason::Disposed) | None => println!("Session closed"),
            }
        }
    }
    Ok(())
}
