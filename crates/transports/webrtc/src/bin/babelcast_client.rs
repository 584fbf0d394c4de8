//! Babelcast command-line client
//!
//! Publishes Opus silence into a channel, or subscribes to one, against a
//! Babelcast signaling server.
//!
//! # Usage
//!
//! ```bash
//! # Subscribe, picking "radio" as soon as it is listed
//! cargo run --bin babelcast_client -- subscriber --channel radio
//!
//! # Publish with batched candidate gathering
//! cargo run --bin babelcast_client -- publisher \
//!   --signaling-url wss://cast.example/ws \
//!   --gathering-mode batched \
//!   --channel radio --password secret
//! ```
//!
//! While running, stdin accepts `publish <channel> [password]`,
//! `pick <channel>`, `mute`, `unmute`, `reload` and `quit`. A reload tears
//! the session down and starts a fresh one; `quit` or Ctrl+C tears it down
//! and exits, a second Ctrl+C exits immediately.

use anyhow::Context;
use babelcast_webrtc::{
    ChannelUiBridge, ClientConfig, ClientExit, GatheringMode, Intent, PublisherFlow, RoleFlow,
    RtcEngine, SampleCapture, SignalingClient, SubscriberFlow, TracingUiBridge, UiBridge, UiEvent,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Babelcast audio client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Role to play
    #[arg(value_enum, env = "BABELCAST_ROLE")]
    role: RoleArg,

    /// JSON configuration file; command-line flags override it
    #[arg(long, env = "BABELCAST_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket signaling URL
    #[arg(long, env = "BABELCAST_SIGNALING_URL")]
    signaling_url: Option<String>,

    /// STUN servers (comma-separated)
    #[arg(long, value_delimiter = ',', env = "BABELCAST_STUN_SERVERS")]
    stun_servers: Vec<String>,

    /// Candidate gathering mode: incremental, batched
    #[arg(long, value_enum, env = "BABELCAST_GATHERING_MODE")]
    gathering_mode: Option<GatheringModeArg>,

    /// Delay before re-attempting a send on a closed channel, in milliseconds
    #[arg(long, env = "BABELCAST_SEND_RETRY_DELAY_MS")]
    send_retry_delay_ms: Option<u64>,

    /// Directory poll interval in milliseconds
    #[arg(long, env = "BABELCAST_DIRECTORY_POLL_INTERVAL_MS")]
    directory_poll_interval_ms: Option<u64>,

    /// Wait for session_received before allowing another channel pick
    #[arg(long, env = "BABELCAST_REQUIRE_SESSION_ACK")]
    require_session_ack: bool,

    /// Channel to publish into or subscribe to
    #[arg(long, env = "BABELCAST_CHANNEL")]
    channel: Option<String>,

    /// Channel password (publisher only)
    #[arg(long, env = "BABELCAST_PASSWORD", default_value = "")]
    password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum RoleArg {
    /// Publish local audio
    Publisher,
    /// Receive a channel's audio
    Subscriber,
}

/// Gathering mode CLI argument wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum GatheringModeArg {
    Incremental,
    Batched,
}

impl From<GatheringModeArg> for GatheringMode {
    fn from(arg: GatheringModeArg) -> Self {
        match arg {
            GatheringModeArg::Incremental => GatheringMode::Incremental,
            GatheringModeArg::Batched => GatheringMode::Batched,
        }
    }
}

/// Build the client configuration from the optional file and the flags
fn build_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ClientConfig::from_json(&json)?
        }
        None => ClientConfig::default(),
    };

    if let Some(url) = &args.signaling_url {
        config.signaling_url = url.clone();
    }
    if !args.stun_servers.is_empty() {
        config.stun_servers = args.stun_servers.clone();
    }
    if let Some(mode) = args.gathering_mode {
        config.gathering_mode = mode.into();
    }
    if let Some(delay) = args.send_retry_delay_ms {
        config.send_retry_delay_ms = delay;
    }
    if let Some(interval) = args.directory_poll_interval_ms {
        config.directory_poll_interval_ms = interval;
    }
    if args.require_session_ack {
        config.require_session_ack = true;
    }

    config.validate()?;
    Ok(config)
}

/// One stdin command
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Forward to the running session
    Intent(Intent),
    /// Tear down and exit
    Quit,
}

/// Parse one stdin command
fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let intent = match parts.next()? {
        "publish" => {
            let channel = parts.next()?.to_string();
            let password = parts.next().unwrap_or_default().to_string();
            Intent::SubmitCredentials { channel, password }
        }
        "pick" => {
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() {
                return None;
            }
            Intent::PickChannel(rest.join(" "))
        }
        "mute" => Intent::SetMicEnabled(false),
        "unmute" => Intent::SetMicEnabled(true),
        "reload" => Intent::Reload,
        "quit" => return Some(Command::Quit),
        _ => return None,
    };
    Some(Command::Intent(intent))
}

/// Whether a finished session should be followed by a fresh one
fn should_restart(exit: &ClientExit, quitting: bool) -> bool {
    matches!(exit, ClientExit::Reload) && !quitting
}

/// Delivers intents from stdin, Ctrl+C and the renderer to the current session
#[derive(Clone)]
struct IntentRoute {
    current: Arc<Mutex<mpsc::UnboundedSender<Intent>>>,
    quitting: Arc<AtomicBool>,
}

impl IntentRoute {
    fn new() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self {
            current: Arc::new(Mutex::new(tx)),
            quitting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Point the route at a new session and return that session's receiver
    fn retarget(&self) -> mpsc::UnboundedReceiver<Intent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = tx;
        rx
    }

    /// Returns `false` when no session is listening
    fn send(&self, intent: Intent) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(intent)
            .is_ok()
    }

    /// Tear the current session down for good; returns whether a quit was
    /// already in progress
    fn quit(&self) -> bool {
        let already = self.quitting.swap(true, Ordering::SeqCst);
        if !already {
            self.send(Intent::Reload);
        }
        already
    }

    fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("babelcast-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        role = ?args.role,
        "Babelcast client starting"
    );

    let config = build_config(&args)?;
    let route = IntentRoute::new();

    let ctrlc_route = route.clone();
    ctrlc::set_handler(move || {
        if ctrlc_route.quit() {
            std::process::exit(130);
        }
        eprintln!("\nCtrl+C received, shutting down");
    })
    .context("Failed to set Ctrl+C handler")?;

    tokio::spawn(read_commands(route.clone()));

    let mut session = 0u32;
    loop {
        session += 1;
        let exit = run_session(&args, &config, &route).await?;

        match &exit {
            ClientExit::ChannelClosed(reason) => warn!(
                "Signaling connection closed{}",
                reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default()
            ),
            ClientExit::Reload => info!(session, "Session torn down"),
            ClientExit::IntentsClosed => info!("Input closed"),
        }

        if !should_restart(&exit, route.is_quitting()) {
            break;
        }
        info!(session = session + 1, "Starting a fresh session");
    }

    Ok(())
}

/// Build an engine and flow, connect, and drive them until the session ends
async fn run_session(args: &Args, config: &ClientConfig, route: &IntentRoute) -> anyhow::Result<ClientExit> {
    let intent_rx = route.retarget();

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(RtcEngine::new(config, engine_tx).await?);

    let flow: Box<dyn RoleFlow> = match args.role {
        RoleArg::Publisher => Box::new(PublisherFlow::new(
            engine,
            Arc::new(SampleCapture::silence()),
            config.gathering_mode,
        )),
        RoleArg::Subscriber => Box::new(SubscriberFlow::new(engine, config)),
    };

    let (ui, ui_rx) = ChannelUiBridge::new();
    tokio::spawn(render_ui(ui_rx, route.clone(), args.role, args.channel.clone()));

    let (client, socket) = SignalingClient::connect(config, flow, engine_rx, Arc::new(ui))?;

    route.send(Intent::Connect);
    if let (RoleArg::Publisher, Some(channel)) = (args.role, args.channel.clone()) {
        route.send(Intent::SubmitCredentials {
            channel,
            password: args.password.clone(),
        });
    }

    Ok(client.run(socket, intent_rx).await?)
}

/// Log presentation updates and pick the requested channel once listed
async fn render_ui(
    mut events: mpsc::UnboundedReceiver<UiEvent>,
    route: IntentRoute,
    role: RoleArg,
    wanted: Option<String>,
) {
    let renderer = TracingUiBridge;
    let mut picked = false;

    while let Some(event) = events.recv().await {
        if let (UiEvent::Channels(channels), RoleArg::Subscriber, Some(wanted), false) =
            (&event, role, wanted.as_ref(), picked)
        {
            if channels.contains(wanted) {
                picked = true;
                route.send(Intent::PickChannel(wanted.clone()));
            }
        }
        renderer.emit(event);
    }
}

async fn read_commands(route: IntentRoute) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Some(Command::Quit) => {
                route.quit();
            }
            Some(Command::Intent(intent)) => {
                if !route.send(intent) {
                    debug!("No session running, dropping command: {}", line.trim());
                }
            }
            None => warn!("Unknown command: {}", line.trim()),
        }
    }
}

fn init_tracing() {
    // Initialize tracing with EnvFilter for RUST_LOG support
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
