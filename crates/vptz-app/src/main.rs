//! vPTZ - virtual PTZ controller for video mixers
//!
//! Entry point: configuration, logging, mixer links, framing store and
//! control surface wiring. Runs until interrupted.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use vptz_control::{spawn_bridge, BroadcastSink, ControlSurface, Notification};
use vptz_core::VptzConfig;
use vptz_mixer::{MixerLink, SessionManager, TcpMixerConnection, TransportOptions};
use vptz_store::{FramingStore, JsonFileBackend};

#[derive(Parser, Debug)]
#[command(name = "vptz", version, about = "Virtual PTZ controller for video mixers")]
struct Args {
    /// Configuration file (JSON). Missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Primary mixer endpoint (host:port).
    #[arg(long)]
    primary: Option<String>,

    /// Secondary mixer endpoint, used for preview selection and cuts.
    #[arg(long)]
    secondary: Option<String>,

    /// Directory holding the framing store.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Push stored framings to the mixers once every instance has connected.
    #[arg(long, default_value_t = false)]
    restore_on_connect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = Arc::new(load_config(&args)?);
    info!(
        cameras = config.cameras.len(),
        presets = config.presets.len(),
        framings = config.framings.len(),
        primary = %config.mixer.primary,
        secondary = ?config.mixer.effective_secondary(),
        "vPTZ starting"
    );

    let state_dir = args
        .state_dir
        .clone()
        .or_else(default_state_dir)
        .context("no data directory on this platform, pass --state-dir")?;
    let store = FramingStore::open(config.clone(), Box::new(JsonFileBackend::in_dir(&state_dir)))
        .with_context(|| format!("opening framing store in {}", state_dir.display()))?;
    let store = Arc::new(store);

    // Mixer links and session
    let options = TransportOptions::from(&config.mixer);
    let (primary, primary_rx) = TcpMixerConnection::spawn(config.mixer.primary.clone(), options);
    let (secondary, secondary_rx) = match config.mixer.effective_secondary() {
        Some(endpoint) => {
            let (link, rx) = TcpMixerConnection::spawn(endpoint, options);
            (Some(link), Some(rx))
        }
        None => (None, None),
    };
    let session = SessionManager::new(
        config.clone(),
        primary.clone(),
        secondary.clone().map(|l| l as Arc<dyn MixerLink>),
    );
    let bridge_events = session.subscribe();
    let session_task = session.spawn((primary_rx, secondary_rx));

    // Control surface
    let sink = BroadcastSink::new(64);
    let log_task = tokio::spawn(log_notifications(sink.subscribe()));
    let surface = ControlSurface::new(session, store, Arc::new(sink));
    surface.init();
    let bridge_task = spawn_bridge(surface.clone(), bridge_events);

    info!("vPTZ running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;

    info!("shutting down");
    surface.shutdown();
    primary.shutdown().await;
    if let Some(secondary) = secondary {
        secondary.shutdown().await;
    }
    // transports are gone, so the session loop drains and ends
    if let Err(e) = session_task.await {
        warn!(error = %e, "session task failed");
    }
    bridge_task.abort();
    log_task.abort();
    info!("vPTZ stopped");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

fn load_config(args: &Args) -> Result<VptzConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => VptzConfig::default(),
    };
    if let Some(primary) = &args.primary {
        config.mixer.primary = primary.clone();
    }
    if let Some(secondary) = &args.secondary {
        config.mixer.secondary = Some(secondary.clone());
    }
    if args.restore_on_connect {
        config.restore_on_connect = true;
    }
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<VptzConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = VptzConfig::from_json(&json)
        .with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn default_state_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("vptz"))
}

/// Stand-in subscriber until a front end attaches: logs every notification.
async fn log_notifications(mut rx: broadcast::Receiver<Notification>) {
    loop {
        match rx.recv().await {
            Ok(notification) => match serde_json::to_string(&notification.cameras) {
                Ok(cameras) => debug!(
                    cached = notification.cached,
                    cameras = %cameras,
                    "state changed"
                ),
                Err(e) => warn!(error = %e, "cannot render notification"),
            },
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "notification log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
