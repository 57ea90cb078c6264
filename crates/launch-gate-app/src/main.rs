#![warn(missing_docs)]
//! # launch-gate binary
//!
//! Demo entry point: runs one launch sequence against a simulated platform
//! (scripted reachability, delayed push token, static attribution) and the
//! configured completion store, logging projected status lines.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use launch_gate_app::{
    LaunchConfig, LaunchOrchestrator, LaunchOutcome, LaunchPlatform, app_version, open_store,
    project_launch_status,
};
use launch_gate_connectivity::{
    ConnectivityMonitor, PathUpdate, ReachabilitySource, SimulatedReachability, path_channel,
};
use launch_gate_core::{InterfaceClass, SystemClock};
use launch_gate_handshake::{
    AttributionSource, PushPlatform, RecordingPushPlatform, StaticAttribution, push_token_channel,
};
use launch_gate_ui::UiState;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Runs the launch gate against a simulated platform.
#[derive(Debug, Parser)]
#[command(name = "launch-gate", version = app_version(), about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "LAUNCH_GATE_CONFIG", default_value = "launch-gate.toml")]
    config: PathBuf,

    /// Seconds the simulated network stays offline before connecting.
    #[arg(long, default_value_t = 0)]
    offline_secs: u64,

    /// Push token delivered by the simulated platform; omit to hit the timeout.
    #[arg(long)]
    push_token: Option<String>,

    /// Delay before the simulated push token is delivered.
    #[arg(long, default_value_t = 500)]
    push_delay_ms: u64,

    /// Attribution token; omit to simulate an unavailable attribution source.
    #[arg(long)]
    attribution_token: Option<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    tracing::info!(stage = "app", action = "start", version = app_version(), "launch-gate starting");

    let config = LaunchConfig::load_or_empty(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_env_overrides();
    if config.unlock_date.trim().is_empty() {
        tracing::warn!(
            stage = "app",
            action = "blank_unlock_date",
            "no unlock date configured; gate stays closed"
        );
    }
    let store = open_store(&config).context("opening completion store")?;

    let monitor = Arc::new(ConnectivityMonitor::new());
    let (path_updates, path_receiver) = path_channel();
    let _monitor_task = monitor.attach(path_receiver);
    if cli.offline_secs == 0 {
        monitor.apply_path(PathUpdate::connected(InterfaceClass::Wifi));
    } else {
        let source = SimulatedReachability::offline_for(Duration::from_secs(cli.offline_secs));
        let _source_task = Box::new(source).start(path_updates);
    }

    let (token_sender, push_tokens) = push_token_channel();
    let push: Arc<dyn PushPlatform> = match cli.push_token {
        Some(token) => Arc::new(RecordingPushPlatform::delivering(
            token_sender,
            Duration::from_millis(cli.push_delay_ms),
            token,
        )),
        None => Arc::new(RecordingPushPlatform::new()),
    };
    let attribution: Arc<dyn AttributionSource> = match cli.attribution_token {
        Some(token) => Arc::new(StaticAttribution::available(token)),
        None => Arc::new(StaticAttribution::unavailable()),
    };

    let platform = LaunchPlatform {
        monitor: Arc::clone(&monitor),
        store,
        push,
        attribution,
        push_tokens,
        clock: Arc::new(SystemClock),
    };
    let (orchestrator, mut events) =
        LaunchOrchestrator::new(&config, platform).context("invalid launch configuration")?;
    tracing::info!(
        stage = "app",
        action = "launch",
        has_launched_before = orchestrator.has_launched_before(),
        "running launch sequence"
    );

    let launch = tokio::spawn(orchestrator.run());
    let mut ui = UiState::new(app_version());
    while let Some(event) = events.recv().await {
        ui.apply(&event);
        let status = project_launch_status(&ui, monitor.current());
        tracing::info!(
            stage = "app",
            action = "status",
            network = %status.network,
            "{}",
            ui.status_line()
        );
    }

    let outcome = launch.await.context("launch task failed")?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

fn describe_outcome(outcome: &LaunchOutcome) -> String {
    match outcome {
        LaunchOutcome::Fallback(destination) => format!("fallback {}", destination.redacted()),
        LaunchOutcome::Restored(destination) => format!("restored {}", destination.redacted()),
        LaunchOutcome::RestoreUnavailable => "restore unavailable".to_string(),
        LaunchOutcome::Completed {
            destination,
            branch,
        } => format!("completed via {branch:?} {}", destination.redacted()),
        LaunchOutcome::DestinationRejected => "destination rejected".to_string(),
        LaunchOutcome::Stalled => "stalled waiting for connectivity".to_string(),
    }
}
