#![warn(missing_docs)]
//! # launch-gate-app
//!
//! ## Purpose
//! Orchestrates the date gate, connectivity wait, token exchange, persistence,
//! and presentation events for `launch-gate`.
//!
//! ## Responsibilities
//! - Load and validate [`LaunchConfig`] from TOML and the environment.
//! - Run the [`LaunchOrchestrator`] state machine to one terminal outcome.
//! - Open the configured completion store.
//! - Project UI state into flat, log-safe [`LaunchStatus`] snapshots.
//!
//! ## Data flow
//! Config + platform seams -> orchestrator (gate -> connectivity -> handshake
//! decision -> exchange -> persist) -> [`LaunchEvent`] channel -> UI reducer.
//!
//! ## Ownership and lifetimes
//! The orchestrator owns its session state and is consumed by
//! [`LaunchOrchestrator::run`]; platform collaborators are shared through
//! `Arc` so the host keeps its own handles.
//!
//! ## Error model
//! Setup failures surface as [`AppError`]. Once running, the launch flow
//! degrades instead of failing: every subsystem error is logged and replaced
//! by its fail-closed value.
//!
//! ## Security and privacy notes
//! - Destinations are logged with the `data=` payload redacted.
//! - Push and attribution tokens are never logged.

pub mod config;
pub mod orchestrator;

use std::sync::Arc;

use launch_gate_core::ConnectivityState;
use launch_gate_store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
use launch_gate_ui::{Screen, UiState};
use thiserror::Error;

pub use config::{ConfigError, LaunchConfig, LaunchTiming, TimingConfig};
pub use launch_gate_core::LaunchEvent;
pub use orchestrator::{LaunchOrchestrator, LaunchOutcome, LaunchPhase, LaunchPlatform};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("LAUNCH_GATE_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Flat launch status snapshot for logs and simple shells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchStatus {
    /// App version.
    pub version: String,
    /// `loading`, `destination`, or `fallback`.
    pub screen: String,
    /// Redacted destination, once decided.
    pub destination: Option<String>,
    /// Whether the connectivity alert is showing.
    pub alert_visible: bool,
    /// Reachability summary such as `online/wifi` or `offline`.
    pub network: String,
}

/// Projects UI state and reachability into a flat status snapshot.
pub fn project_launch_status(state: &UiState, connectivity: ConnectivityState) -> LaunchStatus {
    let (screen, destination) = match &state.screen {
        Screen::Loading => ("loading", None),
        Screen::Destination(destination) => ("destination", Some(destination.redacted())),
        Screen::Fallback(destination) => ("fallback", Some(destination.redacted())),
    };

    let network = if connectivity.active {
        let mut network = format!("online/{:?}", connectivity.interface_class).to_ascii_lowercase();
        if connectivity.is_expensive {
            network.push_str("+expensive");
        }
        if connectivity.is_constrained {
            network.push_str("+constrained");
        }
        network
    } else {
        "offline".to_string()
    };

    LaunchStatus {
        version: state.version.clone(),
        screen: screen.to_string(),
        destination,
        alert_visible: state.connectivity_alert,
        network,
    }
}

/// Opens the store named by `config.store_path`, or an in-memory store.
///
/// # Errors
/// Returns [`AppError::Store`] when the store file cannot be read or decoded.
pub fn open_store(config: &LaunchConfig) -> Result<Arc<dyn KeyValueStore>, AppError> {
    match &config.store_path {
        Some(path) => Ok(Arc::new(JsonFileStore::open(path.clone())?)),
        None => {
            tracing::info!(
                stage = "app",
                action = "memory_store",
                "no store_path configured; completion state will not persist"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// App setup error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Completion store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
