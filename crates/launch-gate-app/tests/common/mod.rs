//! Shared fixtures for app integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use launch_gate_app::{LaunchConfig, LaunchEvent, LaunchOrchestrator, LaunchPlatform};
use launch_gate_connectivity::{ConnectivityMonitor, PathUpdate};
use launch_gate_core::{FixedClock, InterfaceClass};
use launch_gate_handshake::{
    PushTokenSender, RecordingPushPlatform, StaticAttribution, push_token_channel,
};
use launch_gate_store::{KeyValueStore, MemoryStore};
use tokio::sync::mpsc::UnboundedReceiver;

/// Decoded base destination used across launch tests.
pub const BASE: &str = "https://play.example.test/start";

/// Percent-escapes every byte, the way the shipped constants are obfuscated.
pub fn obfuscate(raw: &str) -> String {
    raw.bytes().map(|byte| format!("%{byte:02X}")).collect()
}

/// Expected destination for a payload query on the structured path.
pub fn expected_destination(query: &str) -> String {
    format!("{BASE}/?data={}", STANDARD.encode(query))
}

/// Config whose gate opened in the past.
pub fn open_config() -> LaunchConfig {
    LaunchConfig::new(obfuscate("2024-01-01"), obfuscate(BASE))
}

/// Config whose gate opens far in the future.
pub fn closed_config() -> LaunchConfig {
    LaunchConfig::new(obfuscate("2099-01-01"), obfuscate(BASE))
}

/// Fixed "today" used by every launch fixture.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("fixture date should be valid")
}

/// Handles a test keeps after handing the platform to the orchestrator.
pub struct Harness {
    /// Shared reachability tracker.
    pub monitor: Arc<ConnectivityMonitor>,
    /// Store observed by assertions.
    pub store: Arc<MemoryStore>,
    /// Push platform with registration/prompt counters.
    pub push: Arc<RecordingPushPlatform>,
    /// Delivers push tokens into the orchestrator.
    pub tokens: PushTokenSender,
}

impl Harness {
    /// Marks the network reachable over wifi.
    pub fn go_online(&self) {
        self.monitor
            .apply_path(PathUpdate::connected(InterfaceClass::Wifi));
    }

    /// Marks the network unreachable.
    pub fn go_offline(&self) {
        self.monitor.apply_path(PathUpdate::disconnected());
    }
}

/// Builds an orchestrator over in-memory fakes with an unavailable
/// attribution source.
pub fn launch(
    config: &LaunchConfig,
    store: MemoryStore,
    online: bool,
) -> (Harness, LaunchOrchestrator, UnboundedReceiver<LaunchEvent>) {
    let (tokens, push_tokens) = push_token_channel();
    let harness = Harness {
        monitor: Arc::new(ConnectivityMonitor::new()),
        store: Arc::new(store),
        push: Arc::new(RecordingPushPlatform::new()),
        tokens,
    };
    if online {
        harness.go_online();
    }

    let store: Arc<dyn KeyValueStore> = harness.store.clone();
    let platform = LaunchPlatform {
        monitor: Arc::clone(&harness.monitor),
        store,
        push: harness.push.clone(),
        attribution: Arc::new(StaticAttribution::unavailable()),
        push_tokens,
        clock: Arc::new(FixedClock(today())),
    };
    let (orchestrator, events) =
        LaunchOrchestrator::new(config, platform).expect("fixture config should validate");
    (harness, orchestrator, events)
}

/// Drains every event emitted so far.
pub fn drain(events: &mut UnboundedReceiver<LaunchEvent>) -> Vec<LaunchEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
