#![warn(missing_docs)]
//! # launch-gate-connectivity
//!
//! ## Purpose
//! Tracks network reachability for the launch flow and publishes
//! connectivity-restored edges.
//!
//! ## Responsibilities
//! - Accept raw [`PathUpdate`]s from a platform reachability primitive.
//! - Maintain the current [`ConnectivityState`] at a single update point.
//! - Emit exactly one restored event per inactive -> active transition.
//! - Provide a deterministic [`SimulatedReachability`] source for tests and
//!   the demo binary.
//!
//! ## Data flow
//! Platform worker -> [`PathUpdateSender`] -> monitor task ->
//! [`ConnectivityMonitor::apply_path`] -> watch snapshot + [`RestoredEvents`].
//!
//! ## Ownership and lifetimes
//! One monitor is created per process and shared as `Arc<ConnectivityMonitor>`
//! with the orchestrator. It is never torn down.
//!
//! ## Error model
//! Nothing here fails. A closed update channel simply freezes the last state.
//!
//! ## Security and privacy notes
//! Only reachability flags are observed; no traffic is inspected.

use std::sync::Arc;
use std::time::Duration;

use launch_gate_core::{ConnectivityState, InterfaceClass};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Buffered restored edges per subscriber before lag coalescing.
const RESTORED_CHANNEL_CAPACITY: usize = 16;

/// Interface preference used to classify a multi-interface path.
const PREFERRED_INTERFACES: [InterfaceClass; 3] = [
    InterfaceClass::Cellular,
    InterfaceClass::Wifi,
    InterfaceClass::WiredEthernet,
];

/// Raw path description reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathUpdate {
    /// Whether the path is usable.
    pub satisfied: bool,
    /// Whether the path is metered.
    pub is_expensive: bool,
    /// Whether the path is in low-data mode.
    pub is_constrained: bool,
    /// Interfaces the path uses.
    pub interfaces: Vec<InterfaceClass>,
}

impl PathUpdate {
    /// Usable path over one interface.
    pub fn connected(interface: InterfaceClass) -> Self {
        Self {
            satisfied: true,
            interfaces: vec![interface],
            ..Self::default()
        }
    }

    /// Unusable path.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Projects the raw path into a connectivity snapshot.
    pub fn to_state(&self) -> ConnectivityState {
        ConnectivityState {
            active: self.satisfied,
            is_expensive: self.is_expensive,
            is_constrained: self.is_constrained,
            interface_class: classify_interface(&self.interfaces),
        }
    }
}

/// Picks the first of cellular, wifi, wired ethernet used by the path.
pub fn classify_interface(interfaces: &[InterfaceClass]) -> InterfaceClass {
    PREFERRED_INTERFACES
        .into_iter()
        .find(|preferred| interfaces.contains(preferred))
        .unwrap_or(InterfaceClass::Other)
}

/// Creates the channel a platform worker uses to report path changes.
pub fn path_channel() -> (PathUpdateSender, PathUpdateReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PathUpdateSender { tx }, PathUpdateReceiver { rx })
}

/// Platform-side handle for reporting path changes.
#[derive(Debug, Clone)]
pub struct PathUpdateSender {
    tx: mpsc::UnboundedSender<PathUpdate>,
}

impl PathUpdateSender {
    /// Reports one path change. Returns `false` once the monitor side is gone.
    pub fn send(&self, update: PathUpdate) -> bool {
        self.tx.send(update).is_ok()
    }
}

/// Monitor-side end of the path channel.
#[derive(Debug)]
pub struct PathUpdateReceiver {
    rx: mpsc::UnboundedReceiver<PathUpdate>,
}

impl PathUpdateReceiver {
    /// Waits for the next path change.
    pub async fn recv(&mut self) -> Option<PathUpdate> {
        self.rx.recv().await
    }
}

/// Process-wide reachability tracker.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
    restored: broadcast::Sender<()>,
}

impl ConnectivityMonitor {
    /// Creates a monitor in the inactive state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectivityState::default());
        let (restored, _) = broadcast::channel(RESTORED_CHANNEL_CAPACITY);
        Self { state, restored }
    }

    /// Current connectivity snapshot.
    pub fn current(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Shorthand for `current().active`.
    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    /// Subscribes to every snapshot change.
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Subscribes to restored edges occurring from now on.
    pub fn subscribe_restored(&self) -> RestoredEvents {
        RestoredEvents {
            rx: self.restored.subscribe(),
        }
    }

    /// Applies one path change.
    ///
    /// # Returns
    /// `true` when the change was an inactive -> active edge and a restored
    /// event was emitted.
    ///
    /// # Side effects
    /// The snapshot is replaced before the restored event is sent, so
    /// listeners always observe the new state.
    pub fn apply_path(&self, update: PathUpdate) -> bool {
        let next = update.to_state();
        let previous = self.state.send_replace(next);
        tracing::debug!(
            stage = "connectivity",
            action = "path_update",
            active = next.active,
            interface = ?next.interface_class,
            expensive = next.is_expensive,
            constrained = next.is_constrained,
            "path updated"
        );

        let restored = !previous.active && next.active;
        if restored {
            tracing::info!(stage = "connectivity", action = "restored", "connectivity restored");
            // No subscribers is fine: late subscribers miss past edges.
            let _ = self.restored.send(());
        }
        restored
    }

    /// Drains platform path changes on a dedicated task.
    pub fn attach(self: &Arc<Self>, mut updates: PathUpdateReceiver) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                monitor.apply_path(update);
            }
            tracing::debug!(
                stage = "connectivity",
                action = "source_closed",
                "path update source closed"
            );
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of restored edges for one subscriber.
#[derive(Debug)]
pub struct RestoredEvents {
    rx: broadcast::Receiver<()>,
}

impl RestoredEvents {
    /// Waits for the next restored edge.
    ///
    /// Edges missed through lag are coalesced into one. Returns `None` once
    /// the monitor is dropped.
    pub async fn next(&mut self) -> Option<()> {
        match self.rx.recv().await {
            Ok(()) => Some(()),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(
                    stage = "connectivity",
                    action = "restored_lagged",
                    skipped,
                    "coalescing lagged restored events"
                );
                Some(())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Platform reachability primitive feeding path updates to the monitor.
pub trait ReachabilitySource: Send {
    /// Starts reporting path changes through `updates`.
    fn start(self: Box<Self>, updates: PathUpdateSender) -> JoinHandle<()>;
}

/// Scripted reachability source for tests and the demo binary.
///
/// Each step waits its delay (relative to the previous step) and then reports
/// its path.
#[derive(Debug, Clone, Default)]
pub struct SimulatedReachability {
    steps: Vec<(Duration, PathUpdate)>,
}

impl SimulatedReachability {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that is connected over wifi immediately.
    pub fn always_online() -> Self {
        Self::new().then(Duration::ZERO, PathUpdate::connected(InterfaceClass::Wifi))
    }

    /// Source that starts offline and comes online after `offline_for`.
    pub fn offline_for(offline_for: Duration) -> Self {
        Self::new()
            .then(Duration::ZERO, PathUpdate::disconnected())
            .then(offline_for, PathUpdate::connected(InterfaceClass::Wifi))
    }

    /// Appends one scripted step.
    pub fn then(mut self, delay: Duration, update: PathUpdate) -> Self {
        self.steps.push((delay, update));
        self
    }
}

impl ReachabilitySource for SimulatedReachability {
    fn start(self: Box<Self>, updates: PathUpdateSender) -> JoinHandle<()> {
        tokio::spawn(async move {
            for (delay, update) in self.steps {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if !updates.send(update) {
                    break;
                }
            }
        })
    }
}
