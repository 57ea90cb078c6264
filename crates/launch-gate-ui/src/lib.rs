#![warn(missing_docs)]
//! # launch-gate-ui
//!
//! ## Purpose
//! Defines the presentation-facing state driven by launch events.
//!
//! ## Responsibilities
//! - Represent the loading, destination, and fallback screens.
//! - Track visibility of the "no internet" alert.
//! - Reduce [`LaunchEvent`]s into [`UiState`].
//!
//! ## Data flow
//! Orchestrator emits [`LaunchEvent`] -> [`UiState::apply`] -> rendered shell.
//!
//! ## Ownership and lifetimes
//! `UiState` owns its destinations so the shell can hold it across frames
//! without borrowing from the event channel.
//!
//! ## Error model
//! Reduction is infallible; every event maps to a valid state.
//!
//! ## Security and privacy notes
//! [`UiState::status_line`] renders destinations redacted.

use launch_gate_core::{Destination, LaunchEvent};

/// Screen currently presented.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Screen {
    /// Decision not made yet.
    #[default]
    Loading,
    /// Gated experience at this destination.
    Destination(Destination),
    /// Fallback experience at this destination.
    Fallback(Destination),
}

/// Aggregate presentation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Current screen.
    pub screen: Screen,
    /// Whether the connectivity alert is visible.
    pub connectivity_alert: bool,
}

impl UiState {
    /// Creates the initial loading state.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            screen: Screen::Loading,
            connectivity_alert: false,
        }
    }

    /// Applies one launch event.
    pub fn apply(&mut self, event: &LaunchEvent) {
        match event {
            LaunchEvent::LoadingTargetUpdated { destination } => {
                self.screen = Screen::Destination(destination.clone());
            }
            LaunchEvent::ShowFallback { destination } => {
                self.screen = Screen::Fallback(destination.clone());
            }
            LaunchEvent::ShowConnectivityAlert { visible } => {
                self.connectivity_alert = *visible;
            }
        }
    }

    /// Returns `true` while no destination has been decided.
    pub fn is_loading(&self) -> bool {
        self.screen == Screen::Loading
    }

    /// Log-safe one-line summary.
    pub fn status_line(&self) -> String {
        let screen = match &self.screen {
            Screen::Loading => "loading".to_string(),
            Screen::Destination(destination) => format!("destination {}", destination.redacted()),
            Screen::Fallback(destination) => format!("fallback {}", destination.redacted()),
        };
        let alert = if self.connectivity_alert {
            "shown"
        } else {
            "hidden"
        };
        format!("v{} screen={screen} alert={alert}", self.version)
    }
}
