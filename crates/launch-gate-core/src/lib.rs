#![warn(missing_docs)]
//! # launch-gate-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `launch-gate` workspace.
//!
//! ## Responsibilities
//! - Decode obfuscated configuration constants ([`decode_percent_ascii`]).
//! - Evaluate the day-granularity [`UnlockGate`] against a [`Clock`].
//! - Represent connectivity snapshots, device payloads, retry bookkeeping,
//!   the durable [`LaunchCompletionRecord`], and outbound [`LaunchEvent`]s.
//!
//! ## Data flow
//! Configuration strings are decoded here, the gate is evaluated, and the
//! orchestrator threads [`DevicePayload`] values into the destination builder.
//! Results travel to the presentation layer as [`LaunchEvent`] values carrying
//! validated [`Destination`]s.
//!
//! ## Ownership and lifetimes
//! All model values own their strings so they can cross task boundaries and
//! channel sends without borrowing from the orchestrator.
//!
//! ## Error model
//! Only destination validation can fail ([`CoreError`]). Decoding and gate
//! parsing fail closed into empty strings and closed gates instead of errors.
//!
//! ## Security and privacy notes
//! Device tokens are carried inside destinations. Use
//! [`Destination::redacted`] whenever a destination is written to logs.
//!
//! ## Example
//! ```rust
//! use launch_gate_core::{DevicePayload, SENTINEL_TOKEN, UnlockGate, decode_percent_ascii};
//!
//! let gate = UnlockGate::parse(&decode_percent_ascii("%32%30%32%35%2D%30%34%2D%31%30"));
//! assert!(gate.date().is_some());
//!
//! let payload = DevicePayload::new("", "att");
//! assert_eq!(payload.apns_token(), SENTINEL_TOKEN);
//! ```

mod gate;
mod percent;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub use gate::{Clock, FixedClock, GATE_DATE_FORMAT, SystemClock, UnlockGate};
pub use percent::decode_percent_ascii;

/// Placeholder used whenever a real device token is unavailable.
pub const SENTINEL_TOKEN: &str = "token";

/// Payload key for the push-notification device token.
pub const APNS_TOKEN_KEY: &str = "apns_token";

/// Payload key for the advertising-attribution token.
pub const ATT_TOKEN_KEY: &str = "att_token";

/// Base used only to validate relative destinations.
const RELATIVE_JOIN_BASE: &str = "https://relative.invalid/";

/// Network interface class reported by the reachability primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceClass {
    /// Mobile data.
    Cellular,
    /// Wireless LAN.
    Wifi,
    /// Wired ethernet.
    WiredEthernet,
    /// Loopback or anything unclassified.
    #[default]
    Other,
}

/// Snapshot of current network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectivityState {
    /// Whether the current path is usable.
    pub active: bool,
    /// Whether the path is metered.
    pub is_expensive: bool,
    /// Whether the path is in a low-data mode.
    pub is_constrained: bool,
    /// Preferred interface carrying the path.
    pub interface_class: InterfaceClass,
}

/// Device identifiers collected during the handshake.
///
/// Empty values are normalized to [`SENTINEL_TOKEN`], so a payload is never
/// empty downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePayload {
    apns_token: String,
    att_token: String,
}

impl DevicePayload {
    /// Builds a payload, substituting the sentinel for empty tokens.
    pub fn new(apns_token: impl Into<String>, att_token: impl Into<String>) -> Self {
        Self {
            apns_token: or_sentinel(apns_token.into()),
            att_token: or_sentinel(att_token.into()),
        }
    }

    /// Payload with both tokens set to the sentinel.
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_TOKEN, SENTINEL_TOKEN)
    }

    /// Push-notification token.
    pub fn apns_token(&self) -> &str {
        &self.apns_token
    }

    /// Attribution token.
    pub fn att_token(&self) -> &str {
        &self.att_token
    }

    /// Key/value pairs in wire order.
    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (APNS_TOKEN_KEY, self.apns_token.as_str()),
            (ATT_TOKEN_KEY, self.att_token.as_str()),
        ]
    }
}

impl Default for DevicePayload {
    fn default() -> Self {
        Self::sentinel()
    }
}

fn or_sentinel(token: String) -> String {
    if token.is_empty() {
        SENTINEL_TOKEN.to_string()
    } else {
        token
    }
}

/// Validated destination identifier handed to the presentation layer.
///
/// Absolute URLs and relative references (produced when the base identifier
/// failed to decode) are both accepted; the raw string is kept unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Destination(String);

impl Destination {
    /// Validates a raw destination string.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidDestination`] for blank strings or strings
    /// that are not a URL or relative URL reference.
    pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidDestination(
                "destination is empty".to_string(),
            ));
        }

        match Url::parse(&raw) {
            Ok(_) => Ok(Self(raw)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                match Url::parse(RELATIVE_JOIN_BASE).and_then(|base| base.join(&raw)) {
                    Ok(_) => Ok(Self(raw)),
                    Err(error) => Err(CoreError::InvalidDestination(error.to_string())),
                }
            }
            Err(error) => Err(CoreError::InvalidDestination(error.to_string())),
        }
    }

    /// Raw destination string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe rendering with the encoded `data` payload removed.
    pub fn redacted(&self) -> String {
        match self.0.find("data=") {
            Some(position) => format!("{}data=<redacted>", &self.0[..position]),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Destination {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<Destination> for String {
    fn from(destination: Destination) -> Self {
        destination.0
    }
}

/// Durable marker that the one-time handshake already completed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchCompletionRecord {
    /// Set once the token exchange has finished.
    pub has_launched_before: bool,
    /// Destination computed by the completed handshake.
    pub stored_destination: Option<String>,
}

impl LaunchCompletionRecord {
    /// Record written on handshake completion.
    pub fn completed(destination: &Destination) -> Self {
        Self {
            has_launched_before: true,
            stored_destination: Some(destination.as_str().to_string()),
        }
    }

    /// Returns the stored destination when present and valid.
    pub fn restorable_destination(&self) -> Option<Destination> {
        self.stored_destination
            .as_deref()
            .and_then(|raw| Destination::parse(raw).ok())
    }
}

/// Connectivity retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delayed re-checks before the alert is raised.
    pub max_attempts: u32,
    /// Suspension between re-checks.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Retry bookkeeping for one connectivity-wait episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    count: u32,
    policy: RetryPolicy,
}

impl RetryState {
    /// Creates a zeroed retry state.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { count: 0, policy }
    }

    /// Attempts consumed in this episode.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Policy limits.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Returns `true` once no further delayed re-check is allowed.
    pub fn exhausted(&self) -> bool {
        self.count >= self.policy.max_attempts
    }

    /// Consumes one attempt and returns the new count.
    pub fn begin_attempt(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Resets the attempt count to zero.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Event emitted to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LaunchEvent {
    /// Loading screen should navigate to this destination.
    LoadingTargetUpdated {
        /// Target destination.
        destination: Destination,
    },
    /// Gate is closed; show the fallback experience.
    ShowFallback {
        /// Fallback destination.
        destination: Destination,
    },
    /// Show or hide the "no internet" alert.
    ShowConnectivityAlert {
        /// Whether the alert is visible.
        visible: bool,
    },
}

/// Error type for core model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Destination string is not a usable identifier.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for model invariants.

    use super::*;

    #[test]
    fn payload_never_carries_empty_tokens() {
        let payload = DevicePayload::new("", "");
        assert_eq!(payload, DevicePayload::sentinel());
        assert_eq!(
            payload.pairs(),
            [(APNS_TOKEN_KEY, SENTINEL_TOKEN), (ATT_TOKEN_KEY, SENTINEL_TOKEN)]
        );
    }

    #[test]
    fn whitespace_tokens_pass_through() {
        let payload = DevicePayload::new(" ", "att");
        assert_eq!(payload.apns_token(), " ");
        assert_eq!(payload.att_token(), "att");
    }

    #[test]
    fn destination_accepts_absolute_and_relative_forms() {
        assert!(Destination::parse("https://a.test/?data=YQ==").is_ok());
        assert!(Destination::parse("/?data=YQ==").is_ok());
        assert!(Destination::parse("   ").is_err());
        assert!(Destination::parse("https://exa mple.test").is_err());
    }

    #[test]
    fn redaction_hides_encoded_payload() {
        let destination = Destination::parse("https://a.test/?data=c2VjcmV0").unwrap();
        assert_eq!(destination.redacted(), "https://a.test/?data=<redacted>");
    }

    #[test]
    fn retry_state_exhausts_at_policy_limit() {
        let mut state = RetryState::new(RetryPolicy::default());
        assert!(!state.exhausted());
        for expected in 1..=3 {
            assert_eq!(state.begin_attempt(), expected);
        }
        assert!(state.exhausted());
        state.reset();
        assert_eq!(state.count(), 0);
    }

    #[test]
    fn completion_record_ignores_invalid_stored_destination() {
        let record = LaunchCompletionRecord {
            has_launched_before: true,
            stored_destination: Some(String::new()),
        };
        assert_eq!(record.restorable_destination(), None);
    }

    #[test]
    fn launch_event_serializes_with_event_tag() {
        let event = LaunchEvent::ShowConnectivityAlert { visible: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "show_connectivity_alert");
        assert_eq!(json["visible"], true);
    }
}
