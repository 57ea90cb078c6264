#![warn(missing_docs)]
//! # launch-gate-handshake
//!
//! ## Purpose
//! Runs the one-time device-token exchange raced against a timeout.
//!
//! ## Responsibilities
//! - Define the platform seams for push registration ([`PushPlatform`]) and
//!   attribution tokens ([`AttributionSource`]).
//! - Carry asynchronously delivered push tokens ([`push_token_channel`]).
//! - Resolve the token-vs-timeout race exactly once ([`ResolveOnce`],
//!   [`TokenExchange::run`]).
//!
//! ## Data flow
//! Orchestrator -> [`TokenExchange::run`] -> push registration side effect ->
//! attribution fetch -> race(push token, timeout) -> [`ExchangeResult`].
//!
//! ## Ownership and lifetimes
//! The [`PushTokenInbox`] is moved into the race and dropped when it resolves,
//! so tokens delivered afterwards are rejected at the sender.
//!
//! ## Error model
//! Attribution failures are returned as [`HandshakeError`] by the platform
//! seam and absorbed into the sentinel token by [`TokenExchange`].
//!
//! ## Security and privacy notes
//! Token values are never logged; only which branch won the race.

mod simulated;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use launch_gate_core::{DevicePayload, SENTINEL_TOKEN};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use simulated::{RecordingPushPlatform, StaticAttribution};

/// Default wait for a push token before falling back to the sentinel.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Push-notification platform side effects.
pub trait PushPlatform: Send + Sync {
    /// Asks the OS to register for remote notifications. Fire-and-forget.
    fn register_for_remote_notifications(&self);

    /// Prompts the user for notification permission. Result is ignored.
    fn request_notification_permission(&self);
}

/// Advertising-attribution token provider.
pub trait AttributionSource: Send + Sync {
    /// Fetches the attribution token synchronously.
    ///
    /// # Errors
    /// Returns [`HandshakeError::AttributionUnavailable`] when the platform
    /// cannot produce a token.
    fn attribution_token(&self) -> Result<String, HandshakeError>;
}

/// Creates the channel carrying push tokens from the platform delegate.
pub fn push_token_channel() -> (PushTokenSender, PushTokenInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PushTokenSender { tx }, PushTokenInbox { rx })
}

/// Platform-side handle for delivering push tokens.
#[derive(Debug, Clone)]
pub struct PushTokenSender {
    tx: mpsc::UnboundedSender<String>,
}

impl PushTokenSender {
    /// Delivers a token. Returns `false` when no exchange is listening anymore.
    pub fn deliver(&self, token: impl Into<String>) -> bool {
        self.tx.send(token.into()).is_ok()
    }
}

/// Exchange-side end of the push-token channel.
#[derive(Debug)]
pub struct PushTokenInbox {
    rx: mpsc::UnboundedReceiver<String>,
}

impl PushTokenInbox {
    /// Waits for the next delivered token.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Single-use completion slot shared by racing tasks.
///
/// The first [`ResolveOnce::resolve`] call wins; later calls return `false`
/// and their values are discarded.
#[derive(Debug)]
pub struct ResolveOnce<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResolveOnce<T> {
    /// Creates a slot and the receiver that observes its resolution.
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                slot: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    /// Resolves the slot with `value` if nobody has yet.
    pub fn resolve(&self, value: T) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };

        match sender {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Returns `true` once a resolve call has claimed the slot.
    pub fn is_resolved(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_none()).unwrap_or(true)
    }
}

/// Which completion won the exchange race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeBranch {
    /// A push token arrived before the timeout.
    PushToken,
    /// The timeout fired with no token received.
    Timeout,
}

/// Payload and winning branch of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResult {
    /// Device payload to encode into the destination.
    pub payload: DevicePayload,
    /// Winning branch.
    pub branch: ExchangeBranch,
}

enum RaceWinner {
    PushToken(String),
    Timeout,
}

/// One-shot token exchange over injected platform seams.
#[derive(Clone)]
pub struct TokenExchange {
    push: Arc<dyn PushPlatform>,
    attribution: Arc<dyn AttributionSource>,
    timeout: Duration,
}

impl TokenExchange {
    /// Creates an exchange with the given timeout.
    pub fn new(
        push: Arc<dyn PushPlatform>,
        attribution: Arc<dyn AttributionSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            push,
            attribution,
            timeout,
        }
    }

    /// Configured race timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches the attribution token, absorbing failures into the sentinel.
    pub fn fetch_attribution_token(&self) -> String {
        match self.attribution.attribution_token() {
            Ok(token) => token,
            Err(error) => {
                tracing::debug!(
                    stage = "handshake",
                    action = "attribution_unavailable",
                    %error,
                    "using sentinel attribution token"
                );
                SENTINEL_TOKEN.to_string()
            }
        }
    }

    /// Prompts for notification permission through the platform.
    pub fn request_notification_permission(&self) {
        self.push.request_notification_permission();
    }

    /// Runs the exchange: registers for push, fetches attribution, then races
    /// the first delivered push token against the timeout.
    ///
    /// # Semantics
    /// Exactly one branch wins. The losing task is aborted; a token delivered
    /// after the timeout won is discarded.
    pub async fn run(&self, mut inbox: PushTokenInbox) -> ExchangeResult {
        self.push.register_for_remote_notifications();
        let att_token = self.fetch_attribution_token();
        let (resolver, resolved) = ResolveOnce::new();

        let listener = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                if let Some(token) = inbox.recv().await
                    && !resolver.resolve(RaceWinner::PushToken(token))
                {
                    tracing::debug!(
                        stage = "handshake",
                        action = "late_token",
                        "push token arrived after resolution; discarded"
                    );
                }
            }
        });

        let timer = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            let timeout = self.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                if !resolver.resolve(RaceWinner::Timeout) {
                    tracing::debug!(
                        stage = "handshake",
                        action = "late_timeout",
                        "timeout fired after resolution; discarded"
                    );
                }
            }
        });

        let winner = resolved.await.unwrap_or(RaceWinner::Timeout);
        listener.abort();
        timer.abort();

        let result = match winner {
            RaceWinner::PushToken(token) => ExchangeResult {
                payload: DevicePayload::new(token, att_token),
                branch: ExchangeBranch::PushToken,
            },
            RaceWinner::Timeout => ExchangeResult {
                payload: DevicePayload::new(SENTINEL_TOKEN, att_token),
                branch: ExchangeBranch::Timeout,
            },
        };

        tracing::info!(
            stage = "handshake",
            action = "resolved",
            branch = ?result.branch,
            "token exchange resolved"
        );
        result
    }
}

/// Errors reported by handshake platform seams.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Attribution token could not be produced.
    #[error("attribution token unavailable: {0}")]
    AttributionUnavailable(String),
}
