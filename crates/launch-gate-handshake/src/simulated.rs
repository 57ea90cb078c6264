//! Deterministic platform seams for tests and the demo binary.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{AttributionSource, HandshakeError, PushPlatform, PushTokenSender};

/// Push platform that counts side effects and can deliver a scripted token.
#[derive(Debug, Default)]
pub struct RecordingPushPlatform {
    registrations: AtomicUsize,
    prompts: AtomicUsize,
    scripted: Option<ScriptedDelivery>,
}

#[derive(Debug)]
struct ScriptedDelivery {
    sender: PushTokenSender,
    delay: Duration,
    token: String,
}

impl RecordingPushPlatform {
    /// Platform that never delivers a token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform that delivers `token` through `sender` `delay` after each
    /// registration request.
    pub fn delivering(sender: PushTokenSender, delay: Duration, token: impl Into<String>) -> Self {
        Self {
            scripted: Some(ScriptedDelivery {
                sender,
                delay,
                token: token.into(),
            }),
            ..Self::default()
        }
    }

    /// Registration requests observed.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Permission prompts observed.
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl PushPlatform for RecordingPushPlatform {
    fn register_for_remote_notifications(&self) {
        self.registrations.fetch_add(1, Ordering::SeqCst);

        let Some(scripted) = &self.scripted else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                stage = "handshake",
                action = "scripted_delivery_skipped",
                "no async runtime; scripted push token not delivered"
            );
            return;
        };

        let sender = scripted.sender.clone();
        let delay = scripted.delay;
        let token = scripted.token.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !sender.deliver(token) {
                tracing::debug!(
                    stage = "handshake",
                    action = "scripted_delivery_rejected",
                    "exchange no longer listening"
                );
            }
        });
    }

    fn request_notification_permission(&self) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Attribution source returning a fixed outcome.
#[derive(Debug, Clone, Default)]
pub struct StaticAttribution {
    token: Option<String>,
}

impl StaticAttribution {
    /// Source that always yields `token`.
    pub fn available(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Source that always fails.
    pub fn unavailable() -> Self {
        Self { token: None }
    }
}

impl AttributionSource for StaticAttribution {
    fn attribution_token(&self) -> Result<String, HandshakeError> {
        self.token.clone().ok_or_else(|| {
            HandshakeError::AttributionUnavailable("attribution not supported".to_string())
        })
    }
}
