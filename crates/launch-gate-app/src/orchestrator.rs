//! Launch state machine: gate check, connectivity wait, handshake decision,
//! token exchange, persistence, and event emission.
//!
//! One [`LaunchOrchestrator`] owns all launch state and runs on a single task.
//! While an attempt is suspended (retry delay, exchange race, emission delay)
//! the task keeps polling the restored-edge stream, so restoration is never
//! missed. An attempt that exhausts its connectivity retries raises the alert
//! and stalls until the next restored edge, which clears the alert and starts
//! a fresh attempt from the gate check.

use std::sync::Arc;

use launch_gate_connectivity::{ConnectivityMonitor, RestoredEvents};
use launch_gate_core::{
    Clock, Destination, LaunchEvent, RetryState, UnlockGate, decode_percent_ascii,
};
use launch_gate_destination::DestinationBuilder;
use launch_gate_handshake::{
    AttributionSource, ExchangeBranch, PushPlatform, PushTokenInbox, TokenExchange,
    push_token_channel,
};
use launch_gate_store::{CompletionStore, KeyValueStore, RecordOutcome};
use tokio::sync::{mpsc, watch};

use crate::config::{ConfigError, LaunchConfig, LaunchTiming};

/// Observable position of the launch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchPhase {
    /// Constructed, not yet running.
    #[default]
    Idle,
    /// Evaluating the unlock date.
    GateCheck,
    /// Checking reachability.
    ConnectivityWait,
    /// Suspended before a delayed reachability re-check.
    Retrying {
        /// Attempt number within the current episode, starting at 1.
        attempt: u32,
    },
    /// Deciding between restore and token exchange.
    HandshakeDecision,
    /// Racing a push token against the timeout.
    TokenExchange,
    /// Gate closed; fallback destination chosen.
    GameFallback,
    /// Stored destination restored.
    RestoreStored,
    /// Handshake finished and persisted.
    Completed,
    /// Retries exhausted; waiting for connectivity restoration.
    Stalled,
}

/// Terminal result of [`LaunchOrchestrator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Gate closed; `ShowFallback` emitted.
    Fallback(Destination),
    /// Earlier handshake restored; `LoadingTargetUpdated` emitted.
    Restored(Destination),
    /// Launched before but no valid destination stored; nothing emitted.
    RestoreUnavailable,
    /// Handshake completed now; `LoadingTargetUpdated` emitted.
    Completed {
        /// Destination built from the exchanged tokens.
        destination: Destination,
        /// Race branch that produced the payload.
        branch: ExchangeBranch,
    },
    /// Built destination failed validation; nothing emitted.
    DestinationRejected,
    /// Restored-edge stream ended while the alert was showing.
    Stalled,
}

/// Platform collaborators injected into the orchestrator.
pub struct LaunchPlatform {
    /// Shared reachability tracker.
    pub monitor: Arc<ConnectivityMonitor>,
    /// Persistent key/value store.
    pub store: Arc<dyn KeyValueStore>,
    /// Push registration and permission prompt.
    pub push: Arc<dyn PushPlatform>,
    /// Attribution token provider.
    pub attribution: Arc<dyn AttributionSource>,
    /// Receiving end of push-token deliveries.
    pub push_tokens: PushTokenInbox,
    /// Source of today's date.
    pub clock: Arc<dyn Clock>,
}

/// Single-run launch state machine.
pub struct LaunchOrchestrator {
    session: LaunchSession,
    restored: RestoredEvents,
}

enum AttemptOutcome {
    Finished(LaunchOutcome),
    Stalled,
}

struct LaunchSession {
    unlock_date: String,
    builder: DestinationBuilder,
    timing: LaunchTiming,
    monitor: Arc<ConnectivityMonitor>,
    completion: CompletionStore,
    exchange: TokenExchange,
    push_tokens: Option<PushTokenInbox>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<LaunchEvent>,
    phase: watch::Sender<LaunchPhase>,
    retry: RetryState,
    alert_visible: bool,
}

impl LaunchOrchestrator {
    /// Validates `config` and wires the orchestrator to `platform`.
    ///
    /// Subscribes to restored edges immediately, so edges occurring between
    /// construction and [`LaunchOrchestrator::run`] are not lost.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when required fields are blank or timing values
    /// are invalid.
    pub fn new(
        config: &LaunchConfig,
        platform: LaunchPlatform,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LaunchEvent>), ConfigError> {
        let timing = config.validate()?;
        let (events, events_rx) = mpsc::unbounded_channel();
        let (phase, _) = watch::channel(LaunchPhase::Idle);
        let restored = platform.monitor.subscribe_restored();

        let session = LaunchSession {
            unlock_date: config.unlock_date.clone(),
            builder: DestinationBuilder::from_encoded(&config.base_destination),
            timing,
            completion: CompletionStore::new(platform.store),
            exchange: TokenExchange::new(
                platform.push,
                platform.attribution,
                timing.exchange_timeout,
            ),
            push_tokens: Some(platform.push_tokens),
            clock: platform.clock,
            monitor: platform.monitor,
            events,
            phase,
            retry: RetryState::new(timing.retry),
            alert_visible: false,
        };

        Ok((Self { session, restored }, events_rx))
    }

    /// Subscribes to phase transitions.
    pub fn phases(&self) -> watch::Receiver<LaunchPhase> {
        self.session.phase.subscribe()
    }

    /// Returns `true` when a previous run completed the handshake.
    pub fn has_launched_before(&self) -> bool {
        self.session.completion.has_launched_before()
    }

    /// Runs the launch sequence to a terminal outcome.
    pub async fn run(self) -> LaunchOutcome {
        let Self {
            mut session,
            mut restored,
        } = self;
        let mut restored_open = true;

        loop {
            let attempt_outcome = {
                let mut attempt = std::pin::pin!(session.attempt());
                loop {
                    tokio::select! {
                        outcome = &mut attempt => break outcome,
                        edge = restored.next(), if restored_open => {
                            if edge.is_none() {
                                restored_open = false;
                            } else {
                                // The alert cannot be showing during an attempt.
                                tracing::debug!(
                                    stage = "orchestrator",
                                    action = "restored_ignored",
                                    "restored edge during active attempt"
                                );
                            }
                        }
                    }
                }
            };

            match attempt_outcome {
                AttemptOutcome::Finished(outcome) => return outcome,
                AttemptOutcome::Stalled => {
                    session.enter(LaunchPhase::Stalled);
                    if !restored_open || restored.next().await.is_none() {
                        tracing::warn!(
                            stage = "orchestrator",
                            action = "stalled",
                            "restored stream closed while waiting for connectivity"
                        );
                        return LaunchOutcome::Stalled;
                    }

                    tracing::info!(
                        stage = "orchestrator",
                        action = "restart",
                        "connectivity restored; restarting launch"
                    );
                    session.set_alert(false);
                    session.retry.reset();
                }
            }
        }
    }
}

impl LaunchSession {
    fn enter(&self, phase: LaunchPhase) {
        self.phase.send_replace(phase);
        tracing::debug!(stage = "orchestrator", action = "phase", ?phase, "phase entered");
    }

    async fn attempt(&mut self) -> AttemptOutcome {
        self.enter(LaunchPhase::GateCheck);
        let gate = UnlockGate::parse(&decode_percent_ascii(&self.unlock_date));
        let today = self.clock.today();
        if !gate.is_open(today) {
            tracing::info!(
                stage = "orchestrator",
                action = "gate_closed",
                %today,
                "unlock gate closed"
            );
            return AttemptOutcome::Finished(self.show_fallback().await);
        }

        if !self.await_connectivity().await {
            return AttemptOutcome::Stalled;
        }

        self.enter(LaunchPhase::HandshakeDecision);
        let outcome = if self.completion.has_launched_before() {
            self.restore_stored().await
        } else {
            self.exchange_tokens().await
        };
        AttemptOutcome::Finished(outcome)
    }

    async fn show_fallback(&mut self) -> LaunchOutcome {
        let Some(destination) = self.validated(self.builder.build_pairs(&[])) else {
            return LaunchOutcome::DestinationRejected;
        };

        self.emit_after_delay(LaunchEvent::ShowFallback {
            destination: destination.clone(),
        })
        .await;
        self.enter(LaunchPhase::GameFallback);
        LaunchOutcome::Fallback(destination)
    }

    /// Bounded reachability loop. Returns `false` after raising the alert.
    async fn await_connectivity(&mut self) -> bool {
        self.enter(LaunchPhase::ConnectivityWait);
        loop {
            if self.monitor.is_active() {
                self.retry.reset();
                return true;
            }

            if self.retry.exhausted() {
                tracing::warn!(
                    stage = "orchestrator",
                    action = "retries_exhausted",
                    attempts = self.retry.count(),
                    "no connectivity; showing alert"
                );
                self.set_alert(true);
                self.retry.reset();
                return false;
            }

            let attempt = self.retry.begin_attempt();
            self.enter(LaunchPhase::Retrying { attempt });
            tokio::time::sleep(self.retry.policy().delay).await;
        }
    }

    async fn restore_stored(&mut self) -> LaunchOutcome {
        let stored = match self.completion.load() {
            Ok(record) => record.restorable_destination(),
            Err(error) => {
                tracing::warn!(stage = "orchestrator", action = "restore_failed", %error, "cannot read record");
                None
            }
        };

        let Some(destination) = stored else {
            tracing::warn!(
                stage = "orchestrator",
                action = "restore_unavailable",
                "launched before but no valid stored destination"
            );
            return LaunchOutcome::RestoreUnavailable;
        };

        self.emit_after_delay(LaunchEvent::LoadingTargetUpdated {
            destination: destination.clone(),
        })
        .await;
        self.enter(LaunchPhase::RestoreStored);
        LaunchOutcome::Restored(destination)
    }

    async fn exchange_tokens(&mut self) -> LaunchOutcome {
        self.enter(LaunchPhase::TokenExchange);
        let inbox = self.push_tokens.take().unwrap_or_else(|| {
            let (_closed, inbox) = push_token_channel();
            inbox
        });
        let result = self.exchange.run(inbox).await;

        let Some(destination) = self.validated(self.builder.build(&result.payload)) else {
            return LaunchOutcome::DestinationRejected;
        };

        self.exchange.request_notification_permission();
        match self.completion.record_completion(&destination) {
            Ok(RecordOutcome::Recorded) => {
                tracing::info!(
                    stage = "orchestrator",
                    action = "recorded",
                    destination = %destination.redacted(),
                    "handshake completion persisted"
                );
            }
            Ok(RecordOutcome::AlreadyRecorded) => {
                tracing::debug!(stage = "orchestrator", action = "already_recorded", "record exists");
            }
            Err(error) => {
                tracing::warn!(stage = "orchestrator", action = "record_failed", %error, "persist failed");
            }
        }

        self.emit_after_delay(LaunchEvent::LoadingTargetUpdated {
            destination: destination.clone(),
        })
        .await;
        self.enter(LaunchPhase::Completed);
        LaunchOutcome::Completed {
            destination,
            branch: result.branch,
        }
    }

    fn validated(&self, built: String) -> Option<Destination> {
        match Destination::parse(built) {
            Ok(destination) => Some(destination),
            Err(error) => {
                tracing::warn!(stage = "orchestrator", action = "destination_rejected", %error, "not emitting");
                None
            }
        }
    }

    fn set_alert(&mut self, visible: bool) {
        if self.alert_visible == visible {
            return;
        }
        self.alert_visible = visible;
        self.send(LaunchEvent::ShowConnectivityAlert { visible });
    }

    async fn emit_after_delay(&self, event: LaunchEvent) {
        tokio::time::sleep(self.timing.emission_delay).await;
        self.send(event);
    }

    fn send(&self, event: LaunchEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(stage = "orchestrator", action = "event_dropped", "no event listener");
        }
    }
}
