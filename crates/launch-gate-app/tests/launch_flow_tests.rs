//! Integration tests for end-to-end launch decisions.

mod common;

use std::time::Duration;

use launch_gate_app::{LaunchConfig, LaunchEvent, LaunchOutcome, LaunchPhase};
use launch_gate_core::{Destination, LaunchCompletionRecord};
use launch_gate_handshake::ExchangeBranch;
use launch_gate_store::{
    CompletionStore, HAS_LAUNCHED_BEFORE_KEY, KeyValueStore, MemoryStore,
    RECEIVED_DESTINATION_KEY, StoredValue,
};
use tokio::time::Instant;

use common::{BASE, closed_config, drain, expected_destination, launch, obfuscate, open_config};

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_first_launch_persists_push_token_destination() {
    let (harness, orchestrator, mut events) = launch(&open_config(), MemoryStore::new(), true);
    let phases = orchestrator.phases();
    let tokens = harness.tokens.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        tokens.deliver("abc");
    });

    let started = Instant::now();
    let outcome = orchestrator.run().await;
    let elapsed = started.elapsed();

    let expected = Destination::parse(expected_destination("apns_token=abc&att_token=token"))
        .expect("expected destination should parse");
    assert_eq!(
        outcome,
        LaunchOutcome::Completed {
            destination: expected.clone(),
            branch: ExchangeBranch::PushToken,
        }
    );
    assert!(elapsed >= Duration::from_millis(1_500) && elapsed < Duration::from_secs(5));
    assert_eq!(
        drain(&mut events),
        vec![LaunchEvent::LoadingTargetUpdated {
            destination: expected.clone()
        }]
    );
    assert_eq!(*phases.borrow(), LaunchPhase::Completed);

    let record = CompletionStore::new(harness.store.clone())
        .load()
        .expect("record should load");
    assert_eq!(record, LaunchCompletionRecord::completed(&expected));
    assert_eq!(harness.push.registrations(), 1);
    assert_eq!(harness.push.prompts(), 1);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_second_launch_restores_without_network_activity() {
    let stored = Destination::parse(expected_destination("apns_token=abc&att_token=token"))
        .expect("stored destination should parse");
    let store = MemoryStore::with_record(&LaunchCompletionRecord::completed(&stored));
    let (harness, orchestrator, mut events) = launch(&open_config(), store, true);
    assert!(orchestrator.has_launched_before());

    let outcome = orchestrator.run().await;

    assert_eq!(outcome, LaunchOutcome::Restored(stored.clone()));
    assert_eq!(
        drain(&mut events),
        vec![LaunchEvent::LoadingTargetUpdated {
            destination: stored
        }]
    );
    assert_eq!(harness.push.registrations(), 0);
    assert_eq!(harness.push.prompts(), 0);
    assert_eq!(harness.store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_restore_phase_follows_emission() {
    let stored = Destination::parse(expected_destination("apns_token=abc&att_token=token"))
        .expect("stored destination should parse");
    let store = MemoryStore::with_record(&LaunchCompletionRecord::completed(&stored));
    let (_harness, orchestrator, mut events) = launch(&open_config(), store, true);
    let phases = orchestrator.phases();
    let running = tokio::spawn(orchestrator.run());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*phases.borrow(), LaunchPhase::HandshakeDecision);
    assert!(drain(&mut events).is_empty());

    let outcome = running.await.expect("launch task should finish");
    assert_eq!(outcome, LaunchOutcome::Restored(stored));
    assert_eq!(*phases.borrow(), LaunchPhase::RestoreStored);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_corrupt_destination_never_reruns_exchange() {
    let store = MemoryStore::new();
    store
        .set(HAS_LAUNCHED_BEFORE_KEY, StoredValue::Bool(true))
        .expect("memory store write should succeed");
    store
        .set(RECEIVED_DESTINATION_KEY, StoredValue::Bool(false))
        .expect("memory store write should succeed");
    let (harness, orchestrator, mut events) = launch(&open_config(), store, true);
    assert!(orchestrator.has_launched_before());

    let outcome = orchestrator.run().await;

    assert_eq!(outcome, LaunchOutcome::RestoreUnavailable);
    assert_eq!(events.recv().await, None);
    assert_eq!(harness.push.registrations(), 0);
    assert_eq!(harness.push.prompts(), 0);
    assert_eq!(harness.store.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_closed_gate_shows_fallback_while_offline() {
    let (harness, orchestrator, mut events) = launch(&closed_config(), MemoryStore::new(), false);

    let started = Instant::now();
    let outcome = orchestrator.run().await;

    let fallback = Destination::parse(expected_destination("apns_token=token&att_token=token"))
        .expect("fallback destination should parse");
    assert_eq!(outcome, LaunchOutcome::Fallback(fallback.clone()));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        drain(&mut events),
        vec![LaunchEvent::ShowFallback {
            destination: fallback
        }]
    );
    assert_eq!(harness.push.registrations(), 0);
    assert_eq!(harness.store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_malformed_gate_fails_closed() {
    let config = LaunchConfig::new("%32%30%3", obfuscate(BASE));
    let (_harness, orchestrator, _events) = launch(&config, MemoryStore::new(), true);

    assert!(matches!(
        orchestrator.run().await,
        LaunchOutcome::Fallback(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_blank_gate_fails_closed() {
    let config = LaunchConfig::new("", obfuscate(BASE));
    let (harness, orchestrator, mut events) = launch(&config, MemoryStore::new(), true);

    let outcome = orchestrator.run().await;

    let fallback = Destination::parse(expected_destination("apns_token=token&att_token=token"))
        .expect("fallback destination should parse");
    assert_eq!(outcome, LaunchOutcome::Fallback(fallback.clone()));
    assert_eq!(
        drain(&mut events),
        vec![LaunchEvent::ShowFallback {
            destination: fallback
        }]
    );
    assert_eq!(harness.push.registrations(), 0);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_blank_base_emits_relative_fallback() {
    let config = LaunchConfig::new(obfuscate("2099-01-01"), "");
    let (_harness, orchestrator, mut events) = launch(&config, MemoryStore::new(), false);

    let LaunchOutcome::Fallback(destination) = orchestrator.run().await else {
        panic!("expected fallback");
    };
    assert!(destination.as_str().starts_with("/?data="));
    assert_eq!(drain(&mut events).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_malformed_base_still_emits_fallback() {
    let config = LaunchConfig::new(obfuscate("2099-01-01"), "%6");
    let (_harness, orchestrator, mut events) = launch(&config, MemoryStore::new(), true);

    let outcome = orchestrator.run().await;

    let LaunchOutcome::Fallback(destination) = outcome else {
        panic!("expected fallback, got {outcome:?}");
    };
    assert!(destination.as_str().starts_with("/?data="));
    assert_eq!(drain(&mut events).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn launch_flow_tests_flag_without_destination_emits_nothing() {
    let store = MemoryStore::new();
    store
        .set(HAS_LAUNCHED_BEFORE_KEY, StoredValue::Bool(true))
        .expect("memory store write should succeed");
    let (harness, orchestrator, mut events) = launch(&open_config(), store, true);

    let outcome = orchestrator.run().await;

    assert_eq!(outcome, LaunchOutcome::RestoreUnavailable);
    assert_eq!(events.recv().await, None);
    assert_eq!(harness.push.registrations(), 0);
}
