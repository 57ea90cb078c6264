//! Integration tests for launch status projection and log redaction.

use launch_gate_app::project_launch_status;
use launch_gate_core::{ConnectivityState, Destination, InterfaceClass, LaunchEvent};
use launch_gate_ui::UiState;

fn destination() -> Destination {
    Destination::parse("https://play.example.test/start/?data=YXBuc190b2tlbj1zZWNyZXQ=")
        .expect("destination should parse")
}

#[test]
fn status_projection_tests_loading_while_offline() {
    let state = UiState::new("0.1.0");
    let status = project_launch_status(&state, ConnectivityState::default());

    assert_eq!(status.screen, "loading");
    assert_eq!(status.destination, None);
    assert_eq!(status.network, "offline");
    assert!(!status.alert_visible);
}

#[test]
fn status_projection_tests_destination_is_redacted() {
    let mut state = UiState::new("0.1.0");
    state.apply(&LaunchEvent::LoadingTargetUpdated {
        destination: destination(),
    });
    let connectivity = ConnectivityState {
        active: true,
        is_expensive: true,
        is_constrained: false,
        interface_class: InterfaceClass::Cellular,
    };

    let status = project_launch_status(&state, connectivity);

    assert_eq!(status.screen, "destination");
    assert_eq!(
        status.destination.as_deref(),
        Some("https://play.example.test/start/?data=<redacted>")
    );
    assert_eq!(status.network, "online/cellular+expensive");
}

#[test]
fn status_projection_tests_fallback_and_alert_flags() {
    let mut state = UiState::new("0.1.0");
    state.apply(&LaunchEvent::ShowConnectivityAlert { visible: true });
    let alerted = project_launch_status(&state, ConnectivityState::default());
    assert!(alerted.alert_visible);
    assert_eq!(alerted.screen, "loading");

    state.apply(&LaunchEvent::ShowConnectivityAlert { visible: false });
    state.apply(&LaunchEvent::ShowFallback {
        destination: destination(),
    });
    let fallback = project_launch_status(&state, ConnectivityState::default());
    assert_eq!(fallback.screen, "fallback");
    assert!(!fallback.alert_visible);
    assert!(!fallback.destination.unwrap_or_default().contains("c2VjcmV0"));
}
