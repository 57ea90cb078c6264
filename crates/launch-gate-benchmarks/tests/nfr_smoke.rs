//! Benchmark smoke test for the decode, gate, and destination build loop.

use std::time::Instant;

use launch_gate_core::{DevicePayload, Destination, UnlockGate, decode_percent_ascii};
use launch_gate_destination::DestinationBuilder;

const ENCODED_DATE: &str = "%32%30%32%35%2D%30%34%2D%31%30";
const ENCODED_BASE: &str =
    "%68%74%74%70%73%3A%2F%2F%70%6C%61%79%2E%65%78%61%6D%70%6C%65%2E%74%65%73%74";

#[test]
fn benchmark_launch_decision_smoke_prints_latency() {
    let start = Instant::now();
    let mut total_len = 0usize;
    let mut open_gates = 0usize;

    for index in 0..10_000_u32 {
        let gate = UnlockGate::parse(&decode_percent_ascii(ENCODED_DATE));
        if gate.date().is_some() {
            open_gates += 1;
        }

        let builder = DestinationBuilder::from_encoded(ENCODED_BASE);
        let payload = DevicePayload::new(format!("device-{index}"), "");
        let destination =
            Destination::parse(builder.build(&payload)).expect("built destination should parse");
        total_len += destination.as_str().len();
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_launch_decision_elapsed_ms={elapsed_ms}");
    println!("benchmark_destination_total_len={total_len}");

    assert_eq!(open_gates, 10_000);
    // Lightweight guardrail; strict NFR checks are environment-specific.
    assert!(
        elapsed_ms < 5_000,
        "launch decision smoke benchmark should stay bounded"
    );
}
