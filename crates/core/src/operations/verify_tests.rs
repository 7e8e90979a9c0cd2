// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::clock::CancellationSource;
use crate::domain::{ActiveTopology, DevicePreparation, SingleDisplayConfiguration};
use crate::testing::{FakeDisplayBackend, NoopSleeper};

fn sample_request() -> ApplyRequest {
    ApplyRequest {
        configuration: SingleDisplayConfiguration {
            primary_device: "A".to_string(),
            desired_mode: None,
            desired_hdr: None,
            preparation: DevicePreparation::EnsureOnlyDisplay,
            virtual_layout: None,
        },
        topology_override: None,
        virtual_layout: None,
        session_fingerprint: "sess-1".to_string(),
    }
}

#[tokio::test]
async fn matches_immediately_returns_true() {
    let backend = FakeDisplayBackend::new();
    let source = CancellationSource::new();
    let token = source.token();
    let ok = verify(&backend, &sample_request(), None, &token, &NoopSleeper, Duration::from_millis(200)).await;
    assert!(ok);
}

#[tokio::test]
async fn topology_mismatch_forever_exceeds_bound_and_fails() {
    let backend = FakeDisplayBackend::new();
    *backend.captured_topology.lock().expect("lock") = ActiveTopology::single("WRONG");
    let expected = ActiveTopology::single("RIGHT");
    let source = CancellationSource::new();
    let token = source.token();
    let ok = verify(&backend, &sample_request(), Some(&expected), &token, &NoopSleeper, Duration::from_millis(150))
        .await;
    assert!(!ok);
}

#[tokio::test]
async fn cancelled_token_fails_immediately() {
    let backend = FakeDisplayBackend::new();
    backend.configuration_matches.store(false, std::sync::atomic::Ordering::SeqCst);
    let source = CancellationSource::new();
    let token = source.token();
    source.cancel();
    let ok = verify(&backend, &sample_request(), None, &token, &NoopSleeper, Duration::from_millis(200)).await;
    assert!(!ok);
}

#[tokio::test]
async fn configuration_mismatch_fails_even_with_no_expected_topology() {
    let backend = FakeDisplayBackend::new();
    backend.configuration_matches.store(false, std::sync::atomic::Ordering::SeqCst);
    let source = CancellationSource::new();
    let token = source.token();
    let ok = verify(&backend, &sample_request(), None, &token, &NoopSleeper, Duration::from_millis(100)).await;
    assert!(!ok);
}
