// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation runs against a Cloud DNS zone.
//!
//! These tests drive the real Cloud DNS client (token exchange, paginated
//! listing, change submission) against a stateful mock of one managed zone,
//! with broker discovery replaced by a fixed broker list.
//!
//! Run with: cargo test --test reconcile_integration

mod common;

use broker_locator::discovery::DiscoveryRequest;
use broker_locator::reconciler::{ApplyPolicy, Reconciler, ReportStatus, RunRequest};
use broker_locator::types::{ApplyOutcome, BrokerId};
use common::{two_brokers, FakeCloudDns, StaticDiscovery};

// ============================================================================
// Helper Functions
// ============================================================================

fn run_request() -> RunRequest {
    RunRequest {
        discovery: DiscoveryRequest::new("seed-0:9092", "user", "secret"),
        prefix: "kafka".to_string(),
    }
}

/// Zone with both identity records spread over two list pages.
fn published_zone() -> FakeCloudDns {
    FakeCloudDns::with_a_records(&[
        ("a.cloud.", "9.9.9.9"),
        ("kafka-0.cloud.", "1.1.1.1"),
        ("kafka-1.cloud.", "1.1.1.2"),
        ("www.cloud.", "9.9.9.8"),
    ])
}

fn outcomes(report: &broker_locator::reconciler::ReconcileReport) -> Vec<(&str, ApplyOutcome)> {
    report
        .outcomes
        .iter()
        .map(|r| (r.hostname.as_str(), r.outcome.clone()))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_first_run_creates_then_repeat_is_idempotent() {
    let zone = published_zone();
    let server = zone.start().await;
    let directory = FakeCloudDns::open(&server).await;
    let reconciler = Reconciler::default();
    let discovery = two_brokers();

    let first = reconciler
        .run(&discovery, directory.as_ref(), &run_request())
        .await
        .unwrap();

    assert_eq!(first.status(), ReportStatus::Success);
    assert_eq!(
        outcomes(&first),
        vec![
            ("n0.cloud", ApplyOutcome::Created),
            ("n1.cloud", ApplyOutcome::Created),
        ]
    );
    assert_eq!(zone.address("n0.cloud.").as_deref(), Some("1.1.1.1"));
    assert_eq!(zone.address("n1.cloud.").as_deref(), Some("1.1.1.2"));
    assert_eq!(zone.change_count(), 2);

    let second = reconciler
        .run(&discovery, directory.as_ref(), &run_request())
        .await
        .unwrap();

    assert_eq!(second.status(), ReportStatus::Success);
    assert_eq!(
        outcomes(&second),
        vec![
            ("n0.cloud", ApplyOutcome::NoOpIdempotent),
            ("n1.cloud", ApplyOutcome::NoOpIdempotent),
        ]
    );
    assert_eq!(zone.change_count(), 2, "repeat run must not change the zone");
}

#[tokio::test]
async fn test_conflicting_record_is_left_untouched() {
    let zone = FakeCloudDns::with_a_records(&[
        ("kafka-0.cloud.", "1.1.1.1"),
        ("kafka-1.cloud.", "1.1.1.2"),
        ("n1.cloud.", "5.5.5.5"),
    ]);
    let server = zone.start().await;
    let directory = FakeCloudDns::open(&server).await;

    let report = Reconciler::default()
        .run(&two_brokers(), directory.as_ref(), &run_request())
        .await
        .unwrap();

    assert_eq!(report.status(), ReportStatus::Conflict);
    assert_eq!(
        outcomes(&report),
        vec![
            ("n0.cloud", ApplyOutcome::Created),
            (
                "n1.cloud",
                ApplyOutcome::Conflict {
                    current: "5.5.5.5".to_string()
                }
            ),
        ]
    );
    assert_eq!(zone.address("n1.cloud.").as_deref(), Some("5.5.5.5"));
}

#[tokio::test]
async fn test_fail_fast_stops_after_conflict() {
    let zone = FakeCloudDns::with_a_records(&[
        ("kafka-0.cloud.", "1.1.1.1"),
        ("kafka-1.cloud.", "1.1.1.2"),
        ("n0.cloud.", "5.5.5.5"),
    ]);
    let server = zone.start().await;
    let directory = FakeCloudDns::open(&server).await;

    let report = Reconciler::new(ApplyPolicy::FailFast, 300)
        .run(&two_brokers(), directory.as_ref(), &run_request())
        .await
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].hostname, "n0.cloud");
    assert_eq!(zone.address("n1.cloud."), None);
    assert_eq!(zone.change_count(), 0);
}

#[tokio::test]
async fn test_unpublished_broker_is_unresolved() {
    let zone = FakeCloudDns::with_a_records(&[("kafka-0.cloud.", "1.1.1.1")]);
    let server = zone.start().await;
    let directory = FakeCloudDns::open(&server).await;

    let report = Reconciler::default()
        .run(&two_brokers(), directory.as_ref(), &run_request())
        .await
        .unwrap();

    assert_eq!(report.status(), ReportStatus::Success);
    assert_eq!(report.unresolved, vec![BrokerId(1)]);
    assert_eq!(outcomes(&report), vec![("n0.cloud", ApplyOutcome::Created)]);
    assert_eq!(zone.address("n1.cloud."), None);
}

#[tokio::test]
async fn test_concurrent_apply_keeps_broker_order() {
    let brokers: Vec<_> = (0..6)
        .map(|id| broker_locator::types::BrokerRecord::new(id, format!("n{id}.cloud")))
        .collect();
    let published: Vec<(String, String)> = (0..6)
        .map(|id| (format!("kafka-{id}.cloud."), format!("10.0.0.{}", id + 1)))
        .collect();
    let zone = FakeCloudDns::with_a_records(
        &published
            .iter()
            .map(|(name, ip)| (name.as_str(), ip.as_str()))
            .collect::<Vec<_>>(),
    );
    let server = zone.start().await;
    let directory = FakeCloudDns::open(&server).await;

    let report = Reconciler::new(ApplyPolicy::ApplyAll { concurrency: 4 }, 300)
        .run(&StaticDiscovery(brokers), directory.as_ref(), &run_request())
        .await
        .unwrap();

    let hostnames: Vec<&str> = report.outcomes.iter().map(|r| r.hostname.as_str()).collect();
    assert_eq!(
        hostnames,
        vec!["n0.cloud", "n1.cloud", "n2.cloud", "n3.cloud", "n4.cloud", "n5.cloud"]
    );
    assert!(report.outcomes.iter().all(|r| r.outcome == ApplyOutcome::Created));
    assert_eq!(zone.address("n5.cloud.").as_deref(), Some("10.0.0.6"));
}
