//! Tests for the Orchestrator module

use super::aggregator::aggregate;
use super::builder::OrchestratorBuilder;
use crate::config::{BenchmarkRun, BrokerConfig, ConfigError, JoinPolicy, PublishMode};
use crate::error::BenchError;
use crate::result::{FailureReason, Role, WorkerOutcome};
use crate::testing::{Delivery, MockClient};

use std::sync::Arc;
use std::time::Duration;

fn run() -> BenchmarkRun {
    BenchmarkRun::new(BrokerConfig::new("localhost")).with_payload_size(32)
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_missing_client() {
    let result = OrchestratorBuilder::new().run(run()).build();

    assert!(matches!(result, Err(BenchError::MissingConfig("client"))));
}

#[test]
fn test_builder_missing_run() {
    let result = OrchestratorBuilder::new()
        .client(Arc::new(MockClient::new()))
        .build();

    assert!(matches!(result, Err(BenchError::MissingConfig("run"))));
}

#[test]
fn test_builder_rejects_insufficient_traffic_before_spawning() {
    let client = MockClient::new();

    let result = OrchestratorBuilder::new()
        .run(run().with_publishers(1, 5).with_subscribers(1, 10))
        .client(Arc::new(client.clone()))
        .build();

    assert!(matches!(
        result,
        Err(BenchError::Config(ConfigError::InsufficientTraffic { .. }))
    ));
    assert_eq!(client.connects(), 0);
}

#[test]
fn test_orchestrator_debug_format() {
    let orchestrator = OrchestratorBuilder::new()
        .run(run())
        .client(Arc::new(MockClient::new()))
        .build()
        .expect("Failed to build");

    let debug = format!("{:?}", orchestrator);
    assert!(debug.contains("Orchestrator"));
    assert!(debug.contains("mock"));
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_orchestrator_run_full_result_sets() {
    let client = MockClient::new();
    let orchestrator = OrchestratorBuilder::new()
        .run(run().with_subscribers(3, 10).with_publishers(2, 5))
        .client(Arc::new(client.clone()))
        .build()
        .expect("Failed to build orchestrator");

    let results = orchestrator.run().await.expect("Run failed");

    assert_eq!(results.subscribers.len(), 3);
    assert_eq!(results.publishers.len(), 2);
    assert!(results.is_complete());
    assert_eq!(client.publishes(), 10);
    assert_eq!(client.subscriptions(), 3);

    let stats = aggregate(&results.publishers, 5, 2).expect("publisher stats");
    assert_eq!(stats.samples, 2);
}

#[tokio::test]
async fn test_orchestrator_persistent_publishers() {
    let client = MockClient::new();
    let orchestrator = OrchestratorBuilder::new()
        .run(
            run()
                .with_subscribers(1, 8)
                .with_publishers(2, 4)
                .with_publish_mode(PublishMode::Persistent),
        )
        .client(Arc::new(client.clone()))
        .build()
        .expect("Failed to build orchestrator");

    let results = orchestrator.run().await.expect("Run failed");

    assert!(results.is_complete());
    // one per subscriber plus one per publisher
    assert_eq!(client.connects(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_silent_subscribers_are_aborted_and_publishers_still_report() {
    let client = MockClient::new().with_delivery(Delivery::Silent);
    let orchestrator = OrchestratorBuilder::new()
        .run(
            run()
                .with_subscribers(2, 5)
                .with_publishers(1, 5)
                .with_timeout(Role::Subscriber, Duration::from_secs(10)),
        )
        .client(Arc::new(client))
        .build()
        .expect("Failed to build orchestrator");

    let results = orchestrator.run().await.expect("Run failed");

    assert_eq!(results.subscribers.completed(), 0);
    assert_eq!(results.subscribers.shortfall(), 2);
    assert!(results
        .subscribers
        .failures()
        .all(|(_, reason)| *reason == FailureReason::Aborted));
    assert!(aggregate(&results.subscribers, 5, 2).is_err());

    assert!(results.publishers.is_complete());
    assert!(aggregate(&results.publishers, 5, 1).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_subscriber_reports_its_own_timeout() {
    // two of five messages arrive, then traffic stops
    let client = MockClient::new().with_delivery(Delivery::Scripted(2));
    let orchestrator = OrchestratorBuilder::new()
        .run(
            run()
                .with_subscribers(1, 5)
                .with_publishers(1, 5)
                .with_timeout(Role::Subscriber, Duration::from_secs(3)),
        )
        .client(Arc::new(client))
        .build()
        .expect("Failed to build orchestrator");

    let results = orchestrator.run().await.expect("Run failed");

    let reasons: Vec<_> = results
        .subscribers
        .failures()
        .map(|(_, reason)| reason.clone())
        .collect();
    assert_eq!(reasons.len(), 1);
    match &reasons[0] {
        FailureReason::Timeout { budget, .. } => assert_eq!(*budget, Duration::from_secs(3)),
        other => panic!("Expected timeout, got {:?}", other),
    }
    assert!(results.publishers.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_join_policy_times_out() {
    let client = MockClient::new().with_delivery(Delivery::Silent);
    let orchestrator = OrchestratorBuilder::new()
        .run(
            run()
                .with_subscribers(2, 5)
                .with_publishers(1, 5)
                .with_timeout(Role::Subscriber, Duration::from_secs(10))
                .with_join_policy(JoinPolicy::FailFast),
        )
        .client(Arc::new(client))
        .build()
        .expect("Failed to build orchestrator");

    let err = orchestrator.run().await.expect_err("Run should time out");

    assert!(err.is_timeout());
    match err {
        BenchError::OrchestratorTimeout { role, pending, .. } => {
            assert_eq!(role, Role::Subscriber);
            assert_eq!(pending, 2);
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_join_deadline_is_shared_not_additive() {
    let client = MockClient::new().with_delivery(Delivery::Silent);
    let orchestrator = OrchestratorBuilder::new()
        .run(
            run()
                .with_subscribers(5, 5)
                .with_publishers(1, 5)
                .with_timeout(Role::Subscriber, Duration::from_secs(10)),
        )
        .client(Arc::new(client))
        .build()
        .expect("Failed to build orchestrator");

    let budget = orchestrator.config().join_budget(Role::Subscriber);
    let start = tokio::time::Instant::now();
    let results = orchestrator.run().await.expect("Run failed");

    // five stuck workers still cost a single budget, not five
    assert!(start.elapsed() < budget * 2);
    assert_eq!(results.subscribers.shortfall(), 5);
}

#[tokio::test]
async fn test_connect_failures_degrade_into_shortfall() {
    let client = MockClient::new().with_failing_connect();
    let orchestrator = OrchestratorBuilder::new()
        .run(run().with_subscribers(2, 5).with_publishers(3, 5))
        .client(Arc::new(client))
        .build()
        .expect("Failed to build orchestrator");

    let results = orchestrator.run().await.expect("Run failed");

    assert_eq!(results.subscribers.failed(), 2);
    assert_eq!(results.publishers.failed(), 3);
    assert_eq!(results.publishers.missing(), 0);
    assert!(!results.is_complete());
    assert!(results
        .publishers
        .results()
        .iter()
        .all(|r| matches!(r.outcome, WorkerOutcome::Failed(FailureReason::Client { .. }))));
}

#[tokio::test]
async fn test_publishers_only_run() {
    let client = MockClient::new();
    let orchestrator = OrchestratorBuilder::new()
        .run(run().with_subscribers(0, 5).with_publishers(2, 3))
        .client(Arc::new(client.clone()))
        .build()
        .expect("Failed to build orchestrator");

    let results = orchestrator.run().await.expect("Run failed");

    assert!(results.subscribers.is_empty());
    assert_eq!(results.role(Role::Publisher).completed(), 2);
    assert_eq!(client.publishes(), 6);
}
