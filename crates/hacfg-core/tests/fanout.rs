//! Integration tests for peer fan-out and cluster configuration pushes.

mod common;

use common::{LiveFixture, MockTransport};
use hacfg_core::commands::cluster;
use hacfg_core::env::EnvOptions;
use hacfg_core::fanout::{FanoutStatus, PeerFanout, PeerOutcome};
use hacfg_core::{ForceCode, ReportKind, SchemaVersion, Severity};
use std::sync::Arc;
use std::time::Duration;

fn peers() -> Vec<String> {
    vec!["node1".to_string(), "node2".to_string(), "node3".to_string()]
}

fn fanout(transport: &MockTransport) -> PeerFanout {
    PeerFanout::new(Arc::new(transport.clone()), Duration::from_secs(30))
}

#[tokio::test]
async fn test_skip_offline_peer() {
    let transport = MockTransport::new().unreachable("node2");

    let summary = fanout(&transport).distribute(&peers(), "totem {}", true).await;

    assert_eq!(summary.status, FanoutStatus::SuccessWithWarnings);
    assert_eq!(transport.receivers().await, vec!["node1", "node3"]);
    assert_eq!(summary.successful_peers(), vec!["node1", "node3"]);
    assert_eq!(summary.failed_peers(), vec!["node2"]);
    let skipped: Vec<_> = summary
        .reports
        .items()
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert!(matches!(
        &skipped[0].kind,
        ReportKind::NodeSkipped { node, .. } if node == "node2"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_peers_are_contacted_concurrently() {
    let transport = MockTransport::new().delayed(Duration::from_secs(10));
    let start = tokio::time::Instant::now();

    let summary = fanout(&transport).distribute(&peers(), "totem {}", false).await;

    assert_eq!(summary.status, FanoutStatus::Success);
    assert_eq!(transport.receivers().await, vec!["node1", "node2", "node3"]);
    assert!(start.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn test_offline_peer_without_skip_fails() {
    let transport = MockTransport::new().unreachable("node2");

    let summary = fanout(&transport).distribute(&peers(), "totem {}", false).await;

    assert_eq!(summary.status, FanoutStatus::Failed);
    let errors: Vec<_> = summary.reports.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind.code(), "NODE_COMMUNICATION_ERROR");
    assert_eq!(errors[0].force_code, Some(ForceCode::SkipOfflineNodes));
    assert!((summary.failure_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_rejection_is_never_skipped() {
    let transport = MockTransport::new().rejecting("node3");

    let summary = fanout(&transport).distribute(&peers(), "totem {}", true).await;

    assert_eq!(summary.status, FanoutStatus::Failed);
    assert_eq!(
        summary.results[2].outcome,
        PeerOutcome::Rejected("invalid configuration".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_peer_times_out() {
    let transport = MockTransport::new().slow("node1");
    let fanout = PeerFanout::new(Arc::new(transport.clone()), Duration::from_secs(1));

    let summary = fanout.distribute(&peers(), "totem {}", true).await;

    assert_eq!(summary.results[0].outcome, PeerOutcome::TimedOut);
    assert_eq!(summary.status, FanoutStatus::SuccessWithWarnings);
    assert_eq!(transport.receivers().await, vec!["node2", "node3"]);
}

#[tokio::test]
async fn test_stop_check_ignores_skip() {
    let fixture = LiveFixture::new(SchemaVersion::LATEST);
    let transport = MockTransport::new().unreachable("node2");
    let options = EnvOptions {
        skip_offline_nodes: true,
        ..EnvOptions::default()
    };
    let mut env = fixture.env_with_peers(options, &["node1", "node2", "node3"], transport.clone());

    let err = cluster::push_cluster_conf(&mut env, "totem {}", true)
        .await
        .unwrap_err();

    assert_eq!(err.reports()[0].kind.code(), "NODE_COMMUNICATION_ERROR");
    assert!(transport.receivers().await.is_empty());
}

#[tokio::test]
async fn test_running_node_blocks_push() {
    let fixture = LiveFixture::new(SchemaVersion::LATEST);
    let transport = MockTransport::new().running("node3");
    let mut env = fixture.env_with_peers(EnvOptions::default(), &["node1", "node2", "node3"], transport.clone());

    let err = cluster::push_cluster_conf(&mut env, "totem {}", true)
        .await
        .unwrap_err();

    assert_eq!(
        err.reports()[0].kind,
        ReportKind::NodeNotStopped {
            node: "node3".to_string()
        }
    );
    assert!(transport.receivers().await.is_empty());
}

#[tokio::test]
async fn test_push_to_stopped_cluster() {
    let fixture = LiveFixture::new(SchemaVersion::LATEST);
    let transport = MockTransport::new().unreachable("node2");
    let options = EnvOptions {
        skip_offline_nodes: true,
        ..EnvOptions::default()
    };
    let mut env = fixture.env_with_peers(options, &["node1", "node2", "node3"], transport.clone());

    let reports = cluster::push_cluster_conf(&mut env, "totem {}", false)
        .await
        .unwrap();

    assert!(reports
        .items()
        .iter()
        .any(|i| i.kind.code() == "NODE_SKIPPED"));
    assert_eq!(transport.receivers().await, vec!["node1", "node3"]);
    assert!(fixture.reporter.codes().contains(&"CLUSTER_CONF_ACCEPTED_BY_NODE".to_string()));
}

#[tokio::test]
async fn test_empty_cluster_conf_is_rejected() {
    let fixture = LiveFixture::new(SchemaVersion::LATEST);
    let mut env = fixture.env_with_peers(EnvOptions::default(), &["node1"], MockTransport::new());

    let err = cluster::push_cluster_conf(&mut env, "  ", false).await.unwrap_err();

    assert_eq!(err.reports()[0].kind.code(), "REQUIRED_OPTION_IS_MISSING");
}
