//! Peer fan-out: parallel delivery of a payload to every cluster node.
//!
//! Each peer gets its own task bounded by the request timeout; the fan-out
//! waits for all of them, so its latency is that of the slowest peer.

use crate::ports::{PeerError, PeerTransport};
use crate::report::{ForceCode, ReportItem, ReportKind, ReportList, Severity};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// What happened to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOutcome {
    /// The payload was accepted.
    Delivered(String),
    /// The peer reports its cluster daemons stopped.
    Stopped,
    /// The peer reports its cluster daemons running.
    NotStopped,
    /// The peer could not be contacted.
    Unreachable(String),
    /// No answer within the request timeout.
    TimedOut,
    /// The peer answered and refused the payload.
    Rejected(String),
}

impl PeerOutcome {
    /// Returns true for outcomes a skip of offline nodes may tolerate.
    pub fn is_offline(&self) -> bool {
        matches!(self, PeerOutcome::Unreachable(_) | PeerOutcome::TimedOut)
    }
}

/// Result of a request to one peer.
#[derive(Debug, Clone)]
pub struct FanoutResult {
    /// Peer name.
    pub peer: String,
    /// Outcome.
    pub outcome: PeerOutcome,
    /// Microseconds until the outcome was known.
    pub latency_us: u64,
}

impl FanoutResult {
    /// Returns true if the peer did what was asked.
    pub fn success(&self) -> bool {
        matches!(self.outcome, PeerOutcome::Delivered(_) | PeerOutcome::Stopped)
    }
}

/// Overall outcome of a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutStatus {
    /// Every peer succeeded.
    Success,
    /// Some peers were skipped.
    SuccessWithWarnings,
    /// At least one error.
    Failed,
}

/// Summary of a fan-out across all peers.
#[derive(Debug, Clone)]
pub struct FanoutSummary {
    /// Overall status.
    pub status: FanoutStatus,
    /// Individual results, in the order the peers were given.
    pub results: Vec<FanoutResult>,
    /// Diagnostics, errors included.
    pub reports: ReportList,
}

impl FanoutSummary {
    fn new(results: Vec<FanoutResult>, reports: ReportList) -> Self {
        let status = if reports.has_errors() {
            FanoutStatus::Failed
        } else if reports.items().iter().any(|i| i.severity == Severity::Warning) {
            FanoutStatus::SuccessWithWarnings
        } else {
            FanoutStatus::Success
        };
        Self {
            status,
            results,
            reports,
        }
    }

    /// Returns true if all peers succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(FanoutResult::success)
    }

    /// Returns true if any peer failed, skipped ones included.
    pub fn any_failed(&self) -> bool {
        self.results.iter().any(|r| !r.success())
    }

    /// Returns the failure rate (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let failed = self.results.iter().filter(|r| !r.success()).count();
        failed as f64 / self.results.len() as f64
    }

    /// Names of successful peers.
    pub fn successful_peers(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.success())
            .map(|r| r.peer.clone())
            .collect()
    }

    /// Names of failed peers.
    pub fn failed_peers(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success())
            .map(|r| r.peer.clone())
            .collect()
    }
}

/// Sends requests to a set of peers in parallel.
#[derive(Clone)]
pub struct PeerFanout {
    transport: Arc<dyn PeerTransport>,
    request_timeout: Duration,
}

impl PeerFanout {
    /// Create a new fan-out over `transport`.
    pub fn new(transport: Arc<dyn PeerTransport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    async fn dispatch<F, Fut>(&self, peers: &[String], request: F) -> Vec<FanoutResult>
    where
        F: Fn(Arc<dyn PeerTransport>, String) -> Fut,
        Fut: Future<Output = Result<PeerOutcome, PeerError>> + Send + 'static,
    {
        let mut handles = Vec::with_capacity(peers.len());
        for peer in peers {
            let pending = request(Arc::clone(&self.transport), peer.clone());
            let timeout = self.request_timeout;
            let name = peer.clone();
            handles.push((
                peer.clone(),
                tokio::spawn(async move {
                    let start = Instant::now();
                    let outcome = match tokio::time::timeout(timeout, pending).await {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(PeerError::Unreachable(reason))) => PeerOutcome::Unreachable(reason),
                        Ok(Err(PeerError::Rejected(reason))) => PeerOutcome::Rejected(reason),
                        Err(_) => PeerOutcome::TimedOut,
                    };
                    FanoutResult {
                        peer: name,
                        outcome,
                        latency_us: start.elapsed().as_micros() as u64,
                    }
                }),
            ));
        }

        let (names, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, peer)| match joined {
                Ok(result) => result,
                Err(e) => FanoutResult {
                    peer,
                    outcome: PeerOutcome::Unreachable(e.to_string()),
                    latency_us: 0,
                },
            })
            .collect()
    }

    /// Delivers `payload` to every peer.
    ///
    /// Unreachable or timed out peers are errors, or warnings naming the
    /// skipped peer when `skip_offline_nodes` is set. A peer refusing the
    /// payload is always an error.
    pub async fn distribute(
        &self,
        peers: &[String],
        payload: &str,
        skip_offline_nodes: bool,
    ) -> FanoutSummary {
        let payload: Arc<str> = Arc::from(payload);
        let mut reports = ReportList::new();
        reports.push(ReportItem::info(ReportKind::ClusterConfDistributionStarted {
            nodes: peers.to_vec(),
        }));
        info!(peers = peers.len(), "distributing cluster configuration");

        let results = self
            .dispatch(peers, |transport, peer| {
                let payload = Arc::clone(&payload);
                async move {
                    transport
                        .send(&peer, &payload)
                        .await
                        .map(|response| PeerOutcome::Delivered(response.message))
                }
            })
            .await;

        for result in &results {
            let node = result.peer.clone();
            let item = match &result.outcome {
                PeerOutcome::Delivered(_) | PeerOutcome::Stopped => {
                    ReportItem::info(ReportKind::ClusterConfAcceptedByNode { node })
                }
                PeerOutcome::Rejected(reason) => ReportItem::error(ReportKind::NodeRejectedPayload {
                    node,
                    reason: reason.clone(),
                }),
                PeerOutcome::NotStopped => ReportItem::error(ReportKind::NodeNotStopped { node }),
                offline if skip_offline_nodes => {
                    warn!(peer = %node, "skipping offline node");
                    ReportItem::warning(ReportKind::NodeSkipped {
                        node,
                        reason: offline_reason(offline),
                    })
                }
                PeerOutcome::TimedOut => ReportItem::forceable_error(
                    ReportKind::NodeCommunicationTimedOut { node },
                    ForceCode::SkipOfflineNodes,
                ),
                PeerOutcome::Unreachable(reason) => ReportItem::forceable_error(
                    ReportKind::NodeCommunicationError {
                        node,
                        reason: reason.clone(),
                    },
                    ForceCode::SkipOfflineNodes,
                ),
            };
            reports.push(item);
        }

        FanoutSummary::new(results, reports)
    }

    /// Polls every peer whether its cluster daemons are stopped.
    ///
    /// A running or silent peer fails the check whatever the skip setting;
    /// nodes cannot be proven stopped without an answer.
    pub async fn check_stopped(&self, peers: &[String]) -> FanoutSummary {
        let results = self
            .dispatch(peers, |transport, peer| async move {
                transport.check_stopped(&peer).await.map(|stopped| {
                    if stopped {
                        PeerOutcome::Stopped
                    } else {
                        PeerOutcome::NotStopped
                    }
                })
            })
            .await;

        let mut reports = ReportList::new();
        for result in &results {
            let node = result.peer.clone();
            match &result.outcome {
                PeerOutcome::Stopped | PeerOutcome::Delivered(_) => {}
                PeerOutcome::NotStopped => {
                    reports.push(ReportItem::error(ReportKind::NodeNotStopped { node }))
                }
                PeerOutcome::TimedOut => {
                    reports.push(ReportItem::error(ReportKind::NodeCommunicationTimedOut { node }))
                }
                PeerOutcome::Unreachable(reason) | PeerOutcome::Rejected(reason) => {
                    reports.push(ReportItem::error(ReportKind::NodeCommunicationError {
                        node,
                        reason: reason.clone(),
                    }))
                }
            }
        }
        if !reports.has_errors() {
            reports.push(ReportItem::info(ReportKind::ClusterStoppedOnAllNodes {
                nodes: peers.to_vec(),
            }));
        }
        FanoutSummary::new(results, reports)
    }
}

fn offline_reason(outcome: &PeerOutcome) -> String {
    match outcome {
        PeerOutcome::Unreachable(reason) => reason.clone(),
        PeerOutcome::TimedOut => "request timed out".to_string(),
        _ => String::new(),
    }
}

impl std::fmt::Debug for PeerFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerFanout")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PeerResponse;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl PeerTransport for Echo {
        async fn send(&self, peer: &str, payload: &str) -> Result<PeerResponse, PeerError> {
            Ok(PeerResponse {
                message: format!("{}:{}", peer, payload.len()),
            })
        }

        async fn check_stopped(&self, _peer: &str) -> Result<bool, PeerError> {
            Ok(true)
        }
    }

    fn peers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_distribute_to_all() {
        let fanout = PeerFanout::new(Arc::new(Echo), Duration::from_secs(1));
        let summary = fanout.distribute(&peers(&["a", "b"]), "conf", false).await;
        assert_eq!(summary.status, FanoutStatus::Success);
        assert!(summary.all_succeeded());
        assert!(!summary.any_failed());
        assert_eq!(summary.failure_rate(), 0.0);
        assert_eq!(summary.successful_peers(), vec!["a", "b"]);
        assert_eq!(summary.results[0].outcome, PeerOutcome::Delivered("a:4".to_string()));
    }

    #[tokio::test]
    async fn test_distribute_to_nobody() {
        let fanout = PeerFanout::new(Arc::new(Echo), Duration::from_secs(1));
        let summary = fanout.distribute(&[], "conf", false).await;
        assert!(!summary.all_succeeded());
        assert_eq!(summary.failure_rate(), 0.0);
        assert_eq!(summary.status, FanoutStatus::Success);
    }

    #[tokio::test]
    async fn test_check_stopped_all() {
        let fanout = PeerFanout::new(Arc::new(Echo), Duration::from_secs(1));
        let summary = fanout.check_stopped(&peers(&["a", "b"])).await;
        assert_eq!(summary.status, FanoutStatus::Success);
        assert_eq!(
            summary.reports.items()[0].kind.code(),
            "CLUSTER_STOPPED_ON_ALL_NODES"
        );
    }

    #[test]
    fn test_offline_outcomes() {
        assert!(PeerOutcome::TimedOut.is_offline());
        assert!(PeerOutcome::Unreachable("x".to_string()).is_offline());
        assert!(!PeerOutcome::Rejected("x".to_string()).is_offline());
    }
}
