//! Ports to the collaborators the core never implements itself: the live
//! document store, the cluster status, the idle waiter and the peer
//! transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by port implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The collaborator cannot be used right now.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The stored document changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The collaborator refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Live copy of the configuration document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the serialized document.
    async fn read(&self) -> Result<String, PortError>;

    /// Replaces the document.
    async fn write(&self, document: &str) -> Result<(), PortError>;
}

/// State of one resource in the running cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Resource id.
    pub id: String,
    /// Nodes the resource runs on.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Snapshot of the running cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Resources known to the cluster.
    #[serde(default)]
    pub resources: Vec<ResourceStatus>,
}

impl ClusterStatus {
    /// Nodes `resource_id` runs on; empty when unknown or stopped.
    pub fn running_on(&self, resource_id: &str) -> Vec<String> {
        self.resources
            .iter()
            .find(|r| r.id == resource_id)
            .map(|r| r.nodes.clone())
            .unwrap_or_default()
    }
}

/// Source of cluster status.
#[async_trait]
pub trait ClusterStatusReader: Send + Sync {
    /// Reads the current status.
    async fn read_status(&self) -> Result<ClusterStatus, PortError>;
}

/// Failure of [`IdleWaiter::wait`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The cluster did not settle in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Waiting itself failed.
    #[error("{0}")]
    Other(String),
}

/// Blocks until the cluster has no pending actions.
#[async_trait]
pub trait IdleWaiter: Send + Sync {
    /// Waits; `None` waits without a limit.
    async fn wait(&self, timeout: Option<Duration>) -> Result<(), WaitError>;
}

/// Answer of a peer which accepted a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerResponse {
    /// Free-form text returned by the peer.
    pub message: String,
}

/// Failure of a peer request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// The peer could not be contacted.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The peer answered and refused the payload.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Delivery of payloads to cluster nodes.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Sends `payload` to `peer`.
    async fn send(&self, peer: &str, payload: &str) -> Result<PeerResponse, PeerError>;

    /// Asks `peer` whether its cluster daemons are stopped.
    async fn check_stopped(&self, peer: &str) -> Result<bool, PeerError>;
}
