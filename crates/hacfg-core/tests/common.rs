//! Common test utilities and fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hacfg_core::env::{EnvOptions, Environment, LiveCluster};
use hacfg_core::ports::{
    ClusterStatus, ClusterStatusReader, DocumentStore, IdleWaiter, PeerError, PeerResponse,
    PeerTransport, PortError, ResourceStatus, WaitError,
};
use hacfg_core::report::RecordingReporter;
use hacfg_core::{Document, SchemaVersion};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Serialized empty document at `version`.
pub fn empty_document(version: SchemaVersion) -> String {
    Document::new(version).to_text().unwrap()
}

/// Document store kept in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    document: Arc<RwLock<String>>,
    writes: Arc<RwLock<usize>>,
    conflict: Arc<RwLock<bool>>,
}

impl MemoryStore {
    pub fn new(document: String) -> Self {
        Self {
            document: Arc::new(RwLock::new(document)),
            ..Self::default()
        }
    }

    pub async fn document(&self) -> Document {
        Document::from_text(&self.document.read().await).unwrap()
    }

    pub async fn text(&self) -> String {
        self.document.read().await.clone()
    }

    pub async fn writes(&self) -> usize {
        *self.writes.read().await
    }

    /// Makes every following write fail as if the document changed.
    pub async fn fail_writes(&self) {
        *self.conflict.write().await = true;
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self) -> Result<String, PortError> {
        Ok(self.document.read().await.clone())
    }

    async fn write(&self, document: &str) -> Result<(), PortError> {
        if *self.conflict.read().await {
            return Err(PortError::Conflict("document changed since it was read".to_string()));
        }
        *self.document.write().await = document.to_string();
        *self.writes.write().await += 1;
        Ok(())
    }
}

/// Status reader returning whatever was set last.
#[derive(Clone, Default)]
pub struct StaticStatus {
    status: Arc<RwLock<ClusterStatus>>,
}

impl StaticStatus {
    pub async fn set_running(&self, resource_id: &str, nodes: &[&str]) {
        let mut status = self.status.write().await;
        status.resources.retain(|r| r.id != resource_id);
        status.resources.push(ResourceStatus {
            id: resource_id.to_string(),
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
        });
    }
}

#[async_trait]
impl ClusterStatusReader for StaticStatus {
    async fn read_status(&self) -> Result<ClusterStatus, PortError> {
        Ok(self.status.read().await.clone())
    }
}

/// Idle waiter which settles at once or always times out.
#[derive(Clone, Default)]
pub struct TestWaiter {
    pub times_out: bool,
}

#[async_trait]
impl IdleWaiter for TestWaiter {
    async fn wait(&self, _timeout: Option<Duration>) -> Result<(), WaitError> {
        if self.times_out {
            Err(WaitError::Timeout("transition still in progress".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Transport to simulated peers.
#[derive(Clone, Default)]
pub struct MockTransport {
    pub unreachable: HashSet<String>,
    pub rejecting: HashSet<String>,
    pub running: HashSet<String>,
    pub slow: HashSet<String>,
    pub delay: Option<Duration>,
    received: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(mut self, peer: &str) -> Self {
        self.unreachable.insert(peer.to_string());
        self
    }

    pub fn rejecting(mut self, peer: &str) -> Self {
        self.rejecting.insert(peer.to_string());
        self
    }

    pub fn running(mut self, peer: &str) -> Self {
        self.running.insert(peer.to_string());
        self
    }

    pub fn slow(mut self, peer: &str) -> Self {
        self.slow.insert(peer.to_string());
        self
    }

    /// Makes every peer answer after `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Peers which received a payload, in arrival order.
    pub async fn receivers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .received
            .read()
            .await
            .iter()
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        peers
    }

    async fn answer(&self, peer: &str) -> Result<(), PeerError> {
        if self.slow.contains(peer) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.contains(peer) {
            return Err(PeerError::Unreachable(format!("{}: connection refused", peer)));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn send(&self, peer: &str, payload: &str) -> Result<PeerResponse, PeerError> {
        self.answer(peer).await?;
        if self.rejecting.contains(peer) {
            return Err(PeerError::Rejected("invalid configuration".to_string()));
        }
        self.received
            .write()
            .await
            .push((peer.to_string(), payload.to_string()));
        Ok(PeerResponse {
            message: "accepted".to_string(),
        })
    }

    async fn check_stopped(&self, peer: &str) -> Result<bool, PeerError> {
        self.answer(peer).await?;
        Ok(!self.running.contains(peer))
    }
}

/// A live environment together with its fakes.
pub struct LiveFixture {
    pub store: MemoryStore,
    pub status: StaticStatus,
    pub reporter: RecordingReporter,
}

impl LiveFixture {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            store: MemoryStore::new(empty_document(version)),
            status: StaticStatus::default(),
            reporter: RecordingReporter::new(),
        }
    }

    /// Environment over the fixture with an idle waiter.
    pub fn env(&self, options: EnvOptions, waiter: TestWaiter) -> Environment {
        let cluster = LiveCluster::new(Arc::new(self.store.clone()))
            .with_status_reader(Arc::new(self.status.clone()))
            .with_idle_waiter(Arc::new(waiter));
        Environment::live(cluster, options, Arc::new(self.reporter.clone()))
    }

    /// Environment over the fixture with peers reached through `transport`.
    pub fn env_with_peers(
        &self,
        options: EnvOptions,
        peers: &[&str],
        transport: MockTransport,
    ) -> Environment {
        let cluster = LiveCluster::new(Arc::new(self.store.clone())).with_peers(
            peers.iter().map(|p| p.to_string()).collect(),
            Arc::new(transport),
        );
        Environment::live(cluster, options, Arc::new(self.reporter.clone()))
    }
}

/// Offline environment over an empty document.
pub fn offline_env(version: SchemaVersion, reporter: &RecordingReporter) -> Environment {
    Environment::offline(
        empty_document(version),
        EnvOptions::default(),
        Arc::new(reporter.clone()),
    )
}
