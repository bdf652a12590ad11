//! Environment and transactions.
//!
//! An [`Environment`] knows where the document lives (a live cluster behind
//! ports, or an in-memory offline copy) and how a command wants to wait.
//! A [`Transaction`] runs one command against it:
//! `Start -> Snapshot -> Mutate -> Validate -> (Rejected | Push) ->
//! WaitForIdle -> Committed`.

use crate::cib::document::{Document, SchemaVersion};
use crate::cib::ids::IdProvider;
use crate::error::{CoreError, Result};
use crate::fanout::{FanoutStatus, PeerFanout};
use crate::ports::{
    ClusterStatus, ClusterStatusReader, DocumentStore, IdleWaiter, PeerTransport, PortError,
    WaitError,
};
use crate::report::{ReportItem, ReportKind, ReportList, ReportProcessor, Reporter};
use crate::status::{ensure_resource_state, state_check_failed_report, ExpectedState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout of one peer request.
pub const DEFAULT_PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a command waits for the cluster to settle after a push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Do not wait.
    #[default]
    Disabled,
    /// Wait without a limit.
    Forever,
    /// Wait at most this long.
    Timeout(Duration),
}

impl WaitPolicy {
    /// Policy from an optional `--wait` value: absent disables waiting,
    /// zero waits forever.
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            None => WaitPolicy::Disabled,
            Some(0) => WaitPolicy::Forever,
            Some(secs) => WaitPolicy::Timeout(Duration::from_secs(secs)),
        }
    }

    /// Returns true unless waiting is disabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, WaitPolicy::Disabled)
    }

    /// Timeout passed to the idle waiter.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            WaitPolicy::Timeout(timeout) => Some(*timeout),
            _ => None,
        }
    }
}

/// Options of one environment.
#[derive(Debug, Clone)]
pub struct EnvOptions {
    /// Wait policy of transactions which may wait.
    pub wait: WaitPolicy,
    /// Tolerate unreachable peers during a fan-out.
    pub skip_offline_nodes: bool,
    /// Timeout of one peer request.
    pub peer_request_timeout: Duration,
    /// User on whose behalf the commands run.
    pub user: Option<String>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::Disabled,
            skip_offline_nodes: false,
            peer_request_timeout: DEFAULT_PEER_REQUEST_TIMEOUT,
            user: None,
        }
    }
}

/// Ports of a live cluster.
#[derive(Clone)]
pub struct LiveCluster {
    store: Arc<dyn DocumentStore>,
    status_reader: Option<Arc<dyn ClusterStatusReader>>,
    idle_waiter: Option<Arc<dyn IdleWaiter>>,
    transport: Option<Arc<dyn PeerTransport>>,
    nodes: Vec<String>,
}

impl LiveCluster {
    /// Live cluster backed by `store` only.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            status_reader: None,
            idle_waiter: None,
            transport: None,
            nodes: Vec::new(),
        }
    }

    /// Adds a status reader.
    pub fn with_status_reader(mut self, reader: Arc<dyn ClusterStatusReader>) -> Self {
        self.status_reader = Some(reader);
        self
    }

    /// Adds an idle waiter.
    pub fn with_idle_waiter(mut self, waiter: Arc<dyn IdleWaiter>) -> Self {
        self.idle_waiter = Some(waiter);
        self
    }

    /// Adds the cluster nodes and the transport reaching them.
    pub fn with_peers(mut self, nodes: Vec<String>, transport: Arc<dyn PeerTransport>) -> Self {
        self.nodes = nodes;
        self.transport = Some(transport);
        self
    }
}

enum Target {
    Live(LiveCluster),
    Offline {
        document: String,
        cluster_conf: Option<String>,
    },
}

/// Where commands read and push the document.
pub struct Environment {
    target: Target,
    options: EnvOptions,
    reporter: ReportProcessor,
    upgrade_reported: bool,
}

impl Environment {
    /// Environment pushing to a live cluster.
    pub fn live(cluster: LiveCluster, options: EnvOptions, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            target: Target::Live(cluster),
            options,
            reporter: ReportProcessor::new(reporter),
            upgrade_reported: false,
        }
    }

    /// Environment working on a serialized document in memory.
    pub fn offline(document: String, options: EnvOptions, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            target: Target::Offline {
                document,
                cluster_conf: None,
            },
            options,
            reporter: ReportProcessor::new(reporter),
            upgrade_reported: false,
        }
    }

    /// Returns true for a live cluster.
    pub fn is_live(&self) -> bool {
        matches!(self.target, Target::Live(_))
    }

    /// Options.
    pub fn options(&self) -> &EnvOptions {
        &self.options
    }

    /// Report sink.
    pub fn report_processor(&mut self) -> &mut ReportProcessor {
        &mut self.reporter
    }

    /// The offline document, `None` for a live cluster.
    pub fn offline_document(&self) -> Option<&str> {
        match &self.target {
            Target::Offline { document, .. } => Some(document),
            Target::Live(_) => None,
        }
    }

    /// The cluster configuration stored offline, if any was pushed.
    pub fn offline_cluster_conf(&self) -> Option<&str> {
        match &self.target {
            Target::Offline { cluster_conf, .. } => cluster_conf.as_deref(),
            Target::Live(_) => None,
        }
    }

    /// Checks that the wait policy can be honoured before anything changes.
    pub fn ensure_wait_satisfiable(&self) -> Result<()> {
        if !self.options.wait.is_enabled() {
            return Ok(());
        }
        match &self.target {
            Target::Offline { .. } => Err(CoreError::report(ReportItem::error(
                ReportKind::WaitForIdleNotLiveCluster,
            ))),
            Target::Live(cluster) if cluster.idle_waiter.is_none() => Err(CoreError::report(
                ReportItem::error(ReportKind::WaitForIdleNotSupported),
            )),
            Target::Live(_) => Ok(()),
        }
    }

    /// Reads and parses the document.
    ///
    /// With `minimal_version` an older document is upgraded in memory to
    /// the newest known schema; only the first upgrade is reported.
    pub async fn get_document(&mut self, minimal_version: Option<SchemaVersion>) -> Result<Document> {
        let text = match &self.target {
            Target::Live(cluster) => cluster.store.read().await?,
            Target::Offline { document, .. } => document.clone(),
        };
        let mut doc = Document::from_text(&text)?;
        if let Some(minimal) = minimal_version {
            let current = doc.schema_version()?;
            if current < minimal && doc.upgrade_to(SchemaVersion::LATEST)? {
                debug!(from = %current, to = %SchemaVersion::LATEST, "upgraded document");
                if !self.upgrade_reported {
                    self.upgrade_reported = true;
                    self.reporter.report(ReportItem::info(ReportKind::CibUpgradeSuccessful {
                        from: current.to_string(),
                        to: SchemaVersion::LATEST.to_string(),
                    }));
                }
            }
        }
        Ok(doc)
    }

    /// Pushes the document; a refused write is a CIB_PUSH_ERROR report.
    pub async fn push_document(&mut self, doc: &Document) -> Result<()> {
        let text = doc.to_text()?;
        match &mut self.target {
            Target::Live(cluster) => {
                cluster.store.write(&text).await.map_err(|e| {
                    CoreError::report(ReportItem::error(ReportKind::CibPushError {
                        reason: e.to_string(),
                    }))
                })?;
                info!(bytes = text.len(), "pushed document to the cluster");
            }
            Target::Offline { document, .. } => {
                *document = text;
                debug!("stored document offline");
            }
        }
        Ok(())
    }

    /// Waits for the cluster to settle according to the wait policy.
    pub async fn wait_for_idle(&self) -> Result<()> {
        let timeout = self.options.wait.timeout();
        let Target::Live(cluster) = &self.target else {
            return Err(CoreError::report(ReportItem::error(
                ReportKind::WaitForIdleNotLiveCluster,
            )));
        };
        let Some(waiter) = &cluster.idle_waiter else {
            return Err(CoreError::report(ReportItem::error(
                ReportKind::WaitForIdleNotSupported,
            )));
        };
        match waiter.wait(timeout).await {
            Ok(()) => Ok(()),
            Err(WaitError::Timeout(_)) => Err(CoreError::WaitTimedOut { timeout }),
            Err(WaitError::Other(reason)) => Err(CoreError::Port(PortError::Unavailable(reason))),
        }
    }

    /// Reads the cluster status.
    pub async fn read_status(&self) -> Result<ClusterStatus> {
        match &self.target {
            Target::Live(LiveCluster {
                status_reader: Some(reader),
                ..
            }) => Ok(reader.read_status().await?),
            _ => Err(CoreError::Port(PortError::Unavailable(
                "cluster status is not available".to_string(),
            ))),
        }
    }

    /// Distributes a cluster configuration to every node.
    ///
    /// With `need_stopped_cluster` every node must first confirm its
    /// daemons are stopped. Offline the configuration is kept in memory.
    pub async fn push_cluster_conf(
        &mut self,
        cluster_conf: &str,
        need_stopped_cluster: bool,
    ) -> Result<ReportList> {
        let (nodes, transport) = match &mut self.target {
            Target::Offline {
                cluster_conf: stored,
                ..
            } => {
                *stored = Some(cluster_conf.to_string());
                return Ok(ReportList::new());
            }
            Target::Live(cluster) => match &cluster.transport {
                Some(transport) => (cluster.nodes.clone(), Arc::clone(transport)),
                None => {
                    return Err(CoreError::Port(PortError::Unavailable(
                        "no peer transport configured".to_string(),
                    )))
                }
            },
        };
        let fanout = PeerFanout::new(transport, self.options.peer_request_timeout);
        let mut reports = ReportList::new();
        if need_stopped_cluster {
            let summary = fanout.check_stopped(&nodes).await;
            if summary.status == FanoutStatus::Failed {
                return Err(CoreError::Reports(summary.reports));
            }
            reports.extend(summary.reports);
        }
        let summary = fanout
            .distribute(&nodes, cluster_conf, self.options.skip_offline_nodes)
            .await;
        if summary.status == FanoutStatus::Failed {
            return Err(CoreError::Reports(summary.reports));
        }
        reports.extend(summary.reports);
        self.reporter.report_list(reports.items());
        Ok(reports)
    }

    /// Starts a transaction honouring the wait policy.
    pub async fn transaction(&mut self, minimal_version: Option<SchemaVersion>) -> Result<Transaction<'_>> {
        Transaction::begin(self, minimal_version, true).await
    }

    /// Starts a transaction which never waits for the cluster.
    pub async fn transaction_no_wait(
        &mut self,
        minimal_version: Option<SchemaVersion>,
    ) -> Result<Transaction<'_>> {
        Transaction::begin(self, minimal_version, false).await
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("live", &self.is_live())
            .field("options", &self.options)
            .finish()
    }
}

/// Phase of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing read yet.
    Start,
    /// The document was read.
    Snapshot,
    /// At least one mutation was applied.
    Mutate,
    /// Collected diagnostics are being checked.
    Validate,
    /// Failed; nothing will be pushed.
    Rejected,
    /// The document is being pushed.
    Push,
    /// Waiting for the cluster to settle.
    WaitForIdle,
    /// Done.
    Committed,
}

/// One command's read-mutate-validate-push-verify cycle.
pub struct Transaction<'env> {
    env: &'env mut Environment,
    phase: Phase,
    document: Document,
    reports: ReportList,
    provider: IdProvider,
    expected: Vec<ExpectedState>,
    wait: bool,
}

impl<'env> Transaction<'env> {
    async fn begin(
        env: &'env mut Environment,
        minimal_version: Option<SchemaVersion>,
        wait: bool,
    ) -> Result<Transaction<'env>> {
        debug!(phase = ?Phase::Start, "transaction");
        if wait {
            env.ensure_wait_satisfiable()?;
        }
        let document = env.get_document(minimal_version).await?;
        debug!(phase = ?Phase::Snapshot, "transaction");
        Ok(Self {
            env,
            phase: Phase::Snapshot,
            document,
            reports: ReportList::new(),
            provider: IdProvider::new(),
            expected: Vec::new(),
            wait,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The snapshot being mutated.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Diagnostics collected so far.
    pub fn reports(&self) -> &ReportList {
        &self.reports
    }

    /// Applies `mutation` to the snapshot.
    ///
    /// Warnings pushed by the mutation are kept. A failure rejects the
    /// transaction; a report failure then carries every diagnostic of the
    /// transaction.
    pub fn mutate<F, T>(&mut self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut Document, &mut IdProvider, &mut ReportList) -> Result<T>,
    {
        if self.phase == Phase::Rejected {
            return Err(CoreError::Reports(self.reports.clone()));
        }
        let mut reports = ReportList::new();
        let outcome = mutation(&mut self.document, &mut self.provider, &mut reports);
        self.reports.extend(reports);
        match outcome {
            Ok(value) => {
                self.phase = Phase::Mutate;
                Ok(value)
            }
            Err(CoreError::Reports(failure)) => {
                self.phase = Phase::Rejected;
                self.reports.extend(failure);
                Err(CoreError::Reports(self.reports.clone()))
            }
            Err(other) => {
                self.phase = Phase::Rejected;
                Err(other)
            }
        }
    }

    /// Adds a resource state checked after the cluster settled.
    pub fn expect_state(&mut self, expected: ExpectedState) {
        self.expected.push(expected);
    }

    fn reject(&mut self) -> CoreError {
        self.phase = Phase::Rejected;
        debug!(errors = self.reports.error_count(), "transaction rejected");
        CoreError::Reports(self.reports.clone())
    }

    /// Validates, pushes and, when the policy says so, waits and verifies.
    ///
    /// Returns the diagnostics of the transaction; they are also emitted to
    /// the environment's reporter.
    pub async fn commit(mut self) -> Result<ReportList> {
        if self.phase == Phase::Rejected {
            return Err(CoreError::Reports(self.reports));
        }
        self.phase = Phase::Validate;
        if self.reports.has_errors() {
            return Err(self.reject());
        }

        self.phase = Phase::Push;
        if let Err(e) = self.env.push_document(&self.document).await {
            self.phase = Phase::Rejected;
            return Err(e);
        }

        if self.wait && self.env.options.wait.is_enabled() {
            self.phase = Phase::WaitForIdle;
            if let Err(e) = self.env.wait_for_idle().await {
                // The document is already pushed; its diagnostics still apply.
                self.env.reporter.report_list(self.reports.items());
                return Err(e);
            }
            if !self.expected.is_empty() {
                let status = match self.env.read_status().await {
                    Ok(status) => status,
                    Err(e) => {
                        self.env.reporter.report_list(self.reports.items());
                        return Err(e);
                    }
                };
                for expected in &self.expected {
                    match ensure_resource_state(&status, expected) {
                        Ok(item) => self.reports.push(item),
                        Err(e) => {
                            self.env
                                .reporter
                                .report(state_check_failed_report(&status, expected));
                            return Err(e);
                        }
                    }
                }
            }
        }

        self.phase = Phase::Committed;
        self.env.reporter.report_list(self.reports.items());
        debug!(reports = self.reports.len(), "transaction committed");
        Ok(self.reports)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("phase", &self.phase)
            .field("reports", &self.reports.len())
            .field("wait", &self.wait)
            .finish()
    }
}
