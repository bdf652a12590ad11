//! Structured diagnostics produced by validation, grouping and mutation.
//!
//! Nothing in the core renders human text. Every problem is a [`ReportItem`]
//! carrying a severity, a machine-readable kind with its payload, and
//! optionally the force code a caller may pass to downgrade it.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the transaction.
    Error,
    /// Advisory; the transaction proceeds.
    Warning,
    /// Notice, e.g. a schema upgrade or a confirmed resource state.
    Info,
}

/// Override flags which turn a forceable error into a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForceCode {
    /// Generic `--force` for unknown or invalid options.
    Force,
    /// Operation names or options not known to the resource agent.
    ForceOperation,
    /// Instance attributes not matching the agent metadata.
    ForceOptions,
    /// Peers that cannot be reached are skipped.
    SkipOfflineNodes,
}

/// Set of force codes granted by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForceFlags {
    codes: Vec<ForceCode>,
}

impl ForceFlags {
    /// Grants `codes`.
    pub fn new<I: IntoIterator<Item = ForceCode>>(codes: I) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    /// Nothing granted.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if `code` was granted. `Force` implies every code except
    /// `SkipOfflineNodes`.
    pub fn is_forced(&self, code: ForceCode) -> bool {
        self.codes.contains(&code)
            || (code != ForceCode::SkipOfflineNodes && self.codes.contains(&ForceCode::Force))
    }
}

/// Machine-readable kind of a diagnostic together with its payload.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "info", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    RequiredOptionIsMissing {
        option_names: Vec<String>,
        option_type: String,
    },
    InvalidOptionValue {
        option_name: String,
        option_value: String,
        allowed_values: Vec<String>,
    },
    MutuallyExclusiveOptions {
        option_names: Vec<String>,
        option_type: String,
    },
    InvalidOptions {
        option_names: Vec<String>,
        allowed: Vec<String>,
        option_type: String,
    },
    InvalidIdIsEmpty {
        id_description: String,
    },
    InvalidIdBadChar {
        id: String,
        id_description: String,
        invalid_character: char,
        is_first_char: bool,
    },
    IdAlreadyExists {
        id: String,
    },
    IdNotFound {
        id: String,
        id_description: String,
        context_type: Option<String>,
        context_id: Option<String>,
    },
    IdBelongsToUnexpectedType {
        id: String,
        expected_types: Vec<String>,
        current_type: String,
    },
    InvalidResourceAgentName {
        name: String,
    },
    AclRoleIsAlreadyAssignedToTarget {
        role_id: String,
        target_id: String,
    },
    AclRoleIsNotAssignedToTarget {
        role_id: String,
        target_id: String,
    },
    AclTargetAlreadyExists {
        target_id: String,
    },
    ResourceCannotBeNextToItselfInGroup {
        resource_id: String,
        group_id: String,
    },
    ResourceAlreadyInBundle {
        bundle_id: String,
        resource_id: String,
    },
    CibLoadErrorBadFormat {
        reason: String,
    },
    CibMissingMandatorySection {
        section_name: String,
    },
    CibUpgradeSuccessful {
        from: String,
        to: String,
    },
    CibPushError {
        reason: String,
    },
    WaitForIdleNotLiveCluster,
    WaitForIdleNotSupported,
    WaitForIdleTimedOut {
        reason: String,
    },
    ResourceRunningOnNodes {
        resource_id: String,
        nodes: Vec<String>,
    },
    ResourceDoesNotRun {
        resource_id: String,
    },
    ResourceStateCheckFailed {
        resource_id: String,
        expected_running: bool,
        running_on: Vec<String>,
    },
    DeprecatedSyntax {
        message: String,
    },
    NodeCommunicationError {
        node: String,
        reason: String,
    },
    NodeCommunicationTimedOut {
        node: String,
    },
    NodeRejectedPayload {
        node: String,
        reason: String,
    },
    NodeSkipped {
        node: String,
        reason: String,
    },
    NodeNotStopped {
        node: String,
    },
    ClusterConfDistributionStarted {
        nodes: Vec<String>,
    },
    ClusterConfAcceptedByNode {
        node: String,
    },
    ClusterStoppedOnAllNodes {
        nodes: Vec<String>,
    },
}

impl ReportKind {
    /// Machine-readable code, identical to the serialized `code` tag.
    pub fn code(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(str::to_string))
            .unwrap_or_default()
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    /// Error, warning or info.
    pub severity: Severity,
    /// What happened, with its payload.
    #[serde(flatten)]
    pub kind: ReportKind,
    /// Flag which would downgrade this error to a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_code: Option<ForceCode>,
}

impl ReportItem {
    /// Creates a non-forceable error.
    pub fn error(kind: ReportKind) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            force_code: None,
        }
    }

    /// Creates an error which `force_code` would turn into a warning.
    pub fn forceable_error(kind: ReportKind, force_code: ForceCode) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            force_code: Some(force_code),
        }
    }

    /// Creates a warning.
    pub fn warning(kind: ReportKind) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            force_code: None,
        }
    }

    /// Creates an info notice.
    pub fn info(kind: ReportKind) -> Self {
        Self {
            severity: Severity::Info,
            kind,
            force_code: None,
        }
    }

    /// Picks the severity of a forceable problem.
    ///
    /// Without a force code the item is a plain error. With one, it is a
    /// forceable error unless `forced` is set, in which case it is a warning.
    pub fn forceable(kind: ReportKind, force_code: Option<ForceCode>, forced: bool) -> Self {
        match force_code {
            None => Self::error(kind),
            Some(_) if forced => Self::warning(kind),
            Some(code) => Self::forceable_error(kind, code),
        }
    }

    /// Returns true for error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportList {
    items: Vec<ReportItem>,
}

impl ReportList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one item.
    pub fn push(&mut self, item: ReportItem) {
        self.items.push(item);
    }

    /// Appends every item of `items`.
    pub fn extend<I: IntoIterator<Item = ReportItem>>(&mut self, items: I) {
        self.items.extend(items);
    }

    /// Returns true if any item is an error.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(ReportItem::is_error)
    }

    /// Number of error items.
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_error()).count()
    }

    /// Error items only.
    pub fn errors(&self) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(|i| i.is_error())
    }

    /// All items.
    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Consumes the list.
    pub fn into_items(self) -> Vec<ReportItem> {
        self.items
    }
}

impl From<Vec<ReportItem>> for ReportList {
    fn from(items: Vec<ReportItem>) -> Self {
        Self { items }
    }
}

impl From<ReportItem> for ReportList {
    fn from(item: ReportItem) -> Self {
        Self { items: vec![item] }
    }
}

impl IntoIterator for ReportList {
    type Item = ReportItem;
    type IntoIter = std::vec::IntoIter<ReportItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReportList {
    type Item = &'a ReportItem;
    type IntoIter = std::slice::Iter<'a, ReportItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Sink for diagnostics. Rendering is up to the implementor.
pub trait Reporter: Send + Sync {
    /// Receives one item.
    fn emit(&self, item: &ReportItem);
}

/// Reporter which drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn emit(&self, _item: &ReportItem) {}
}

/// Reporter which keeps every item in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    items: Arc<Mutex<Vec<ReportItem>>>,
}

impl RecordingReporter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn items(&self) -> Vec<ReportItem> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Codes of everything emitted so far, in order.
    pub fn codes(&self) -> Vec<String> {
        self.items().iter().map(|i| i.kind.code()).collect()
    }
}

impl Reporter for RecordingReporter {
    fn emit(&self, item: &ReportItem) {
        if let Ok(mut items) = self.items.lock() {
            items.push(item.clone());
        }
    }
}

/// Forwards items to a [`Reporter`] and remembers whether errors passed.
#[derive(Clone)]
pub struct ReportProcessor {
    sink: Arc<dyn Reporter>,
    has_errors: bool,
}

impl ReportProcessor {
    /// Wraps a sink.
    pub fn new(sink: Arc<dyn Reporter>) -> Self {
        Self {
            sink,
            has_errors: false,
        }
    }

    /// Emits one item.
    pub fn report(&mut self, item: ReportItem) -> &mut Self {
        if item.is_error() {
            self.has_errors = true;
        }
        self.sink.emit(&item);
        self
    }

    /// Emits every item of `list`.
    pub fn report_list<'a, I>(&mut self, list: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a ReportItem>,
    {
        for item in list {
            self.report(item.clone());
        }
        self
    }

    /// Returns true once any error was emitted.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }
}

impl std::fmt::Debug for ReportProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportProcessor")
            .field("has_errors", &self.has_errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forceable_without_code_is_error() {
        let item = ReportItem::forceable(ReportKind::WaitForIdleNotLiveCluster, None, true);
        assert_eq!(item.severity, Severity::Error);
        assert!(item.force_code.is_none());
    }

    #[test]
    fn test_forceable_with_code_not_forced() {
        let item = ReportItem::forceable(
            ReportKind::WaitForIdleNotLiveCluster,
            Some(ForceCode::Force),
            false,
        );
        assert_eq!(item.severity, Severity::Error);
        assert_eq!(item.force_code, Some(ForceCode::Force));
    }

    #[test]
    fn test_forceable_with_code_forced_is_warning() {
        let item = ReportItem::forceable(
            ReportKind::WaitForIdleNotLiveCluster,
            Some(ForceCode::Force),
            true,
        );
        assert_eq!(item.severity, Severity::Warning);
    }

    #[test]
    fn test_code_matches_serialized_tag() {
        let kind = ReportKind::IdAlreadyExists { id: "a".to_string() };
        assert_eq!(kind.code(), "ID_ALREADY_EXISTS");
        assert_eq!(ReportKind::WaitForIdleNotLiveCluster.code(), "WAIT_FOR_IDLE_NOT_LIVE_CLUSTER");
    }

    #[test]
    fn test_item_serializes_flat() {
        let item = ReportItem::error(ReportKind::IdAlreadyExists { id: "a".to_string() });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["code"], "ID_ALREADY_EXISTS");
        assert_eq!(json["info"]["id"], "a");
        assert!(json.get("force_code").is_none());
    }

    #[test]
    fn test_force_flags() {
        let flags = ForceFlags::new([ForceCode::Force]);
        assert!(flags.is_forced(ForceCode::ForceOptions));
        assert!(!flags.is_forced(ForceCode::SkipOfflineNodes));
        assert!(!ForceFlags::none().is_forced(ForceCode::Force));
        assert!(ForceFlags::new([ForceCode::SkipOfflineNodes]).is_forced(ForceCode::SkipOfflineNodes));
    }

    #[test]
    fn test_report_list_counts_errors() {
        let mut list = ReportList::new();
        list.push(ReportItem::warning(ReportKind::DeprecatedSyntax {
            message: "x".to_string(),
        }));
        assert!(!list.has_errors());
        list.push(ReportItem::error(ReportKind::WaitForIdleNotSupported));
        assert!(list.has_errors());
        assert_eq!(list.error_count(), 1);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_processor_tracks_errors_and_forwards() {
        let recorder = RecordingReporter::new();
        let mut processor = ReportProcessor::new(Arc::new(recorder.clone()));
        processor.report(ReportItem::info(ReportKind::WaitForIdleNotSupported));
        assert!(!processor.has_errors());
        processor.report(ReportItem::error(ReportKind::WaitForIdleNotLiveCluster));
        assert!(processor.has_errors());
        assert_eq!(
            recorder.codes(),
            vec!["WAIT_FOR_IDLE_NOT_SUPPORTED", "WAIT_FOR_IDLE_NOT_LIVE_CLUSTER"]
        );
    }
}
