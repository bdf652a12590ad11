//! Error types for the configuration core.

use crate::args::CmdLineInputError;
use crate::ports::PortError;
use crate::report::{ReportItem, ReportList};
use std::time::Duration;
use thiserror::Error;

/// Errors that can abort one command.
///
/// Nothing here is fatal to the process. A failed transaction drops its
/// snapshot and leaves the stored document untouched.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed option grouping; raised before any validation.
    #[error(transparent)]
    CmdLine(#[from] CmdLineInputError),

    /// Aggregate failure carrying every collected diagnostic.
    #[error("{} error(s) reported", .0.error_count())]
    Reports(ReportList),

    /// The cluster did not become idle in time.
    #[error("waiting for the cluster to settle timed out after {timeout:?}")]
    WaitTimedOut {
        /// Timeout that elapsed, `None` when waiting forever was interrupted.
        timeout: Option<Duration>,
    },

    /// The cluster settled but a resource is not in the expected state.
    #[error("resource '{resource_id}' state check failed: expected running={expected_running}")]
    StateCheckFailed {
        /// Checked resource.
        resource_id: String,
        /// Whether the resource was expected to run.
        expected_running: bool,
    },

    /// A collaborator port failed.
    #[error("port error: {0}")]
    Port(#[from] PortError),

    /// Document (de)serialization error.
    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Wraps a single report item.
    pub fn report(item: ReportItem) -> Self {
        Self::Reports(ReportList::from(item))
    }

    /// Reports carried by this error, empty for other variants.
    pub fn reports(&self) -> &[ReportItem] {
        match self {
            Self::Reports(list) => list.items(),
            _ => &[],
        }
    }
}

impl From<ReportItem> for CoreError {
    fn from(item: ReportItem) -> Self {
        Self::report(item)
    }
}

/// Checkpoint of a validation step.
///
/// When `items` holds an error the whole list becomes the failure;
/// otherwise the items are moved to `sink`.
pub fn checkpoint(items: ReportList, sink: &mut ReportList) -> Result<()> {
    if items.has_errors() {
        return Err(CoreError::Reports(items));
    }
    sink.extend(items);
    Ok(())
}

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, CoreError>;
