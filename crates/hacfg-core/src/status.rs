//! Checks of resource state against the running cluster.

use crate::error::{CoreError, Result};
use crate::ports::ClusterStatus;
use crate::report::{ReportItem, ReportKind};

/// Expected state of a resource after a change settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedState {
    /// Resource id.
    pub resource_id: String,
    /// Whether it should run somewhere.
    pub running: bool,
}

impl ExpectedState {
    /// Resource expected to run.
    pub fn running(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            running: true,
        }
    }

    /// Resource expected to be stopped.
    pub fn stopped(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            running: false,
        }
    }
}

/// Compares `expected` with `status`.
///
/// A match yields an info item describing the state; a mismatch is
/// [`CoreError::StateCheckFailed`] carrying the failed check as a report.
pub fn ensure_resource_state(status: &ClusterStatus, expected: &ExpectedState) -> Result<ReportItem> {
    let nodes = status.running_on(&expected.resource_id);
    let running = !nodes.is_empty();
    if running == expected.running {
        let kind = if running {
            ReportKind::ResourceRunningOnNodes {
                resource_id: expected.resource_id.clone(),
                nodes,
            }
        } else {
            ReportKind::ResourceDoesNotRun {
                resource_id: expected.resource_id.clone(),
            }
        };
        return Ok(ReportItem::info(kind));
    }
    Err(CoreError::StateCheckFailed {
        resource_id: expected.resource_id.clone(),
        expected_running: expected.running,
    })
}

/// Report item describing a failed check, for callers rendering
/// [`CoreError::StateCheckFailed`].
pub fn state_check_failed_report(status: &ClusterStatus, expected: &ExpectedState) -> ReportItem {
    ReportItem::error(ReportKind::ResourceStateCheckFailed {
        resource_id: expected.resource_id.clone(),
        expected_running: expected.running,
        running_on: status.running_on(&expected.resource_id),
    })
}
