//! Reporter writing diagnostics to the tracing subscriber.

use hacfg_core::{CoreError, ReportItem, Reporter, Severity};
use tracing::{error, info, warn};

/// Logs each item's code and JSON payload at the level of its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    /// Creates the reporter.
    pub fn new() -> Self {
        Self
    }

    /// Emits the items carried by a failed command, or its message when it
    /// carries none.
    pub fn report_failure(&self, err: &CoreError) {
        if err.reports().is_empty() {
            error!(error = %err, "command failed");
        }
        for item in err.reports() {
            self.emit(item);
        }
    }
}

impl Reporter for TracingReporter {
    fn emit(&self, item: &ReportItem) {
        let code = item.kind.code();
        let payload = serde_json::to_string(&item.kind).unwrap_or_default();
        match item.severity {
            Severity::Error => match item.force_code {
                Some(force) => error!(%code, %payload, ?force, "error, use --force to override"),
                None => error!(%code, %payload, "error"),
            },
            Severity::Warning => warn!(%code, %payload, "warning"),
            Severity::Info => info!(%code, %payload, "info"),
        }
    }
}
