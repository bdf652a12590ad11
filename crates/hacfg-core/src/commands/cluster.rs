//! Cluster-wide configuration commands.

use crate::env::Environment;
use crate::error::{CoreError, Result};
use crate::report::{ReportItem, ReportKind, ReportList};
use tracing::info;

/// Pushes a cluster configuration to every node.
///
/// With `need_stopped_cluster` each node must confirm its daemons are
/// stopped before anything is sent; that check ignores the offline-node
/// skip. Offline environments keep the configuration in memory.
pub async fn push_cluster_conf(
    env: &mut Environment,
    cluster_conf: &str,
    need_stopped_cluster: bool,
) -> Result<ReportList> {
    if cluster_conf.trim().is_empty() {
        return Err(CoreError::report(ReportItem::error(
            ReportKind::RequiredOptionIsMissing {
                option_names: vec!["cluster configuration".to_string()],
                option_type: String::new(),
            },
        )));
    }
    let reports = env.push_cluster_conf(cluster_conf, need_stopped_cluster).await?;
    info!(live = env.is_live(), "cluster configuration pushed");
    Ok(reports)
}
