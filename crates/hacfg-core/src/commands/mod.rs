//! Library commands. Each command runs in one [`crate::env::Transaction`].

pub mod acl;
pub mod cluster;
pub mod resource;
pub mod stonith;

use crate::cib::document::{Document, NodeId};
use crate::error::{checkpoint, CoreError, Result};
use crate::report::ReportList;

/// Resolves every id with `find`, failing with all lookup errors at once.
pub(crate) fn find_all<F>(
    doc: &Document,
    ids: &[String],
    find: F,
    reports: &mut ReportList,
) -> Result<Vec<NodeId>>
where
    F: Fn(&Document, &str) -> Result<NodeId>,
{
    let mut found = ReportList::new();
    let mut elements = Vec::with_capacity(ids.len());
    for id in ids {
        match find(doc, id) {
            Ok(element) => elements.push(element),
            Err(CoreError::Reports(list)) => found.extend(list),
            Err(other) => return Err(other),
        }
    }
    checkpoint(found, reports)?;
    Ok(elements)
}
