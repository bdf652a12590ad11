//! Groups: ordered lists of primitives started in sequence.

use crate::cib::document::{Document, NodeId, Tag};
use crate::cib::ids::{find_element_by_id, validate_id};
use crate::error::{CoreError, Result};
use crate::report::{ReportItem, ReportKind};
use tracing::debug;

/// Returns group `group_id`, creating it at the end of `resources` when it
/// does not exist. An id owned by something else than a group is an error.
pub fn provide_group(doc: &mut Document, resources: NodeId, group_id: &str) -> Result<NodeId> {
    if let Some(existing) = find_element_by_id(doc, group_id) {
        if doc.is(existing, &Tag::Group) {
            return Ok(existing);
        }
        return Err(CoreError::report(ReportItem::error(
            ReportKind::IdBelongsToUnexpectedType {
                id: group_id.to_string(),
                expected_types: vec![Tag::Group.as_str().to_string()],
                current_type: doc.tag(existing).map(|t| t.as_str().to_string()).unwrap_or_default(),
            },
        )));
    }
    validate_id(group_id, "group name")?;
    debug!(group_id, "creating group");
    Ok(doc.append_new_with_id(resources, Tag::Group, group_id))
}

/// Puts `primitive` into `group`.
///
/// Without `adjacent_id` the primitive goes to the end. Otherwise it goes
/// before the adjacent resource, or after it when `put_after_adjacent`.
pub fn place_resource(
    doc: &mut Document,
    group: NodeId,
    primitive: NodeId,
    adjacent_id: Option<&str>,
    put_after_adjacent: bool,
) -> Result<()> {
    let Some(adjacent_id) = adjacent_id else {
        doc.append_child(group, primitive);
        return Ok(());
    };
    let group_id = doc.id_of(group).to_string();
    if adjacent_id == doc.id_of(primitive) {
        return Err(CoreError::report(ReportItem::error(
            ReportKind::ResourceCannotBeNextToItselfInGroup {
                resource_id: adjacent_id.to_string(),
                group_id,
            },
        )));
    }
    let adjacent = doc
        .children_by_tag(group, &Tag::Primitive)
        .into_iter()
        .find(|c| doc.id_of(*c) == adjacent_id);
    let Some(adjacent) = adjacent else {
        return Err(CoreError::report(ReportItem::error(ReportKind::IdNotFound {
            id: adjacent_id.to_string(),
            id_description: "resource".to_string(),
            context_type: Some("group".to_string()),
            context_id: Some(group_id),
        })));
    };
    doc.detach(primitive);
    let index = doc.index_in_parent(adjacent).unwrap_or(0);
    let index = if put_after_adjacent { index + 1 } else { index };
    doc.insert_child(group, index, primitive);
    Ok(())
}

/// Primitives of `group` in start order.
pub fn get_inner_resources(doc: &Document, group: NodeId) -> Vec<NodeId> {
    doc.children_by_tag(group, &Tag::Primitive)
}
