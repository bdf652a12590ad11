//! Resource mutation: primitives, groups, clones and bundles.

pub mod agent;
pub mod bundle;
pub mod clone;
pub mod common;
pub mod group;
pub mod primitive;

use crate::cib::acl::remove_permissions_referencing;
use crate::cib::document::{Document, NodeId, Tag};
use crate::cib::ids::get_element_by_id;
use crate::error::Result;
use tracing::debug;

const RESOURCE_TAGS: [Tag; 5] = [Tag::Primitive, Tag::Group, Tag::Clone, Tag::Master, Tag::Bundle];

/// Finds a resource of any kind by id.
pub fn find_resource(doc: &Document, resource_id: &str) -> Result<NodeId> {
    Ok(get_element_by_id(doc, resource_id, &RESOURCE_TAGS, "resource")?)
}

/// Finds a primitive by id.
pub fn find_primitive(doc: &Document, resource_id: &str) -> Result<NodeId> {
    Ok(get_element_by_id(doc, resource_id, &[Tag::Primitive], "resource")?)
}

/// Finds a bundle by id.
pub fn find_bundle(doc: &Document, bundle_id: &str) -> Result<NodeId> {
    Ok(get_element_by_id(doc, bundle_id, &[Tag::Bundle], "bundle")?)
}

/// Element to remove so that `element` disappears without leaving an empty
/// or dangling wrapper.
fn removal_root(doc: &Document, element: NodeId) -> NodeId {
    let Some(parent) = common::get_parent_resource(doc, element) else {
        return element;
    };
    match doc.tag(parent) {
        Some(Tag::Group) if group::get_inner_resources(doc, parent).len() <= 1 => {
            removal_root(doc, parent)
        }
        Some(Tag::Clone) | Some(Tag::Master) => parent,
        _ => element,
    }
}

/// Removes a resource.
///
/// A primitive alone in its group takes the group with it, a cloned
/// resource takes its clone. ACL permissions referencing any removed id are
/// removed too. Returns the removed resource ids.
pub fn delete(doc: &mut Document, resource_id: &str) -> Result<Vec<String>> {
    let element = find_resource(doc, resource_id)?;
    let root = removal_root(doc, element);
    let removed: Vec<String> = doc
        .descendants(root)
        .into_iter()
        .filter(|n| doc.tag(*n).map(Tag::is_resource).unwrap_or(false))
        .map(|n| doc.id_of(n).to_string())
        .collect();
    doc.remove(root);
    let scope = doc.root();
    for id in &removed {
        remove_permissions_referencing(doc, scope, id);
    }
    debug!(resource_id, removed = ?removed, "deleted resource");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::PermissionInfo;
    use crate::cib::acl;
    use crate::cib::document::SchemaVersion;

    fn setup() -> Document {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let clone = doc.append_new_with_id(resources, Tag::Clone, "G-clone");
        let group = doc.append_new_with_id(clone, Tag::Group, "G");
        doc.append_new_with_id(group, Tag::Primitive, "A");
        doc.append_new_with_id(group, Tag::Primitive, "B");
        let bundle = doc.append_new_with_id(resources, Tag::Bundle, "BU");
        doc.append_new_with_id(bundle, Tag::Primitive, "IN");
        doc
    }

    #[test]
    fn test_delete_primitive_from_group() {
        let mut doc = setup();
        assert_eq!(delete(&mut doc, "A").unwrap(), vec!["A"]);
        assert!(find_resource(&doc, "G").is_ok());
        assert_eq!(delete(&mut doc, "B").unwrap(), vec!["G-clone", "G", "B"]);
        assert!(find_resource(&doc, "G-clone").is_err());
    }

    #[test]
    fn test_delete_from_bundle_keeps_bundle() {
        let mut doc = setup();
        assert_eq!(delete(&mut doc, "IN").unwrap(), vec!["IN"]);
        assert!(find_bundle(&doc, "BU").is_ok());
    }

    #[test]
    fn test_delete_sweeps_permissions() {
        let mut doc = setup();
        let acls = doc.provide_acls().unwrap();
        let role = acl::create_role(&mut doc, acls, "role1", None).unwrap();
        acl::add_permissions(
            &mut doc,
            role,
            &[
                PermissionInfo::new("read", "id", "A"),
                PermissionInfo::new("read", "id", "BU"),
            ],
        )
        .unwrap();
        delete(&mut doc, "G-clone").unwrap();
        let config = acl::get_config(&doc);
        let refs: Vec<Option<String>> = config.role_list[0]
            .permission_list
            .iter()
            .map(|p| p.reference.clone())
            .collect();
        assert_eq!(refs, vec![Some("BU".to_string())]);
    }

    #[test]
    fn test_delete_unknown() {
        let mut doc = setup();
        let err = delete(&mut doc, "nope").unwrap_err();
        assert_eq!(err.reports()[0].kind.code(), "ID_NOT_FOUND");
    }
}
