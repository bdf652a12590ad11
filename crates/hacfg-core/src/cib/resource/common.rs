//! Enable/disable state shared by all resource kinds.

use crate::cib::document::{Document, NodeId, Tag};
use crate::cib::ids::IdProvider;
use crate::cib::nvpair::{arrange_first_meta_attributes, get_meta_values, remove_nvpair_from_all};
use std::borrow::Borrow;
use std::collections::BTreeMap;

const TARGET_ROLE: &str = "target-role";

/// Returns `meta` with `target-role=Stopped`.
pub fn disable_meta<K, V>(meta: &BTreeMap<K, V>) -> BTreeMap<String, String>
where
    K: Borrow<str> + Ord,
    V: ToString,
{
    let mut result: BTreeMap<String, String> = meta
        .iter()
        .map(|(k, v)| (k.borrow().to_string(), v.to_string()))
        .collect();
    result.insert(TARGET_ROLE.to_string(), "Stopped".to_string());
    result
}

/// Returns true if `target-role` is `Stopped`, in any case.
pub fn are_meta_disabled<K, V>(meta: &BTreeMap<K, V>) -> bool
where
    K: Borrow<str> + Ord,
    V: ToString,
{
    meta.get(TARGET_ROLE)
        .map(|v| v.to_string().eq_ignore_ascii_case("stopped"))
        .unwrap_or(false)
}

fn is_zero<V: ToString>(value: Option<&V>) -> bool {
    value
        .and_then(|v| v.to_string().trim().parse::<i64>().ok())
        .map(|n| n == 0)
        .unwrap_or(false)
}

/// [`are_meta_disabled`], or `clone-max` / `clone-node-max` equal to zero.
///
/// Values may be strings or integers, leading zeros are tolerated.
pub fn are_clone_meta_disabled<K, V>(meta: &BTreeMap<K, V>) -> bool
where
    K: Borrow<str> + Ord,
    V: ToString,
{
    are_meta_disabled(meta) || is_zero(meta.get("clone-max")) || is_zero(meta.get("clone-node-max"))
}

/// Returns true if `element` is disabled by its own meta attributes.
pub fn is_disabled(doc: &Document, element: NodeId) -> bool {
    let meta = get_meta_values(doc, element);
    match doc.tag(element) {
        Some(tag) if tag.is_clone() => are_clone_meta_disabled(&meta),
        _ => are_meta_disabled(&meta),
    }
}

/// Sets `target-role=Stopped` on `element`.
pub fn disable(doc: &mut Document, element: NodeId, provider: Option<&mut IdProvider>) {
    let meta = disable_meta(&BTreeMap::<String, String>::new());
    arrange_first_meta_attributes(doc, element, &meta, provider);
}

/// Removes `target-role` from every meta set of `element`.
pub fn enable(doc: &mut Document, element: NodeId) {
    remove_nvpair_from_all(doc, element, &Tag::MetaAttributes, TARGET_ROLE);
}

/// Wrapping group, clone or bundle of `element`.
pub fn get_parent_resource(doc: &Document, element: NodeId) -> Option<NodeId> {
    let parent = doc.parent(element)?;
    match doc.tag(parent) {
        Some(Tag::Group) | Some(Tag::Clone) | Some(Tag::Master) | Some(Tag::Bundle) => Some(parent),
        _ => None,
    }
}

/// `element` followed by its chain of wrapping resources.
pub fn resource_and_wrappers(doc: &Document, element: NodeId) -> Vec<NodeId> {
    let mut result = vec![element];
    let mut current = element;
    while let Some(parent) = get_parent_resource(doc, current) {
        result.push(parent);
        current = parent;
    }
    result
}

/// Primitives at or below `element`.
pub fn find_primitives(doc: &Document, element: NodeId) -> Vec<NodeId> {
    doc.find_by_tag(element, &Tag::Primitive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cib::document::SchemaVersion;

    fn meta<V: Clone>(items: &[(&'static str, V)]) -> BTreeMap<&'static str, V> {
        items.iter().cloned().collect()
    }

    #[test]
    fn test_disable_meta() {
        assert_eq!(
            disable_meta(&meta(&[("a", "b")])),
            [("a", "b"), ("target-role", "Stopped")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>()
        );
        assert_eq!(disable_meta(&meta(&[("target-role", "Stopped")])).len(), 1);
    }

    #[test]
    fn test_are_meta_disabled() {
        assert!(are_meta_disabled(&meta(&[("target-role", "Stopped")])));
        assert!(are_meta_disabled(&meta(&[("target-role", "stopped")])));
        assert!(!are_meta_disabled(&meta::<&str>(&[])));
        assert!(!are_meta_disabled(&meta(&[("target-role", "any")])));
    }

    #[test]
    fn test_are_clone_meta_disabled() {
        assert!(are_clone_meta_disabled(&meta(&[("target-role", "stopped")])));
        assert!(are_clone_meta_disabled(&meta(&[("clone-max", "0")])));
        assert!(are_clone_meta_disabled(&meta(&[("clone-max", "00")])));
        assert!(are_clone_meta_disabled(&meta(&[("clone-max", 0)])));
        assert!(are_clone_meta_disabled(&meta(&[("clone-node-max", "0")])));
        assert!(!are_clone_meta_disabled(&meta::<&str>(&[])));
        assert!(!are_clone_meta_disabled(&meta(&[("target-role", "any")])));
        assert!(!are_clone_meta_disabled(&meta(&[("clone-max", "1")])));
        assert!(!are_clone_meta_disabled(&meta(&[("clone-max", "01")])));
        assert!(!are_clone_meta_disabled(&meta(&[("clone-max", 1)])));
        assert!(!are_clone_meta_disabled(&meta(&[("clone-node-max", 1)])));
    }

    #[test]
    fn test_disable_and_enable() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let clone = doc.append_new_with_id(resources, Tag::Clone, "C");
        let r = doc.append_new_with_id(clone, Tag::Primitive, "R");
        assert!(!is_disabled(&doc, r));
        disable(&mut doc, r, None);
        assert!(is_disabled(&doc, r));
        assert_eq!(doc.id_of(doc.children(r)[0]), "R-meta_attributes");
        enable(&mut doc, r);
        assert!(!is_disabled(&doc, r));
        assert_eq!(resource_and_wrappers(&doc, r), vec![r, clone]);
    }
}
