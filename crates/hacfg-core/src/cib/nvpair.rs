//! Name-value sets: `meta_attributes` and `instance_attributes`.

use super::document::{Document, NodeId, Tag};
use super::ids::{create_subelement_id, IdProvider};
use std::collections::BTreeMap;

/// Sets, updates or removes (empty value) one pair in `nvset`.
pub fn set_nvpair_in_nvset(
    doc: &mut Document,
    nvset: NodeId,
    name: &str,
    value: &str,
    provider: Option<&mut IdProvider>,
) {
    let existing = doc
        .children_by_tag(nvset, &Tag::Nvpair)
        .into_iter()
        .find(|p| doc.attr(*p, "name") == Some(name));
    match existing {
        Some(pair) if value.is_empty() => doc.remove(pair),
        Some(pair) => doc.set_attr(pair, "value", value),
        None if value.is_empty() => {}
        None => {
            let id = create_subelement_id(doc, nvset, name, provider);
            let pair = doc.append_new_with_id(nvset, Tag::Nvpair, &id);
            doc.set_attr(pair, "name", name);
            doc.set_attr(pair, "value", value);
        }
    }
}

/// Writes `pairs` into the first `tag` set of `element`, creating the set
/// (with id `<element id>-<tag>`) when it does not exist and there is
/// something to write.
pub fn arrange_first_nvset(
    doc: &mut Document,
    tag: Tag,
    element: NodeId,
    pairs: &BTreeMap<String, String>,
    mut provider: Option<&mut IdProvider>,
) {
    if pairs.is_empty() {
        return;
    }
    let nvset = match doc.first_child_by_tag(element, &tag) {
        Some(nvset) => nvset,
        None => {
            let id = create_subelement_id(doc, element, tag.as_str(), provider.as_deref_mut());
            let nvset = doc.create(tag);
            doc.set_attr(nvset, "id", &id);
            // sets go before operations and nested resources
            let index = doc
                .children(element)
                .iter()
                .position(|c| {
                    !matches!(
                        doc.tag(*c),
                        Some(Tag::MetaAttributes) | Some(Tag::InstanceAttributes)
                    )
                })
                .unwrap_or_else(|| doc.children(element).len());
            doc.insert_child(element, index, nvset);
            nvset
        }
    };
    for (name, value) in pairs {
        set_nvpair_in_nvset(doc, nvset, name, value, provider.as_deref_mut());
    }
}

/// [`arrange_first_nvset`] for `meta_attributes`.
pub fn arrange_first_meta_attributes(
    doc: &mut Document,
    element: NodeId,
    pairs: &BTreeMap<String, String>,
    provider: Option<&mut IdProvider>,
) {
    arrange_first_nvset(doc, Tag::MetaAttributes, element, pairs, provider);
}

/// [`arrange_first_nvset`] for `instance_attributes`.
pub fn arrange_first_instance_attributes(
    doc: &mut Document,
    element: NodeId,
    pairs: &BTreeMap<String, String>,
    provider: Option<&mut IdProvider>,
) {
    arrange_first_nvset(doc, Tag::InstanceAttributes, element, pairs, provider);
}

/// Pairs of every `tag` set directly under `element`; later sets win.
pub fn get_nvset_values(doc: &Document, element: NodeId, tag: &Tag) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for nvset in doc.children_by_tag(element, tag) {
        for pair in doc.children_by_tag(nvset, &Tag::Nvpair) {
            if let Some(name) = doc.attr(pair, "name") {
                values.insert(
                    name.to_string(),
                    doc.attr(pair, "value").unwrap_or_default().to_string(),
                );
            }
        }
    }
    values
}

/// Meta attributes of `element`.
pub fn get_meta_values(doc: &Document, element: NodeId) -> BTreeMap<String, String> {
    get_nvset_values(doc, element, &Tag::MetaAttributes)
}

/// Removes the pair `name` from every `tag` set of `element`.
pub fn remove_nvpair_from_all(doc: &mut Document, element: NodeId, tag: &Tag, name: &str) {
    for nvset in doc.children_by_tag(element, tag) {
        for pair in doc.children_by_tag(nvset, &Tag::Nvpair) {
            if doc.attr(pair, "name") == Some(name) {
                doc.remove(pair);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cib::document::SchemaVersion;

    fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_arrange_creates_set_before_operations() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let r = doc.append_new_with_id(resources, Tag::Primitive, "R");
        let ops = doc.append_new(r, Tag::Operations);
        arrange_first_meta_attributes(&mut doc, r, &pairs(&[("a", "1"), ("b", "2")]), None);
        let children = doc.children(r);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.id_of(children[0]), "R-meta_attributes");
        assert_eq!(children[1], ops);
        let nvpairs = doc.children(children[0]);
        assert_eq!(doc.id_of(nvpairs[0]), "R-meta_attributes-a");
        assert_eq!(get_meta_values(&doc, r), pairs(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_arrange_updates_and_removes() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let r = doc.append_new_with_id(resources, Tag::Primitive, "R");
        arrange_first_meta_attributes(&mut doc, r, &pairs(&[("a", "1"), ("b", "2")]), None);
        arrange_first_meta_attributes(&mut doc, r, &pairs(&[("a", "3"), ("b", ""), ("c", "")]), None);
        assert_eq!(get_meta_values(&doc, r), pairs(&[("a", "3")]));
    }

    #[test]
    fn test_empty_pairs_create_nothing() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let r = doc.append_new_with_id(resources, Tag::Primitive, "R");
        arrange_first_instance_attributes(&mut doc, r, &BTreeMap::new(), None);
        assert!(doc.children(r).is_empty());
    }

    #[test]
    fn test_remove_from_all_sets() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let r = doc.append_new_with_id(resources, Tag::Primitive, "R");
        arrange_first_meta_attributes(&mut doc, r, &pairs(&[("target-role", "Stopped")]), None);
        let second = doc.append_new_with_id(r, Tag::MetaAttributes, "R-meta-2");
        set_nvpair_in_nvset(&mut doc, second, "target-role", "Stopped", None);
        remove_nvpair_from_all(&mut doc, r, &Tag::MetaAttributes, "target-role");
        assert!(get_meta_values(&doc, r).is_empty());
    }
}
