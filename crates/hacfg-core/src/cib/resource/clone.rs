//! Clones and promotable clones.

use crate::cib::document::{Document, NodeId, SchemaVersion, Tag};
use crate::cib::ids::IdProvider;
use crate::cib::nvpair::{arrange_first_meta_attributes, get_meta_values};
use crate::error::{CoreError, Result};
use crate::report::{ReportItem, ReportKind};
use crate::resource_args::Options;
use tracing::debug;

/// Wraps `inner` (a primitive or group) in a new clone placed where
/// `inner` was.
///
/// The clone id is `clone_id` when given, else `<inner id>-clone` made
/// unique. Documents older than the promotable schema get a `master`
/// element for promotable clones.
pub fn append_new(
    doc: &mut Document,
    inner: NodeId,
    meta_attrs: &Options,
    clone_id: Option<&str>,
    provider: &mut IdProvider,
) -> Result<NodeId> {
    let promotable = meta_attrs
        .get("promotable")
        .map(|v| is_true(v))
        .unwrap_or(false);
    let legacy_master = promotable && doc.schema_version()? < SchemaVersion::PROMOTABLE;
    let id = match clone_id {
        Some(id) => {
            let reports = provider.book_new_id(doc, id, "clone id");
            if !reports.is_empty() {
                return Err(CoreError::Reports(reports.into()));
            }
            id.to_string()
        }
        None => {
            let suffix = if legacy_master { "master" } else { "clone" };
            provider.allocate(doc, &format!("{}-{}", doc.id_of(inner), suffix))
        }
    };
    let Some(parent) = doc.parent(inner) else {
        return Err(CoreError::report(ReportItem::error(ReportKind::IdNotFound {
            id: doc.id_of(inner).to_string(),
            id_description: "resource".to_string(),
            context_type: None,
            context_id: None,
        })));
    };
    let index = doc.index_in_parent(inner).unwrap_or(0);
    let tag = if legacy_master { Tag::Master } else { Tag::Clone };
    let clone = doc.create(tag);
    doc.set_attr(clone, "id", &id);
    doc.insert_child(parent, index, clone);
    doc.append_child(clone, inner);
    let mut meta = meta_attrs.clone();
    if legacy_master {
        meta.remove("promotable");
    }
    arrange_first_meta_attributes(doc, clone, &meta, Some(provider));
    debug!(clone_id = %id, promotable, "created clone");
    Ok(clone)
}

fn is_true(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "on" | "yes" | "y" | "1"
    )
}

/// Returns true for a `master` element or a clone with `promotable=true`.
pub fn is_promotable(doc: &Document, clone: NodeId) -> bool {
    match doc.tag(clone) {
        Some(Tag::Master) => true,
        Some(Tag::Clone) => get_meta_values(doc, clone)
            .get("promotable")
            .map(|v| is_true(v))
            .unwrap_or(false),
        _ => false,
    }
}

/// The wrapped primitive or group.
pub fn get_inner_resource(doc: &Document, clone: NodeId) -> Option<NodeId> {
    doc.children(clone)
        .into_iter()
        .find(|c| matches!(doc.tag(*c), Some(Tag::Primitive) | Some(Tag::Group)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cib::ids::does_id_exist;

    fn setup(version: SchemaVersion) -> (Document, NodeId) {
        let mut doc = Document::new(version);
        let resources = doc.get_resources().unwrap();
        doc.append_new_with_id(resources, Tag::Primitive, "first");
        let r = doc.append_new_with_id(resources, Tag::Primitive, "R");
        doc.append_new_with_id(resources, Tag::Primitive, "last");
        (doc, r)
    }

    #[test]
    fn test_append_new_in_place() {
        let (mut doc, r) = setup(SchemaVersion::LATEST);
        let mut provider = IdProvider::new();
        let clone = append_new(&mut doc, r, &Options::new(), None, &mut provider).unwrap();
        assert_eq!(doc.id_of(clone), "R-clone");
        let resources = doc.get_resources().unwrap();
        assert_eq!(doc.children(resources)[1], clone);
        assert_eq!(get_inner_resource(&doc, clone), Some(r));
        assert!(!is_promotable(&doc, clone));
    }

    #[test]
    fn test_append_new_promotable() {
        let (mut doc, r) = setup(SchemaVersion::LATEST);
        let mut meta = Options::new();
        meta.insert("promotable".to_string(), "true".to_string());
        let clone =
            append_new(&mut doc, r, &meta, Some("P"), &mut IdProvider::new()).unwrap();
        assert_eq!(doc.id_of(clone), "P");
        assert!(doc.is(clone, &Tag::Clone));
        assert!(is_promotable(&doc, clone));
    }

    #[test]
    fn test_append_new_promotable_on_old_schema() {
        let (mut doc, r) = setup(SchemaVersion::new(2, 10, 0));
        let mut meta = Options::new();
        meta.insert("promotable".to_string(), "true".to_string());
        let clone = append_new(&mut doc, r, &meta, None, &mut IdProvider::new()).unwrap();
        assert!(doc.is(clone, &Tag::Master));
        assert_eq!(doc.id_of(clone), "R-master");
        assert!(get_meta_values(&doc, clone).is_empty());
        assert!(is_promotable(&doc, clone));
    }

    #[test]
    fn test_append_new_rejects_taken_id() {
        let (mut doc, r) = setup(SchemaVersion::LATEST);
        let err = append_new(&mut doc, r, &Options::new(), Some("first"), &mut IdProvider::new())
            .unwrap_err();
        assert_eq!(err.reports()[0].kind.code(), "ID_ALREADY_EXISTS");
    }

    #[test]
    fn test_append_new_rejects_id_booked_in_same_change() {
        let (mut doc, r) = setup(SchemaVersion::LATEST);
        let mut provider = IdProvider::new();
        assert!(provider.book_ids(&doc, &["C1"]).is_empty());

        let err = append_new(&mut doc, r, &Options::new(), Some("C1"), &mut provider).unwrap_err();

        assert_eq!(err.reports()[0].kind.code(), "ID_ALREADY_EXISTS");
        assert!(!does_id_exist(&doc, "C1"));
    }
}
