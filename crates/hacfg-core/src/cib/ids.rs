//! Element identifiers: syntax, uniqueness and allocation.

use super::document::{Document, NodeId, Tag};
use crate::error::{CoreError, Result};
use crate::report::{ReportItem, ReportKind};
use std::collections::HashSet;

/// Checks id syntax.
///
/// The first character must be an ASCII letter or `_`, the rest ASCII
/// alphanumerics, `.`, `-` or `_`.
pub fn validate_id(id: &str, id_description: &str) -> std::result::Result<(), ReportItem> {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return Err(ReportItem::error(ReportKind::InvalidIdIsEmpty {
            id_description: id_description.to_string(),
        }));
    };
    let bad_char = |invalid_character: char, is_first_char: bool| {
        ReportItem::error(ReportKind::InvalidIdBadChar {
            id: id.to_string(),
            id_description: id_description.to_string(),
            invalid_character,
            is_first_char,
        })
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(bad_char(first, true));
    }
    match chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))) {
        Some(c) => Err(bad_char(c, false)),
        None => Ok(()),
    }
}

/// Elements whose `id` attribute does not take part in uniqueness.
///
/// Target ids are user names and role elements reference role ids.
fn is_id_exempt(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), Some(Tag::AclTarget) | Some(Tag::Role))
}

/// Every element outside `status` which owns its id.
fn id_owners(doc: &Document) -> impl Iterator<Item = NodeId> + '_ {
    let status = doc.get_status();
    let root = doc.root();
    let mut scopes = doc.children(root);
    scopes.retain(|c| Some(*c) != status);
    scopes
        .into_iter()
        .flat_map(move |scope| doc.descendants(scope))
        .filter(move |n| !is_id_exempt(doc, *n))
}

/// Returns true if `id` is taken anywhere outside the status section.
pub fn does_id_exist(doc: &Document, id: &str) -> bool {
    id_owners(doc).any(|n| doc.attr(n, "id") == Some(id))
}

/// Element owning `id`, if any.
pub fn find_element_by_id(doc: &Document, id: &str) -> Option<NodeId> {
    id_owners(doc).find(|n| doc.attr(*n, "id") == Some(id))
}

/// Returns `requested` if free, otherwise the first free `requested-N`.
pub fn find_unique_id(doc: &Document, requested: &str, reserved: &HashSet<String>) -> String {
    let taken = |id: &str| reserved.contains(id) || does_id_exist(doc, id);
    if !taken(requested) {
        return requested.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{}-{}", requested, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Books ids allocated during one mutation so that two new elements never
/// receive the same id before either is written into the document.
#[derive(Debug, Default, Clone)]
pub struct IdProvider {
    booked: HashSet<String>,
}

impl IdProvider {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates and books a unique id derived from `requested`.
    pub fn allocate(&mut self, doc: &Document, requested: &str) -> String {
        let id = find_unique_id(doc, requested, &self.booked);
        self.booked.insert(id.clone());
        id
    }

    /// Books exact ids; reports ids that are taken or already booked.
    pub fn book_ids(&mut self, doc: &Document, ids: &[&str]) -> Vec<ReportItem> {
        let mut reports = Vec::new();
        for id in ids {
            if self.booked.contains(*id) || does_id_exist(doc, id) {
                reports.push(ReportItem::error(ReportKind::IdAlreadyExists {
                    id: id.to_string(),
                }));
            } else {
                self.booked.insert(id.to_string());
            }
        }
        reports
    }

    /// Checks the syntax of a new exact id and books it; an id that is
    /// taken or already booked is reported once.
    pub fn book_new_id(&mut self, doc: &Document, id: &str, id_description: &str) -> Vec<ReportItem> {
        match validate_id(id, id_description) {
            Ok(()) => self.book_ids(doc, &[id]),
            Err(report) => vec![report],
        }
    }
}

/// Allocates a unique id, booking it when a provider is given.
pub fn allocate_id(doc: &Document, requested: &str, provider: Option<&mut IdProvider>) -> String {
    match provider {
        Some(provider) => provider.allocate(doc, requested),
        None => find_unique_id(doc, requested, &HashSet::new()),
    }
}

/// Id `<context id>-<suffix>` made unique.
pub fn create_subelement_id(
    doc: &Document,
    context: NodeId,
    suffix: &str,
    provider: Option<&mut IdProvider>,
) -> String {
    allocate_id(doc, &format!("{}-{}", doc.id_of(context), suffix), provider)
}

/// Reports problems of a new id: syntax or an existing owner.
pub fn validate_new_id(doc: &Document, id: &str, id_description: &str) -> Vec<ReportItem> {
    if let Err(report) = validate_id(id, id_description) {
        return vec![report];
    }
    if does_id_exist(doc, id) {
        return vec![ReportItem::error(ReportKind::IdAlreadyExists {
            id: id.to_string(),
        })];
    }
    vec![]
}

/// Fails when `id` cannot be used for a new element.
pub fn check_new_id_applicable(doc: &Document, id: &str, id_description: &str) -> Result<()> {
    let reports = validate_new_id(doc, id, id_description);
    if reports.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Reports(reports.into()))
    }
}

/// Finds an element with `id` whose tag is one of `tags`.
///
/// Reports ID_NOT_FOUND, or ID_BELONGS_TO_UNEXPECTED_TYPE when the id
/// belongs to an element of another type.
pub fn get_element_by_id(
    doc: &Document,
    id: &str,
    tags: &[Tag],
    id_description: &str,
) -> std::result::Result<NodeId, ReportItem> {
    let owner = id_owners(doc).find(|n| {
        doc.attr(*n, "id") == Some(id) && doc.tag(*n).map(|t| tags.contains(t)).unwrap_or(false)
    });
    if let Some(node) = owner {
        return Ok(node);
    }
    if let Some(other) = find_element_by_id(doc, id) {
        return Err(ReportItem::error(ReportKind::IdBelongsToUnexpectedType {
            id: id.to_string(),
            expected_types: tags.iter().map(|t| t.as_str().to_string()).collect(),
            current_type: doc.tag(other).map(|t| t.as_str().to_string()).unwrap_or_default(),
        }));
    }
    Err(ReportItem::error(ReportKind::IdNotFound {
        id: id.to_string(),
        id_description: id_description.to_string(),
        context_type: None,
        context_id: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cib::document::SchemaVersion;

    fn doc_with(ids: &[&str]) -> Document {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        for id in ids {
            doc.append_new_with_id(resources, Tag::Primitive, id);
        }
        doc
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("a-b.c_1", "id").is_ok());
        assert!(validate_id("_x", "id").is_ok());
        let err = validate_id("", "resource name").unwrap_err();
        assert_eq!(err.kind.code(), "INVALID_ID_IS_EMPTY");
        let err = validate_id("1a", "id").unwrap_err();
        assert_eq!(
            err.kind,
            ReportKind::InvalidIdBadChar {
                id: "1a".to_string(),
                id_description: "id".to_string(),
                invalid_character: '1',
                is_first_char: true,
            }
        );
        let err = validate_id("a:b", "id").unwrap_err();
        match err.kind {
            ReportKind::InvalidIdBadChar {
                invalid_character,
                is_first_char,
                ..
            } => {
                assert_eq!(invalid_character, ':');
                assert!(!is_first_char);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_find_unique_id() {
        let doc = doc_with(&["r", "r-1", "r-3"]);
        assert_eq!(find_unique_id(&doc, "x", &HashSet::new()), "x");
        assert_eq!(find_unique_id(&doc, "r", &HashSet::new()), "r-2");
        let reserved: HashSet<String> = ["r-2".to_string()].into_iter().collect();
        assert_eq!(find_unique_id(&doc, "r", &reserved), "r-4");
    }

    #[test]
    fn test_status_and_acl_references_are_ignored() {
        let mut doc = doc_with(&[]);
        let status = doc.get_status().unwrap();
        doc.append_new_with_id(status, Tag::Custom("node_state".into()), "old");
        let acls = doc.provide_acls().unwrap();
        let target = doc.append_new_with_id(acls, Tag::AclTarget, "user1");
        doc.append_new_with_id(target, Tag::Role, "role1");
        assert!(!does_id_exist(&doc, "old"));
        assert!(!does_id_exist(&doc, "user1"));
        assert!(!does_id_exist(&doc, "role1"));
        doc.append_new_with_id(acls, Tag::AclRole, "role1");
        assert!(does_id_exist(&doc, "role1"));
    }

    #[test]
    fn test_id_provider_books() {
        let doc = doc_with(&["a"]);
        let mut provider = IdProvider::new();
        assert_eq!(provider.allocate(&doc, "a"), "a-1");
        assert_eq!(provider.allocate(&doc, "a"), "a-2");
        let reports = provider.book_ids(&doc, &["b", "b", "a"]);
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_get_element_by_id() {
        let mut doc = doc_with(&["p"]);
        let resources = doc.get_resources().unwrap();
        doc.append_new_with_id(resources, Tag::Group, "g");
        assert!(get_element_by_id(&doc, "g", &[Tag::Group], "group").is_ok());
        let err = get_element_by_id(&doc, "p", &[Tag::Group], "group").unwrap_err();
        assert_eq!(err.kind.code(), "ID_BELONGS_TO_UNEXPECTED_TYPE");
        let err = get_element_by_id(&doc, "x", &[Tag::Group], "group").unwrap_err();
        assert_eq!(err.kind.code(), "ID_NOT_FOUND");
    }

    #[test]
    fn test_check_new_id_applicable() {
        let doc = doc_with(&["p"]);
        assert!(check_new_id_applicable(&doc, "q", "resource name").is_ok());
        let err = check_new_id_applicable(&doc, "p", "resource name").unwrap_err();
        assert_eq!(err.reports()[0].kind.code(), "ID_ALREADY_EXISTS");
    }
}
