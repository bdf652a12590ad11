//! Arena-backed configuration document.
//!
//! Elements live in a flat arena and refer to each other through [`NodeId`]
//! handles. A handle stays valid until its element is removed; lookups on a
//! removed handle return nothing.

use crate::error::{CoreError, Result};
use crate::report::{ReportItem, ReportKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Handle of an element inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[allow(missing_docs)]
pub enum Tag {
    Cib,
    Configuration,
    CrmConfig,
    Nodes,
    Resources,
    Constraints,
    Acls,
    Status,
    Primitive,
    Group,
    Clone,
    Master,
    Bundle,
    Docker,
    Podman,
    Rkt,
    Network,
    PortMapping,
    Storage,
    StorageMapping,
    MetaAttributes,
    InstanceAttributes,
    Nvpair,
    Operations,
    Op,
    AclRole,
    AclTarget,
    AclGroup,
    AclPermission,
    Role,
    /// Any tag the model does not interpret, carried verbatim.
    Custom(String),
}

const KNOWN_TAGS: [(Tag, &str); 30] = [
    (Tag::Cib, "cib"),
    (Tag::Configuration, "configuration"),
    (Tag::CrmConfig, "crm_config"),
    (Tag::Nodes, "nodes"),
    (Tag::Resources, "resources"),
    (Tag::Constraints, "constraints"),
    (Tag::Acls, "acls"),
    (Tag::Status, "status"),
    (Tag::Primitive, "primitive"),
    (Tag::Group, "group"),
    (Tag::Clone, "clone"),
    (Tag::Master, "master"),
    (Tag::Bundle, "bundle"),
    (Tag::Docker, "docker"),
    (Tag::Podman, "podman"),
    (Tag::Rkt, "rkt"),
    (Tag::Network, "network"),
    (Tag::PortMapping, "port-mapping"),
    (Tag::Storage, "storage"),
    (Tag::StorageMapping, "storage-mapping"),
    (Tag::MetaAttributes, "meta_attributes"),
    (Tag::InstanceAttributes, "instance_attributes"),
    (Tag::Nvpair, "nvpair"),
    (Tag::Operations, "operations"),
    (Tag::Op, "op"),
    (Tag::AclRole, "acl_role"),
    (Tag::AclTarget, "acl_target"),
    (Tag::AclGroup, "acl_group"),
    (Tag::AclPermission, "acl_permission"),
    (Tag::Role, "role"),
];

impl Tag {
    /// Tag name as written in the document.
    pub fn as_str(&self) -> &str {
        if let Tag::Custom(name) = self {
            return name;
        }
        KNOWN_TAGS
            .iter()
            .find(|(tag, _)| tag == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// Parses a tag name; unknown names become [`Tag::Custom`].
    pub fn from_name(name: &str) -> Self {
        KNOWN_TAGS
            .iter()
            .find(|(_, known)| *known == name)
            .map(|(tag, _)| tag.clone())
            .unwrap_or_else(|| Tag::Custom(name.to_string()))
    }

    /// Returns true for tags of resources which can stand on their own.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Tag::Primitive | Tag::Group | Tag::Clone | Tag::Master | Tag::Bundle
        )
    }

    /// Returns true for clone and legacy master.
    pub fn is_clone(&self) -> bool {
        matches!(self, Tag::Clone | Tag::Master)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::from_name(&name)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}

/// One element of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag.
    pub tag: Tag,
    /// Attributes, including `id`.
    pub attributes: BTreeMap<String, String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Element {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(String::as_str)
    }
}

/// Schema version `major.minor.revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    /// Major.
    pub major: u32,
    /// Minor.
    pub minor: u32,
    /// Revision, 0 when not written.
    pub revision: u32,
}

impl SchemaVersion {
    /// Newest schema the core knows how to produce.
    pub const LATEST: SchemaVersion = SchemaVersion::new(3, 9, 0);
    /// First schema with access control lists.
    pub const ACL: SchemaVersion = SchemaVersion::new(2, 0, 0);
    /// First schema with bundles.
    pub const BUNDLE: SchemaVersion = SchemaVersion::new(2, 8, 0);
    /// First schema with promotable clones.
    pub const PROMOTABLE: SchemaVersion = SchemaVersion::new(3, 0, 0);

    /// Builds a version.
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Parses a `validate-with` value such as `pacemaker-3.2`.
    pub fn parse(value: &str) -> Option<Self> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"pacemaker-(\d+)\.(\d+)(\.(\d+))?").ok())
            .as_ref()?;
        let caps = pattern.captures(value)?;
        let number = |i: usize| -> Option<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        Some(Self::new(number(1)?, number(2)?, number(4)?))
    }

    /// Value for the `validate-with` attribute.
    pub fn to_validate_with(&self) -> String {
        if self.revision == 0 {
            format!("pacemaker-{}.{}", self.major, self.minor)
        } else {
            format!("pacemaker-{}.{}.{}", self.major, self.minor, self.revision)
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedElement {
    tag: Tag,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    children: Vec<SerializedElement>,
}

/// The configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Option<Element>>,
    root: NodeId,
}

impl Document {
    /// Empty document at `version` holding the standard sections.
    pub fn new(version: SchemaVersion) -> Self {
        let mut doc = Self {
            nodes: vec![Some(Element::new(Tag::Cib))],
            root: NodeId(0),
        };
        let root = doc.root;
        doc.set_attr(root, "validate-with", &version.to_validate_with());
        doc.set_attr(root, "epoch", "1");
        doc.set_attr(root, "admin_epoch", "0");
        doc.set_attr(root, "num_updates", "0");
        let configuration = doc.append_new(root, Tag::Configuration);
        for tag in [Tag::CrmConfig, Tag::Nodes, Tag::Resources, Tag::Constraints] {
            doc.append_new(configuration, tag);
        }
        doc.append_new(root, Tag::Status);
        doc
    }

    /// Parses the JSON wire format.
    pub fn from_text(text: &str) -> Result<Self> {
        let tree: SerializedElement = serde_json::from_str(text).map_err(|e| {
            CoreError::report(ReportItem::error(ReportKind::CibLoadErrorBadFormat {
                reason: e.to_string(),
            }))
        })?;
        if tree.tag != Tag::Cib {
            return Err(CoreError::report(ReportItem::error(
                ReportKind::CibLoadErrorBadFormat {
                    reason: format!("root element is '{}', expected 'cib'", tree.tag),
                },
            )));
        }
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.load(tree, None);
        Ok(doc)
    }

    fn load(&mut self, tree: SerializedElement, parent: Option<NodeId>) -> NodeId {
        let node = NodeId(self.nodes.len());
        let mut element = Element::new(tree.tag);
        element.attributes = tree.attributes;
        element.parent = parent;
        self.nodes.push(Some(element));
        for child in tree.children {
            let child = self.load(child, Some(node));
            if let Some(element) = self.get_mut(node) {
                element.children.push(child);
            }
        }
        node
    }

    /// Serializes into the JSON wire format.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.dump(self.root))?)
    }

    fn dump(&self, node: NodeId) -> SerializedElement {
        match self.get(node) {
            Some(element) => SerializedElement {
                tag: element.tag.clone(),
                attributes: element.attributes.clone(),
                children: element.children.iter().map(|c| self.dump(*c)).collect(),
            },
            None => SerializedElement {
                tag: Tag::Custom(String::new()),
                attributes: BTreeMap::new(),
                children: Vec::new(),
            },
        }
    }

    /// Root `cib` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Element behind `node`.
    pub fn get(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0).and_then(Option::as_mut)
    }

    /// Returns true while `node` has not been removed.
    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    /// Tag of `node`.
    pub fn tag(&self, node: NodeId) -> Option<&Tag> {
        self.get(node).map(|e| &e.tag)
    }

    /// Returns true if `node` has tag `tag`.
    pub fn is(&self, node: NodeId, tag: &Tag) -> bool {
        self.tag(node) == Some(tag)
    }

    /// Renames an element.
    pub fn set_tag(&mut self, node: NodeId, tag: Tag) {
        if let Some(element) = self.get_mut(node) {
            element.tag = tag;
        }
    }

    /// Attribute value.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    /// The `id` attribute, empty when missing.
    pub fn id_of(&self, node: NodeId) -> &str {
        self.attr(node, "id").unwrap_or_default()
    }

    /// Sets an attribute.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.get_mut(node) {
            element.attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Removes an attribute.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.get_mut(node) {
            element.attributes.remove(name);
        }
    }

    /// Children in document order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    /// Children with tag `tag`.
    pub fn children_by_tag(&self, node: NodeId, tag: &Tag) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|c| self.is(*c, tag))
            .collect()
    }

    /// First child with tag `tag`.
    pub fn first_child_by_tag(&self, node: NodeId, tag: &Tag) -> Option<NodeId> {
        self.children(node).into_iter().find(|c| self.is(*c, tag))
    }

    /// Parent element.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|e| e.parent)
    }

    /// Closest ancestor (not `node` itself) whose tag is in `tags`.
    pub fn find_ancestor(&self, node: NodeId, tags: &[Tag]) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(candidate) = current {
            if self.tag(candidate).map(|t| tags.contains(t)).unwrap_or(false) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// `node` and all its descendants, pre-order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        result
    }

    /// Descendants of `scope` with tag `tag`, `scope` included.
    pub fn find_by_tag(&self, scope: NodeId, tag: &Tag) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.is(*n, tag))
            .collect()
    }

    /// First element under `scope` with tag in `tags` and the given id.
    pub fn find_by_tag_and_id(&self, scope: NodeId, tags: &[Tag], id: &str) -> Option<NodeId> {
        self.descendants(scope).into_iter().find(|n| {
            self.attr(*n, "id") == Some(id)
                && self.tag(*n).map(|t| tags.contains(t)).unwrap_or(false)
        })
    }

    /// Creates a detached element.
    pub fn create(&mut self, tag: Tag) -> NodeId {
        let node = NodeId(self.nodes.len());
        self.nodes.push(Some(Element::new(tag)));
        node
    }

    /// Creates an element and appends it to `parent`.
    pub fn append_new(&mut self, parent: NodeId, tag: Tag) -> NodeId {
        let node = self.create(tag);
        self.append_child(parent, node);
        node
    }

    /// Creates an element with an id and appends it to `parent`.
    pub fn append_new_with_id(&mut self, parent: NodeId, tag: Tag, id: &str) -> NodeId {
        let node = self.append_new(parent, tag);
        self.set_attr(node, "id", id);
        node
    }

    /// Moves `child` to the end of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.get(parent).map(|e| e.children.len()).unwrap_or(0);
        self.insert_child(parent, index, child);
    }

    /// Moves `child` to position `index` among the children of `parent`.
    ///
    /// The index is taken after `child` is detached from its old place.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        if let Some(element) = self.get_mut(parent) {
            let index = index.min(element.children.len());
            element.children.insert(index, child);
        }
        if let Some(element) = self.get_mut(child) {
            element.parent = Some(parent);
        }
    }

    /// Position of `child` among its siblings.
    pub fn index_in_parent(&self, child: NodeId) -> Option<usize> {
        let parent = self.parent(child)?;
        self.get(parent)?.children.iter().position(|c| *c == child)
    }

    /// Unlinks `node` from its parent, keeping its subtree.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            if let Some(element) = self.get_mut(parent) {
                element.children.retain(|c| *c != node);
            }
        }
        if let Some(element) = self.get_mut(node) {
            element.parent = None;
        }
    }

    /// Removes `node` together with its subtree.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        for removed in self.descendants(node) {
            if let Some(slot) = self.nodes.get_mut(removed.0) {
                *slot = None;
            }
        }
    }

    /// Schema version from the root `validate-with` attribute.
    pub fn schema_version(&self) -> Result<SchemaVersion> {
        let value = self.attr(self.root, "validate-with").unwrap_or_default();
        SchemaVersion::parse(value).ok_or_else(|| {
            CoreError::report(ReportItem::error(ReportKind::CibLoadErrorBadFormat {
                reason: format!("unable to get schema version from '{}'", value),
            }))
        })
    }

    fn mandatory_section(&self, parent: NodeId, tag: Tag) -> Result<NodeId> {
        self.first_child_by_tag(parent, &tag).ok_or_else(|| {
            CoreError::report(ReportItem::error(ReportKind::CibMissingMandatorySection {
                section_name: tag.as_str().to_string(),
            }))
        })
    }

    /// The `configuration` section.
    pub fn get_configuration(&self) -> Result<NodeId> {
        self.mandatory_section(self.root, Tag::Configuration)
    }

    /// The `resources` section.
    pub fn get_resources(&self) -> Result<NodeId> {
        self.mandatory_section(self.get_configuration()?, Tag::Resources)
    }

    /// The `status` section, if present.
    pub fn get_status(&self) -> Option<NodeId> {
        self.first_child_by_tag(self.root, &Tag::Status)
    }

    /// The `acls` section, if present.
    pub fn get_acls(&self) -> Option<NodeId> {
        self.get_configuration()
            .ok()
            .and_then(|c| self.first_child_by_tag(c, &Tag::Acls))
    }

    /// The `acls` section, created when missing.
    pub fn provide_acls(&mut self) -> Result<NodeId> {
        let configuration = self.get_configuration()?;
        match self.first_child_by_tag(configuration, &Tag::Acls) {
            Some(acls) => Ok(acls),
            None => Ok(self.append_new(configuration, Tag::Acls)),
        }
    }

    /// Upgrades the document to `target`.
    ///
    /// Legacy `master` elements become clones with `promotable=true`.
    /// Returns false when the document already is at `target` or newer.
    pub fn upgrade_to(&mut self, target: SchemaVersion) -> Result<bool> {
        let current = self.schema_version()?;
        if current >= target {
            return Ok(false);
        }
        if target >= SchemaVersion::PROMOTABLE {
            let resources = self.get_resources()?;
            for master in self.find_by_tag(resources, &Tag::Master) {
                self.set_tag(master, Tag::Clone);
                let mut meta = BTreeMap::new();
                meta.insert("promotable".to_string(), "true".to_string());
                super::nvpair::arrange_first_meta_attributes(self, master, &meta, None);
            }
        }
        let root = self.root;
        self.set_attr(root, "validate-with", &target.to_validate_with());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_parse() {
        assert_eq!(
            SchemaVersion::parse("pacemaker-3.2"),
            Some(SchemaVersion::new(3, 2, 0))
        );
        assert_eq!(
            SchemaVersion::parse("pacemaker-2.10.3"),
            Some(SchemaVersion::new(2, 10, 3))
        );
        assert_eq!(SchemaVersion::parse("pacemaker-next"), None);
        assert!(SchemaVersion::new(2, 10, 0) > SchemaVersion::new(2, 8, 0));
    }

    #[test]
    fn test_new_document_has_sections() {
        let doc = Document::new(SchemaVersion::LATEST);
        assert!(doc.get_resources().is_ok());
        assert!(doc.get_status().is_some());
        assert!(doc.get_acls().is_none());
        assert_eq!(doc.schema_version().unwrap(), SchemaVersion::LATEST);
    }

    #[test]
    fn test_text_round_trip() {
        let mut doc = Document::new(SchemaVersion::new(3, 1, 0));
        let resources = doc.get_resources().unwrap();
        let primitive = doc.append_new_with_id(resources, Tag::Primitive, "R1");
        doc.set_attr(primitive, "class", "ocf");
        doc.append_new_with_id(resources, Tag::Custom("template".into()), "T");
        let text = doc.to_text().unwrap();
        let loaded = Document::from_text(&text).unwrap();
        assert_eq!(loaded.to_text().unwrap(), text);
        let resources = loaded.get_resources().unwrap();
        let found = loaded
            .find_by_tag_and_id(resources, &[Tag::Primitive], "R1")
            .unwrap();
        assert_eq!(loaded.attr(found, "class"), Some("ocf"));
        assert!(loaded
            .find_by_tag_and_id(resources, &[Tag::Custom("template".into())], "T")
            .is_some());
    }

    #[test]
    fn test_from_text_rejects_bad_input() {
        let err = Document::from_text("not json").unwrap_err();
        assert_eq!(err.reports()[0].kind.code(), "CIB_LOAD_ERROR_BAD_FORMAT");
        let err = Document::from_text(r#"{"tag": "resources"}"#).unwrap_err();
        assert_eq!(err.reports()[0].kind.code(), "CIB_LOAD_ERROR_BAD_FORMAT");
    }

    #[test]
    fn test_missing_mandatory_section() {
        let doc = Document::from_text(r#"{"tag": "cib", "attributes": {"validate-with": "pacemaker-3.0"}}"#)
            .unwrap();
        let err = doc.get_resources().unwrap_err();
        assert_eq!(
            err.reports()[0].kind,
            ReportKind::CibMissingMandatorySection {
                section_name: "configuration".to_string()
            }
        );
    }

    #[test]
    fn test_insert_and_move_children() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let a = doc.append_new_with_id(resources, Tag::Primitive, "a");
        let b = doc.append_new_with_id(resources, Tag::Primitive, "b");
        doc.insert_child(resources, 0, b);
        assert_eq!(doc.children(resources), vec![b, a]);
        let group = doc.append_new_with_id(resources, Tag::Group, "g");
        doc.append_child(group, a);
        assert_eq!(doc.children(resources), vec![b, group]);
        assert_eq!(doc.parent(a), Some(group));
        assert_eq!(doc.find_ancestor(a, &[Tag::Resources]), Some(resources));
    }

    #[test]
    fn test_remove_subtree() {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let group = doc.append_new_with_id(resources, Tag::Group, "g");
        let a = doc.append_new_with_id(group, Tag::Primitive, "a");
        doc.remove(group);
        assert!(!doc.contains(group));
        assert!(!doc.contains(a));
        assert!(doc.children(resources).is_empty());
    }

    #[test]
    fn test_upgrade_converts_master() {
        let mut doc = Document::new(SchemaVersion::new(2, 10, 0));
        let resources = doc.get_resources().unwrap();
        let master = doc.append_new_with_id(resources, Tag::Master, "M");
        doc.append_new_with_id(master, Tag::Primitive, "P");
        assert!(doc.upgrade_to(SchemaVersion::LATEST).unwrap());
        assert_eq!(doc.tag(master), Some(&Tag::Clone));
        assert_eq!(doc.schema_version().unwrap(), SchemaVersion::LATEST);
        let meta = doc.first_child_by_tag(master, &Tag::MetaAttributes).unwrap();
        let pair = doc.first_child_by_tag(meta, &Tag::Nvpair).unwrap();
        assert_eq!(doc.attr(pair, "name"), Some("promotable"));
        assert_eq!(doc.attr(pair, "value"), Some("true"));
        assert!(!doc.upgrade_to(SchemaVersion::LATEST).unwrap());
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(Tag::from_name("acl_permission"), Tag::AclPermission);
        assert_eq!(Tag::PortMapping.as_str(), "port-mapping");
        assert_eq!(Tag::from_name("rsc_order"), Tag::Custom("rsc_order".into()));
        assert_eq!(Tag::Custom("rsc_order".into()).as_str(), "rsc_order");
    }
}
