//! Access control lists: roles, permissions, targets (users) and groups.
//!
//! All functions take the `acls` section; callers obtain it with
//! [`Document::provide_acls`].

use super::document::{Document, NodeId, Tag};
use super::ids::{check_new_id_applicable, does_id_exist, find_element_by_id, find_unique_id};
use crate::args::PermissionInfo;
use crate::error::{CoreError, Result};
use crate::report::{ReportItem, ReportKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

const ALLOWED_KINDS: [&str; 3] = ["read", "write", "deny"];
const ALLOWED_SCOPE_TYPES: [&str; 2] = ["xpath", "id"];

fn description_of(tag: &Tag) -> &'static str {
    match tag {
        Tag::AclGroup => "group",
        Tag::AclRole => "role",
        Tag::AclTarget => "user",
        _ => "permission",
    }
}

/// Validates permission tuples.
///
/// Every tuple is checked and all problems are returned together.
pub fn validate_permissions(doc: &Document, permissions: &[PermissionInfo]) -> Vec<ReportItem> {
    let mut reports = Vec::new();
    for permission in permissions {
        if !ALLOWED_KINDS.contains(&permission.kind.as_str()) {
            reports.push(ReportItem::error(ReportKind::InvalidOptionValue {
                option_name: "permission".to_string(),
                option_value: permission.kind.clone(),
                allowed_values: ALLOWED_KINDS.iter().map(|s| s.to_string()).collect(),
            }));
        }
        if !ALLOWED_SCOPE_TYPES.contains(&permission.scope_type.as_str()) {
            reports.push(ReportItem::error(ReportKind::InvalidOptionValue {
                option_name: "scope type".to_string(),
                option_value: permission.scope_type.clone(),
                allowed_values: ALLOWED_SCOPE_TYPES.iter().map(|s| s.to_string()).collect(),
            }));
        }
        if permission.scope_type == "id" && !does_id_exist(doc, &permission.scope) {
            reports.push(ReportItem::error(ReportKind::IdNotFound {
                id: permission.scope.clone(),
                id_description: "id".to_string(),
                context_type: None,
                context_id: None,
            }));
        }
    }
    reports
}

/// Looks up an ACL element by tag and id.
pub fn find(
    doc: &Document,
    acls: NodeId,
    tag: Tag,
    id: &str,
    id_description: Option<&str>,
) -> Result<NodeId> {
    if let Some(found) = find_optional(doc, acls, &tag, id) {
        return Ok(found);
    }
    let report = match find_element_by_id(doc, id) {
        Some(other) => ReportKind::IdBelongsToUnexpectedType {
            id: id.to_string(),
            expected_types: vec![tag.as_str().to_string()],
            current_type: doc.tag(other).map(|t| t.as_str().to_string()).unwrap_or_default(),
        },
        None => ReportKind::IdNotFound {
            id: id.to_string(),
            id_description: id_description.unwrap_or(description_of(&tag)).to_string(),
            context_type: None,
            context_id: None,
        },
    };
    Err(CoreError::report(ReportItem::error(report)))
}

fn find_optional(doc: &Document, acls: NodeId, tag: &Tag, id: &str) -> Option<NodeId> {
    doc.find_by_tag_and_id(acls, std::slice::from_ref(tag), id)
}

/// Returns the target with `id`, or the group when there is no such target.
pub fn find_target_or_group(doc: &Document, acls: NodeId, id: &str) -> Result<NodeId> {
    if let Some(target) = find_optional(doc, acls, &Tag::AclTarget, id) {
        return Ok(target);
    }
    find(doc, acls, Tag::AclGroup, id, Some("user/group"))
}

/// Creates a role.
pub fn create_role(
    doc: &mut Document,
    acls: NodeId,
    role_id: &str,
    description: Option<&str>,
) -> Result<NodeId> {
    check_new_id_applicable(doc, role_id, "ACL role")?;
    let role = doc.append_new_with_id(acls, Tag::AclRole, role_id);
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        doc.set_attr(role, "description", description);
    }
    debug!(role_id, "created acl role");
    Ok(role)
}

/// Returns role `role_id`, creating it when missing.
pub fn provide_role(doc: &mut Document, acls: NodeId, role_id: &str) -> Result<NodeId> {
    match find_optional(doc, acls, &Tag::AclRole, role_id) {
        Some(role) => Ok(role),
        None => create_role(doc, acls, role_id, None),
    }
}

/// Removes a role and every reference to it.
///
/// With `autodelete_targets`, targets and groups left without any role by
/// this removal are removed as well.
pub fn remove_role(
    doc: &mut Document,
    acls: NodeId,
    role_id: &str,
    autodelete_targets: bool,
) -> Result<()> {
    let role = find(doc, acls, Tag::AclRole, role_id, None)?;
    doc.remove(role);
    for reference in doc.find_by_tag(acls, &Tag::Role) {
        if doc.attr(reference, "id") != Some(role_id) {
            continue;
        }
        let owner = doc.parent(reference);
        doc.remove(reference);
        if let Some(owner) = owner {
            if autodelete_targets && doc.find_by_tag(owner, &Tag::Role).is_empty() {
                doc.remove(owner);
            }
        }
    }
    debug!(role_id, autodelete_targets, "removed acl role");
    Ok(())
}

fn assigned_role(doc: &Document, target: NodeId, role_id: &str) -> Option<NodeId> {
    doc.children_by_tag(target, &Tag::Role)
        .into_iter()
        .find(|r| doc.attr(*r, "id") == Some(role_id))
}

/// Assigns an existing role to a target or group.
pub fn assign_role(doc: &mut Document, acls: NodeId, role_id: &str, target: NodeId) -> Result<()> {
    let role = find(doc, acls, Tag::AclRole, role_id, None)?;
    let role_id = doc.id_of(role).to_string();
    if assigned_role(doc, target, &role_id).is_some() {
        return Err(CoreError::report(ReportItem::error(
            ReportKind::AclRoleIsAlreadyAssignedToTarget {
                role_id,
                target_id: doc.id_of(target).to_string(),
            },
        )));
    }
    doc.append_new_with_id(target, Tag::Role, &role_id);
    Ok(())
}

/// Assigns every role of `role_ids`; stops at the first failure.
pub fn assign_all_roles(
    doc: &mut Document,
    acls: NodeId,
    role_ids: &[String],
    target: NodeId,
) -> Result<()> {
    for role_id in role_ids {
        assign_role(doc, acls, role_id, target)?;
    }
    Ok(())
}

/// Unassigns a role from a target or group, optionally removing the
/// target when it has no role left.
pub fn unassign_role(
    doc: &mut Document,
    target: NodeId,
    role_id: &str,
    autodelete_target: bool,
) -> Result<()> {
    let Some(assigned) = assigned_role(doc, target, role_id) else {
        return Err(CoreError::report(ReportItem::error(
            ReportKind::AclRoleIsNotAssignedToTarget {
                role_id: role_id.to_string(),
                target_id: doc.id_of(target).to_string(),
            },
        )));
    };
    doc.remove(assigned);
    if autodelete_target && doc.children_by_tag(target, &Tag::Role).is_empty() {
        doc.remove(target);
    }
    Ok(())
}

/// Creates a target.
///
/// Target ids are user names, only other targets are checked for a clash.
pub fn create_target(doc: &mut Document, acls: NodeId, target_id: &str) -> Result<NodeId> {
    if find_optional(doc, acls, &Tag::AclTarget, target_id).is_some() {
        return Err(CoreError::report(ReportItem::error(
            ReportKind::AclTargetAlreadyExists {
                target_id: target_id.to_string(),
            },
        )));
    }
    Ok(doc.append_new_with_id(acls, Tag::AclTarget, target_id))
}

/// Creates a group.
pub fn create_group(doc: &mut Document, acls: NodeId, group_id: &str) -> Result<NodeId> {
    check_new_id_applicable(doc, group_id, "ACL group")?;
    Ok(doc.append_new_with_id(acls, Tag::AclGroup, group_id))
}

/// Removes a target.
pub fn remove_target(doc: &mut Document, acls: NodeId, target_id: &str) -> Result<()> {
    let target = find(doc, acls, Tag::AclTarget, target_id, None)?;
    doc.remove(target);
    Ok(())
}

/// Removes a group.
pub fn remove_group(doc: &mut Document, acls: NodeId, group_id: &str) -> Result<()> {
    let group = find(doc, acls, Tag::AclGroup, group_id, None)?;
    doc.remove(group);
    Ok(())
}

/// Adds already validated permissions to `role`.
///
/// Permission ids are `<role>-<kind>` made unique; the scope is stored as
/// `xpath` or `reference`.
pub fn add_permissions_to_role(doc: &mut Document, role: NodeId, permissions: &[PermissionInfo]) {
    let role_id = match doc.id_of(role) {
        "" => "role".to_string(),
        id => id.to_string(),
    };
    let mut booked = HashSet::new();
    for permission in permissions {
        let id = find_unique_id(doc, &format!("{}-{}", role_id, permission.kind), &booked);
        booked.insert(id.clone());
        let element = doc.append_new_with_id(role, Tag::AclPermission, &id);
        doc.set_attr(element, "kind", &permission.kind);
        let scope_attr = if permission.scope_type == "id" {
            "reference"
        } else {
            "xpath"
        };
        doc.set_attr(element, scope_attr, &permission.scope);
    }
}

/// Validates every tuple, then adds all of them or none.
pub fn add_permissions(
    doc: &mut Document,
    role: NodeId,
    permissions: &[PermissionInfo],
) -> Result<()> {
    let reports = validate_permissions(doc, permissions);
    if !reports.is_empty() {
        return Err(CoreError::Reports(reports.into()));
    }
    add_permissions_to_role(doc, role, permissions);
    Ok(())
}

/// Removes a permission.
pub fn remove_permission(doc: &mut Document, acls: NodeId, permission_id: &str) -> Result<()> {
    let permission = find(doc, acls, Tag::AclPermission, permission_id, None)?;
    doc.remove(permission);
    Ok(())
}

/// Removes every permission referencing `reference`. Running it again is
/// a no-op.
pub fn remove_permissions_referencing(doc: &mut Document, scope: NodeId, reference: &str) {
    for permission in doc.find_by_tag(scope, &Tag::AclPermission) {
        if doc.attr(permission, "reference") == Some(reference) {
            doc.remove(permission);
        }
    }
}

/// A permission as listed by [`get_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDto {
    /// Permission id.
    pub id: String,
    /// Optional description.
    pub description: Option<String>,
    /// read, write or deny.
    pub kind: Option<String>,
    /// XPath scope.
    pub xpath: Option<String>,
    /// Referenced element id.
    pub reference: Option<String>,
    /// Object type scope.
    #[serde(rename = "object-type")]
    pub object_type: Option<String>,
    /// Attribute scope.
    pub attribute: Option<String>,
}

/// A role with its permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDto {
    /// Role id.
    pub id: String,
    /// Optional description.
    pub description: Option<String>,
    /// Permissions in document order.
    pub permission_list: Vec<PermissionDto>,
}

/// A target or group with its assigned role ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDto {
    /// Target or group id.
    pub id: String,
    /// Assigned role ids.
    pub role_list: Vec<String>,
}

/// Whole ACL configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclConfig {
    /// Roles.
    pub role_list: Vec<RoleDto>,
    /// Targets (users).
    pub target_list: Vec<TargetDto>,
    /// Groups.
    pub group_list: Vec<TargetDto>,
}

fn attr_owned(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    doc.attr(node, name).map(str::to_string)
}

/// Roles of the section.
pub fn get_role_list(doc: &Document, acls: NodeId) -> Vec<RoleDto> {
    doc.children_by_tag(acls, &Tag::AclRole)
        .into_iter()
        .map(|role| RoleDto {
            id: doc.id_of(role).to_string(),
            description: attr_owned(doc, role, "description"),
            permission_list: doc
                .children_by_tag(role, &Tag::AclPermission)
                .into_iter()
                .map(|p| PermissionDto {
                    id: doc.id_of(p).to_string(),
                    description: attr_owned(doc, p, "description"),
                    kind: attr_owned(doc, p, "kind"),
                    xpath: attr_owned(doc, p, "xpath"),
                    reference: attr_owned(doc, p, "reference"),
                    object_type: attr_owned(doc, p, "object-type"),
                    attribute: attr_owned(doc, p, "attribute"),
                })
                .collect(),
        })
        .collect()
}

fn get_target_like_list(doc: &Document, acls: NodeId, tag: &Tag) -> Vec<TargetDto> {
    doc.children_by_tag(acls, tag)
        .into_iter()
        .map(|target| TargetDto {
            id: doc.id_of(target).to_string(),
            role_list: doc
                .children_by_tag(target, &Tag::Role)
                .into_iter()
                .filter_map(|r| attr_owned(doc, r, "id").filter(|id| !id.is_empty()))
                .collect(),
        })
        .collect()
}

/// Targets of the section.
pub fn get_target_list(doc: &Document, acls: NodeId) -> Vec<TargetDto> {
    get_target_like_list(doc, acls, &Tag::AclTarget)
}

/// Groups of the section.
pub fn get_group_list(doc: &Document, acls: NodeId) -> Vec<TargetDto> {
    get_target_like_list(doc, acls, &Tag::AclGroup)
}

/// Roles, targets and groups; empty when the document has no ACL section.
pub fn get_config(doc: &Document) -> AclConfig {
    match doc.get_acls() {
        Some(acls) => AclConfig {
            role_list: get_role_list(doc, acls),
            target_list: get_target_list(doc, acls),
            group_list: get_group_list(doc, acls),
        },
        None => AclConfig::default(),
    }
}
