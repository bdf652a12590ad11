//! ACL commands. ACLs need schema 2.0 at least; older documents are
//! upgraded first. None of these commands waits for the cluster.

use crate::args::PermissionInfo;
use crate::cib::acl::{self, AclConfig};
use crate::cib::document::{Document, NodeId, SchemaVersion, Tag};
use crate::cib::ids::IdProvider;
use crate::env::Environment;
use crate::error::{CoreError, Result};
use crate::report::ReportList;

/// Runs `mutation` over the `acls` section in one transaction.
async fn in_acls<F>(env: &mut Environment, mutation: F) -> Result<ReportList>
where
    F: FnOnce(&mut Document, NodeId) -> Result<()>,
{
    let mut transaction = env.transaction_no_wait(Some(SchemaVersion::ACL)).await?;
    transaction.mutate(|doc: &mut Document, _: &mut IdProvider, _: &mut ReportList| {
        let acls = doc.provide_acls()?;
        mutation(doc, acls)
    })?;
    transaction.commit().await
}

/// Creates a role, optionally with a description and permissions.
pub async fn create_role(
    env: &mut Environment,
    role_id: &str,
    permissions: &[PermissionInfo],
    description: Option<&str>,
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        if !permissions.is_empty() {
            let reports = acl::validate_permissions(doc, permissions);
            if !reports.is_empty() {
                return Err(CoreError::Reports(reports.into()));
            }
        }
        let role = acl::create_role(doc, acls, role_id, description)?;
        acl::add_permissions_to_role(doc, role, permissions);
        Ok(())
    })
    .await
}

/// Removes a role; with `autodelete_users_groups` emptied targets and
/// groups go too.
pub async fn remove_role(
    env: &mut Environment,
    role_id: &str,
    autodelete_users_groups: bool,
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        acl::remove_role(doc, acls, role_id, autodelete_users_groups)
    })
    .await
}

/// Assigns a role to a target or, when no such target exists, a group.
pub async fn assign_role_not_specific(
    env: &mut Environment,
    role_id: &str,
    target_or_group_id: &str,
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let target = acl::find_target_or_group(doc, acls, target_or_group_id)?;
        acl::assign_role(doc, acls, role_id, target)
    })
    .await
}

/// Assigns a role to a target.
pub async fn assign_role_to_target(
    env: &mut Environment,
    role_id: &str,
    target_id: &str,
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let target = acl::find(doc, acls, Tag::AclTarget, target_id, None)?;
        acl::assign_role(doc, acls, role_id, target)
    })
    .await
}

/// Assigns a role to a group.
pub async fn assign_role_to_group(
    env: &mut Environment,
    role_id: &str,
    group_id: &str,
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let group = acl::find(doc, acls, Tag::AclGroup, group_id, None)?;
        acl::assign_role(doc, acls, role_id, group)
    })
    .await
}

/// Unassigns a role from a target or, when no such target exists, a group.
pub async fn unassign_role_not_specific(
    env: &mut Environment,
    role_id: &str,
    target_or_group_id: &str,
    autodelete_target_group: bool,
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let target = acl::find_target_or_group(doc, acls, target_or_group_id)?;
        acl::unassign_role(doc, target, role_id, autodelete_target_group)
    })
    .await
}

/// Creates a target holding `role_ids`.
pub async fn create_target(
    env: &mut Environment,
    target_id: &str,
    role_ids: &[String],
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let target = acl::create_target(doc, acls, target_id)?;
        acl::assign_all_roles(doc, acls, role_ids, target)
    })
    .await
}

/// Creates a group holding `role_ids`.
pub async fn create_group(
    env: &mut Environment,
    group_id: &str,
    role_ids: &[String],
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let group = acl::create_group(doc, acls, group_id)?;
        acl::assign_all_roles(doc, acls, role_ids, group)
    })
    .await
}

/// Removes a target.
pub async fn remove_target(env: &mut Environment, target_id: &str) -> Result<ReportList> {
    in_acls(env, |doc, acls| acl::remove_target(doc, acls, target_id)).await
}

/// Removes a group.
pub async fn remove_group(env: &mut Environment, group_id: &str) -> Result<ReportList> {
    in_acls(env, |doc, acls| acl::remove_group(doc, acls, group_id)).await
}

/// Adds permissions to a role, creating the role when missing. Either
/// every permission is added or none.
pub async fn add_permission(
    env: &mut Environment,
    role_id: &str,
    permissions: &[PermissionInfo],
) -> Result<ReportList> {
    in_acls(env, |doc, acls| {
        let reports = acl::validate_permissions(doc, permissions);
        if !reports.is_empty() {
            return Err(CoreError::Reports(reports.into()));
        }
        let role = acl::provide_role(doc, acls, role_id)?;
        acl::add_permissions_to_role(doc, role, permissions);
        Ok(())
    })
    .await
}

/// Removes a permission.
pub async fn remove_permission(env: &mut Environment, permission_id: &str) -> Result<ReportList> {
    in_acls(env, |doc, acls| acl::remove_permission(doc, acls, permission_id)).await
}

/// Lists roles, targets and groups.
pub async fn get_config(env: &mut Environment) -> Result<AclConfig> {
    let doc = env.get_document(Some(SchemaVersion::ACL)).await?;
    Ok(acl::get_config(&doc))
}
