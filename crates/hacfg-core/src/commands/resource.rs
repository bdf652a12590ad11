//! Resource commands.

use super::find_all;
use crate::cib::document::SchemaVersion;
use crate::cib::resource::agent::{AgentMetadata, ResourceAgentName};
use crate::cib::resource::primitive::{self, PrimitiveRequest};
use crate::cib::resource::{bundle, clone, common, group};
use crate::cib::resource::{find_bundle, find_resource};
use crate::env::Environment;
use crate::error::Result;
use crate::report::{ForceFlags, ReportList};
use crate::resource_args::{BundleCreateOptions, BundleUpdateOptions, CloneOptions, PrimitiveOptions};
use crate::status::ExpectedState;
use tracing::info;

/// Request to create one primitive.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// New resource id.
    pub resource_id: String,
    /// Agent name, `standard[:provider]:type`; the fencing agent type for
    /// stonith commands.
    pub agent_name: String,
    /// Grouped options.
    pub options: PrimitiveOptions,
    /// Agent metadata, when known.
    pub metadata: Option<AgentMetadata>,
    /// Add the agent's recommended operations not given explicitly.
    pub use_default_operations: bool,
    /// Create the resource disabled.
    pub ensure_disabled: bool,
    /// Granted overrides.
    pub force_flags: ForceFlags,
}

/// Where a new primitive goes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Placement<'a> {
    Resources,
    Group {
        group_id: &'a str,
        adjacent_id: Option<&'a str>,
        put_after_adjacent: bool,
    },
    Clone {
        options: &'a CloneOptions,
        promotable: bool,
    },
    Bundle(&'a str),
}

impl Placement<'_> {
    fn minimal_version(&self) -> Option<SchemaVersion> {
        match self {
            Placement::Bundle(_) => Some(SchemaVersion::BUNDLE),
            Placement::Clone {
                promotable: true, ..
            } => Some(SchemaVersion::PROMOTABLE),
            _ => None,
        }
    }

    /// Returns true if the wrapper options alone keep the resource stopped.
    fn disables_resource(&self) -> bool {
        match self {
            Placement::Clone { options, .. } => common::are_clone_meta_disabled(&options.meta_attrs),
            _ => false,
        }
    }
}

/// Creates a primitive and places it, shared by resource and stonith
/// commands.
pub(crate) async fn create_primitive(
    env: &mut Environment,
    request: &CreateRequest,
    agent: &ResourceAgentName,
    placement: Placement<'_>,
) -> Result<ReportList> {
    let mut transaction = env.transaction(placement.minimal_version()).await?;
    transaction.mutate(|doc, provider, reports| {
        let resources = doc.get_resources()?;
        let primitive_request = PrimitiveRequest {
            id: &request.resource_id,
            agent,
            options: &request.options,
            metadata: request.metadata.as_ref(),
            use_default_operations: request.use_default_operations,
            force_flags: &request.force_flags,
        };
        let primitive = primitive::create(doc, resources, &primitive_request, provider, reports)?;
        let mut to_disable = primitive;
        match placement {
            Placement::Resources => {}
            Placement::Group {
                group_id,
                adjacent_id,
                put_after_adjacent,
            } => {
                let group = group::provide_group(doc, resources, group_id)?;
                group::place_resource(doc, group, primitive, adjacent_id, put_after_adjacent)?;
            }
            Placement::Clone {
                options,
                promotable,
            } => {
                let mut meta = options.meta_attrs.clone();
                if promotable {
                    meta.insert("promotable".to_string(), "true".to_string());
                }
                to_disable = clone::append_new(
                    doc,
                    primitive,
                    &meta,
                    options.clone_id.as_deref(),
                    provider,
                )?;
            }
            Placement::Bundle(bundle_id) => {
                let bundle = find_bundle(doc, bundle_id)?;
                bundle::add_resource(doc, bundle, primitive)?;
            }
        }
        if request.ensure_disabled {
            common::disable(doc, to_disable, Some(provider));
        }
        Ok(())
    })?;
    let disabled = request.ensure_disabled
        || common::are_meta_disabled(&request.options.meta_attrs)
        || placement.disables_resource();
    transaction.expect_state(ExpectedState {
        resource_id: request.resource_id.clone(),
        running: !disabled,
    });
    let reports = transaction.commit().await?;
    info!(resource_id = %request.resource_id, agent = %agent, "created resource");
    Ok(reports)
}

/// Creates a primitive at the top level of the resources section.
pub async fn create(env: &mut Environment, request: &CreateRequest) -> Result<ReportList> {
    let agent = ResourceAgentName::parse(&request.agent_name)?;
    create_primitive(env, request, &agent, Placement::Resources).await
}

/// Creates a primitive wrapped in a new clone.
pub async fn create_as_clone(
    env: &mut Environment,
    request: &CreateRequest,
    clone_options: &CloneOptions,
) -> Result<ReportList> {
    let agent = ResourceAgentName::parse(&request.agent_name)?;
    let placement = Placement::Clone {
        options: clone_options,
        promotable: false,
    };
    create_primitive(env, request, &agent, placement).await
}

/// Creates a primitive wrapped in a new promotable clone.
pub async fn create_as_promotable(
    env: &mut Environment,
    request: &CreateRequest,
    clone_options: &CloneOptions,
) -> Result<ReportList> {
    let agent = ResourceAgentName::parse(&request.agent_name)?;
    let placement = Placement::Clone {
        options: clone_options,
        promotable: true,
    };
    create_primitive(env, request, &agent, placement).await
}

/// Creates a primitive inside a group, creating the group when missing.
pub async fn create_in_group(
    env: &mut Environment,
    request: &CreateRequest,
    group_id: &str,
    adjacent_id: Option<&str>,
    put_after_adjacent: bool,
) -> Result<ReportList> {
    let agent = ResourceAgentName::parse(&request.agent_name)?;
    let placement = Placement::Group {
        group_id,
        adjacent_id,
        put_after_adjacent,
    };
    create_primitive(env, request, &agent, placement).await
}

/// Creates a primitive inside an existing, empty bundle.
pub async fn create_into_bundle(
    env: &mut Environment,
    request: &CreateRequest,
    bundle_id: &str,
) -> Result<ReportList> {
    let agent = ResourceAgentName::parse(&request.agent_name)?;
    create_primitive(env, request, &agent, Placement::Bundle(bundle_id)).await
}

/// Creates a bundle.
pub async fn bundle_create(
    env: &mut Environment,
    bundle_id: &str,
    options: &BundleCreateOptions,
    force_flags: &ForceFlags,
    ensure_disabled: bool,
) -> Result<ReportList> {
    let mut transaction = env.transaction(Some(SchemaVersion::BUNDLE)).await?;
    transaction.mutate(|doc, provider, reports| {
        let resources = doc.get_resources()?;
        let bundle = bundle::create(doc, resources, bundle_id, options, force_flags, provider, reports)?;
        if ensure_disabled {
            common::disable(doc, bundle, Some(provider));
        }
        Ok(())
    })?;
    transaction.expect_state(ExpectedState {
        resource_id: bundle_id.to_string(),
        running: !(ensure_disabled || common::are_meta_disabled(&options.meta_attrs)),
    });
    transaction.commit().await
}

/// Replaces the configuration of a bundle, keeping its inner resource.
pub async fn bundle_reset(
    env: &mut Environment,
    bundle_id: &str,
    options: &BundleCreateOptions,
    force_flags: &ForceFlags,
    ensure_disabled: bool,
) -> Result<ReportList> {
    let mut transaction = env.transaction(Some(SchemaVersion::BUNDLE)).await?;
    transaction.mutate(|doc, provider, reports| {
        let bundle = find_bundle(doc, bundle_id)?;
        bundle::reset(doc, bundle, options, force_flags, provider, reports)?;
        if ensure_disabled {
            common::disable(doc, bundle, Some(provider));
        }
        Ok(())
    })?;
    transaction.expect_state(ExpectedState {
        resource_id: bundle_id.to_string(),
        running: !(ensure_disabled || common::are_meta_disabled(&options.meta_attrs)),
    });
    transaction.commit().await
}

/// Updates a bundle.
pub async fn bundle_update(
    env: &mut Environment,
    bundle_id: &str,
    options: &BundleUpdateOptions,
    force_flags: &ForceFlags,
) -> Result<ReportList> {
    let mut transaction = env.transaction(Some(SchemaVersion::BUNDLE)).await?;
    transaction.mutate(|doc, provider, reports| {
        let bundle = find_bundle(doc, bundle_id)?;
        bundle::update(doc, bundle, options, force_flags, provider, reports)
    })?;
    transaction.commit().await
}

/// Disables resources; every id is looked up before anything changes.
pub async fn disable(env: &mut Environment, resource_ids: &[String]) -> Result<ReportList> {
    let mut transaction = env.transaction(None).await?;
    transaction.mutate(|doc, provider, reports| {
        for element in find_all(doc, resource_ids, find_resource, reports)? {
            common::disable(doc, element, Some(&mut *provider));
        }
        Ok(())
    })?;
    for id in resource_ids {
        transaction.expect_state(ExpectedState::stopped(id.as_str()));
    }
    transaction.commit().await
}

/// Enables resources together with the groups, clones and bundles
/// wrapping them.
pub async fn enable(env: &mut Environment, resource_ids: &[String]) -> Result<ReportList> {
    let mut transaction = env.transaction(None).await?;
    transaction.mutate(|doc, _, reports| {
        for element in find_all(doc, resource_ids, find_resource, reports)? {
            for resource in common::resource_and_wrappers(doc, element) {
                common::enable(doc, resource);
            }
        }
        Ok(())
    })?;
    for id in resource_ids {
        transaction.expect_state(ExpectedState::running(id.as_str()));
    }
    transaction.commit().await
}

/// Deletes a resource together with emptied wrappers and the ACL
/// permissions referencing it.
pub async fn delete(env: &mut Environment, resource_id: &str) -> Result<ReportList> {
    let mut transaction = env.transaction(None).await?;
    let removed = transaction.mutate(|doc, _, _| crate::cib::resource::delete(doc, resource_id))?;
    for id in removed {
        transaction.expect_state(ExpectedState::stopped(id));
    }
    transaction.commit().await
}
