//! Primitive resources and their operations.

use super::agent::{AgentMetadata, ResourceAgentName};
use crate::cib::document::{Document, NodeId, Tag};
use crate::cib::ids::IdProvider;
use crate::cib::nvpair::{arrange_first_instance_attributes, arrange_first_meta_attributes};
use crate::error::{checkpoint, Result};
use crate::report::{ForceCode, ForceFlags, ReportItem, ReportKind, ReportList};
use crate::resource_args::{Options, PrimitiveOptions};
use crate::validate::{
    is_required, names_in, option_value_normalization, pairs_to_values,
    run_collection_of_option_validators, value_in, values_to_pairs, Normalizer, Validator,
};
use std::collections::HashMap;
use tracing::debug;

/// Attributes an operation may carry.
pub const OPERATION_OPTIONS: [&str; 12] = [
    "OCF_CHECK_LEVEL",
    "description",
    "enabled",
    "id",
    "interval",
    "interval-origin",
    "name",
    "on-fail",
    "record-pending",
    "role",
    "start-delay",
    "timeout",
];

const ROLE_VALUES: [&str; 4] = ["Stopped", "Started", "Promoted", "Unpromoted"];
const ON_FAIL_VALUES: [&str; 8] = [
    "ignore",
    "block",
    "demote",
    "stop",
    "restart",
    "standby",
    "fence",
    "restart-container",
];
const BOOLEAN_VALUES: [&str; 10] = [
    "true", "false", "on", "off", "yes", "no", "y", "n", "1", "0",
];

/// Interval of the monitor operation added when none is given.
pub const DEFAULT_MONITOR_INTERVAL: &str = "60s";

fn normalize_role(value: &str) -> String {
    let lower = value.to_lowercase();
    match lower.as_str() {
        "master" => "Promoted".to_string(),
        "slave" => "Unpromoted".to_string(),
        _ => {
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn normalize_lower(value: &str) -> String {
    value.to_lowercase()
}

/// Request to create one primitive.
#[derive(Debug, Clone)]
pub struct PrimitiveRequest<'a> {
    /// New resource id.
    pub id: &'a str,
    /// Agent.
    pub agent: &'a ResourceAgentName,
    /// Grouped options.
    pub options: &'a PrimitiveOptions,
    /// Agent metadata, when known.
    pub metadata: Option<&'a AgentMetadata>,
    /// Add the agent's recommended operations not given explicitly.
    pub use_default_operations: bool,
    /// Granted overrides.
    pub force_flags: &'a ForceFlags,
}

/// Validates and normalizes operations.
///
/// Returns the operations with normalized values together with the
/// diagnostics; nothing is written.
pub fn validate_operations(
    operations: &[Options],
    metadata: Option<&AgentMetadata>,
    force_flags: &ForceFlags,
) -> (Vec<Options>, ReportList) {
    let mut reports = ReportList::new();
    let mut normalization: HashMap<&'static str, Normalizer> = HashMap::new();
    normalization.insert("role", normalize_role);
    normalization.insert("on-fail", normalize_lower);
    normalization.insert("record-pending", normalize_lower);
    let normalize = option_value_normalization(normalization);
    let validators: Vec<Validator> = vec![
        is_required("name", "resource operation"),
        value_in("role", &ROLE_VALUES),
        value_in("on-fail", &ON_FAIL_VALUES),
        value_in("record-pending", &BOOLEAN_VALUES),
    ];
    let action_names: Vec<&str> = metadata.map(|m| m.action_names()).unwrap_or_default();

    let mut normalized = Vec::with_capacity(operations.len());
    for operation in operations {
        reports.extend(names_in(
            &OPERATION_OPTIONS,
            operation.keys().map(String::as_str),
            "resource operation",
            Some(ForceCode::Force),
            force_flags.is_forced(ForceCode::Force),
        ));
        let pairs = values_to_pairs(operation, &normalize);
        reports.extend(run_collection_of_option_validators(&pairs, &validators));
        if let Some(name) = operation.get("name") {
            if !action_names.is_empty() && !action_names.contains(&name.as_str()) {
                reports.push(ReportItem::forceable(
                    ReportKind::InvalidOptionValue {
                        option_name: "operation name".to_string(),
                        option_value: name.clone(),
                        allowed_values: action_names.iter().map(|a| a.to_string()).collect(),
                    },
                    Some(ForceCode::ForceOperation),
                    force_flags.is_forced(ForceCode::ForceOperation),
                ));
            }
        }
        normalized.push(pairs_to_values(&pairs));
    }
    (normalized, reports)
}

/// Validates instance attributes against agent metadata.
pub fn validate_instance_attributes(
    instance_attrs: &Options,
    metadata: Option<&AgentMetadata>,
    force_flags: &ForceFlags,
) -> Vec<ReportItem> {
    let Some(metadata) = metadata else {
        return vec![];
    };
    let forced = force_flags.is_forced(ForceCode::ForceOptions);
    let mut reports = names_in(
        &metadata.parameter_names(),
        instance_attrs.keys().map(String::as_str),
        "resource",
        Some(ForceCode::ForceOptions),
        forced,
    );
    let missing: Vec<String> = metadata
        .required_parameters()
        .into_iter()
        .filter(|p| !instance_attrs.contains_key(*p))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        reports.push(ReportItem::forceable(
            ReportKind::RequiredOptionIsMissing {
                option_names: missing,
                option_type: "resource".to_string(),
            },
            Some(ForceCode::ForceOptions),
            forced,
        ));
    }
    reports
}

/// Adds a `monitor` operation when none is given and, on request, the
/// agent's recommended operations missing from `operations`.
pub fn complete_operations(
    operations: Vec<Options>,
    metadata: Option<&AgentMetadata>,
    use_default_operations: bool,
) -> Vec<Options> {
    let mut result = operations;
    let has = |ops: &[Options], name: &str| ops.iter().any(|o| o.get("name").map(String::as_str) == Some(name));
    if use_default_operations {
        if let Some(metadata) = metadata {
            for action in &metadata.actions {
                if action.role.is_some() || has(&result, &action.name) {
                    continue;
                }
                let mut op = Options::new();
                op.insert("name".to_string(), action.name.clone());
                op.insert(
                    "interval".to_string(),
                    action.interval.clone().unwrap_or_else(|| "0s".to_string()),
                );
                if let Some(timeout) = &action.timeout {
                    op.insert("timeout".to_string(), timeout.clone());
                }
                result.push(op);
            }
        }
    }
    if !has(&result, "monitor") {
        let mut op = Options::new();
        op.insert("name".to_string(), "monitor".to_string());
        op.insert("interval".to_string(), DEFAULT_MONITOR_INTERVAL.to_string());
        result.push(op);
    }
    result
}

fn append_operations(
    doc: &mut Document,
    primitive: NodeId,
    operations: &[Options],
    provider: &mut IdProvider,
) {
    let resource_id = doc.id_of(primitive).to_string();
    let container = doc.append_new(primitive, Tag::Operations);
    for operation in operations {
        let name = operation.get("name").cloned().unwrap_or_default();
        let interval = operation
            .get("interval")
            .cloned()
            .unwrap_or_else(|| "0s".to_string());
        let id = match operation.get("id") {
            Some(id) => id.clone(),
            None => provider.allocate(doc, &format!("{resource_id}-{name}-interval-{interval}")),
        };
        let op = doc.append_new_with_id(container, Tag::Op, &id);
        doc.set_attr(op, "interval", &interval);
        for (key, value) in operation {
            if key != "id" && key != "interval" && key != "OCF_CHECK_LEVEL" {
                doc.set_attr(op, key, value);
            }
        }
        if let Some(level) = operation.get("OCF_CHECK_LEVEL") {
            let attrs = [("OCF_CHECK_LEVEL".to_string(), level.clone())].into_iter().collect();
            arrange_first_instance_attributes(doc, op, &attrs, Some(&mut *provider));
        }
    }
}

/// Validates a primitive request and appends the primitive to `parent`.
///
/// Warnings go to `reports`; when any error is found the document is not
/// touched and every diagnostic is returned in the error.
pub fn create(
    doc: &mut Document,
    parent: NodeId,
    request: &PrimitiveRequest<'_>,
    provider: &mut IdProvider,
    reports: &mut ReportList,
) -> Result<NodeId> {
    let mut found = ReportList::new();
    found.extend(provider.book_new_id(doc, request.id, "resource name"));
    let (operations, op_reports) = validate_operations(
        &request.options.operations,
        request.metadata,
        request.force_flags,
    );
    found.extend(op_reports);
    for operation in &operations {
        if let Some(id) = operation.get("id") {
            found.extend(provider.book_new_id(doc, id, "operation id"));
        }
    }
    found.extend(validate_instance_attributes(
        &request.options.instance_attrs,
        request.metadata,
        request.force_flags,
    ));
    checkpoint(found, reports)?;

    let primitive = doc.append_new_with_id(parent, Tag::Primitive, request.id);
    doc.set_attr(primitive, "class", &request.agent.standard);
    if let Some(provider_name) = &request.agent.provider {
        doc.set_attr(primitive, "provider", provider_name);
    }
    doc.set_attr(primitive, "type", &request.agent.agent_type);
    arrange_first_instance_attributes(
        doc,
        primitive,
        &request.options.instance_attrs,
        Some(&mut *provider),
    );
    arrange_first_meta_attributes(
        doc,
        primitive,
        &request.options.meta_attrs,
        Some(&mut *provider),
    );
    let operations = complete_operations(operations, request.metadata, request.use_default_operations);
    append_operations(doc, primitive, &operations, provider);
    debug!(resource_id = request.id, agent = %request.agent, "created primitive");
    Ok(primitive)
}
