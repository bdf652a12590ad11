//! Bundles: a container definition optionally running one primitive.

use crate::cib::document::{Document, NodeId, Tag};
use crate::cib::ids::IdProvider;
use crate::cib::nvpair::arrange_first_meta_attributes;
use crate::error::{checkpoint, CoreError, Result};
use crate::report::{ForceCode, ForceFlags, ReportItem, ReportKind, ReportList};
use crate::resource_args::{BundleCreateOptions, BundleUpdateOptions, Options};
use crate::validate::{
    is_required, mutually_exclusive, names_in, plain_pairs, run_collection_of_option_validators,
};
use tracing::debug;

/// Supported container engines.
pub const CONTAINER_TYPES: [&str; 3] = ["docker", "podman", "rkt"];

const CONTAINER_OPTIONS: [&str; 7] = [
    "image",
    "network",
    "options",
    "promoted-max",
    "replicas",
    "replicas-per-host",
    "run-command",
];
const NETWORK_OPTIONS: [&str; 5] = [
    "add-host",
    "control-port",
    "host-interface",
    "host-netmask",
    "ip-range-start",
];
const PORT_MAP_OPTIONS: [&str; 4] = ["id", "internal-port", "port", "range"];
const STORAGE_MAP_OPTIONS: [&str; 5] = ["id", "options", "source-dir", "source-dir-root", "target-dir"];
const INTEGER_CONTAINER_OPTIONS: [&str; 3] = ["promoted-max", "replicas", "replicas-per-host"];

fn container_tag(container_type: &str) -> Option<Tag> {
    match container_type {
        "docker" => Some(Tag::Docker),
        "podman" => Some(Tag::Podman),
        "rkt" => Some(Tag::Rkt),
        _ => None,
    }
}

fn is_positive_integer(value: &str) -> bool {
    value.parse::<u32>().map(|n| n > 0).unwrap_or(false)
}

fn validate_container(
    options: &Options,
    force_flags: &ForceFlags,
    require_image: bool,
) -> Vec<ReportItem> {
    let mut reports = names_in(
        &CONTAINER_OPTIONS,
        options.keys().map(String::as_str),
        "container",
        Some(ForceCode::Force),
        force_flags.is_forced(ForceCode::Force),
    );
    if require_image {
        reports.extend(is_required("image", "container")(&plain_pairs(options)));
    }
    for name in INTEGER_CONTAINER_OPTIONS {
        if let Some(value) = options.get(name) {
            if !value.is_empty() && !is_positive_integer(value) {
                reports.push(ReportItem::error(ReportKind::InvalidOptionValue {
                    option_name: name.to_string(),
                    option_value: value.clone(),
                    allowed_values: vec!["a positive integer".to_string()],
                }));
            }
        }
    }
    if options.get("image").map(|i| i.is_empty()).unwrap_or(false) {
        reports.push(ReportItem::error(ReportKind::InvalidOptionValue {
            option_name: "image".to_string(),
            option_value: String::new(),
            allowed_values: vec!["image name".to_string()],
        }));
    }
    reports
}

fn validate_network(options: &Options, force_flags: &ForceFlags) -> Vec<ReportItem> {
    let mut reports = names_in(
        &NETWORK_OPTIONS,
        options.keys().map(String::as_str),
        "network",
        Some(ForceCode::Force),
        force_flags.is_forced(ForceCode::Force),
    );
    if let Some(port) = options.get("control-port") {
        if !port.is_empty() && !port.parse::<u16>().map(|p| p > 0).unwrap_or(false) {
            reports.push(ReportItem::error(ReportKind::InvalidOptionValue {
                option_name: "control-port".to_string(),
                option_value: port.clone(),
                allowed_values: vec!["a port number (1..65535)".to_string()],
            }));
        }
    }
    reports
}

fn validate_port_map(options: &Options, force_flags: &ForceFlags) -> Vec<ReportItem> {
    let mut reports = names_in(
        &PORT_MAP_OPTIONS,
        options.keys().map(String::as_str),
        "port-map",
        Some(ForceCode::Force),
        force_flags.is_forced(ForceCode::Force),
    );
    let pairs = plain_pairs(options);
    reports.extend(run_collection_of_option_validators(
        &pairs,
        &[mutually_exclusive(&["port", "range"], "port-map")],
    ));
    if !options.contains_key("port") && !options.contains_key("range") {
        reports.push(ReportItem::error(ReportKind::RequiredOptionIsMissing {
            option_names: vec!["port".to_string(), "range".to_string()],
            option_type: "port-map".to_string(),
        }));
    }
    reports
}

fn validate_storage_map(options: &Options, force_flags: &ForceFlags) -> Vec<ReportItem> {
    let mut reports = names_in(
        &STORAGE_MAP_OPTIONS,
        options.keys().map(String::as_str),
        "storage-map",
        Some(ForceCode::Force),
        force_flags.is_forced(ForceCode::Force),
    );
    let pairs = plain_pairs(options);
    reports.extend(run_collection_of_option_validators(
        &pairs,
        &[
            is_required("target-dir", "storage-map"),
            mutually_exclusive(&["source-dir", "source-dir-root"], "storage-map"),
        ],
    ));
    if !options.contains_key("source-dir") && !options.contains_key("source-dir-root") {
        reports.push(ReportItem::error(ReportKind::RequiredOptionIsMissing {
            option_names: vec!["source-dir".to_string(), "source-dir-root".to_string()],
            option_type: "storage-map".to_string(),
        }));
    }
    reports
}

fn validate_map_ids(
    doc: &Document,
    maps: &[Options],
    provider: &mut IdProvider,
) -> Vec<ReportItem> {
    let mut reports = Vec::new();
    for map in maps {
        if let Some(id) = map.get("id") {
            reports.extend(provider.book_new_id(doc, id, "map id"));
        }
    }
    reports
}

fn validate_create(
    doc: &Document,
    bundle_id: Option<&str>,
    options: &BundleCreateOptions,
    force_flags: &ForceFlags,
    provider: &mut IdProvider,
) -> ReportList {
    let mut reports = ReportList::new();
    if let Some(bundle_id) = bundle_id {
        reports.extend(provider.book_new_id(doc, bundle_id, "bundle name"));
    }
    if container_tag(&options.container_type).is_none() {
        reports.push(ReportItem::error(ReportKind::InvalidOptionValue {
            option_name: "container type".to_string(),
            option_value: options.container_type.clone(),
            allowed_values: CONTAINER_TYPES.iter().map(|s| s.to_string()).collect(),
        }));
    }
    reports.extend(validate_container(&options.container, force_flags, true));
    reports.extend(validate_network(&options.network, force_flags));
    for map in &options.port_map {
        reports.extend(validate_port_map(map, force_flags));
    }
    for map in &options.storage_map {
        reports.extend(validate_storage_map(map, force_flags));
    }
    reports.extend(validate_map_ids(doc, &options.port_map, provider));
    reports.extend(validate_map_ids(doc, &options.storage_map, provider));
    reports
}

fn set_attrs(doc: &mut Document, element: NodeId, options: &Options) {
    for (name, value) in options {
        if value.is_empty() {
            doc.remove_attr(element, name);
        } else {
            doc.set_attr(element, name, value);
        }
    }
}

fn provide_child(doc: &mut Document, parent: NodeId, tag: Tag, index: usize) -> NodeId {
    match doc.first_child_by_tag(parent, &tag) {
        Some(child) => child,
        None => {
            let child = doc.create(tag);
            doc.insert_child(parent, index, child);
            child
        }
    }
}

fn add_port_maps(doc: &mut Document, bundle: NodeId, maps: &[Options], provider: &mut IdProvider) {
    if maps.is_empty() {
        return;
    }
    let network = provide_child(doc, bundle, Tag::Network, 1);
    let bundle_id = doc.id_of(bundle).to_string();
    for map in maps {
        let id = match map.get("id") {
            Some(id) => id.clone(),
            None => {
                let suffix = map
                    .get("port")
                    .or_else(|| map.get("range"))
                    .cloned()
                    .unwrap_or_default();
                provider.allocate(doc, &format!("{bundle_id}-port-map-{suffix}"))
            }
        };
        let element = doc.append_new_with_id(network, Tag::PortMapping, &id);
        let mut attrs = map.clone();
        attrs.remove("id");
        set_attrs(doc, element, &attrs);
    }
}

fn add_storage_maps(
    doc: &mut Document,
    bundle: NodeId,
    maps: &[Options],
    provider: &mut IdProvider,
) {
    if maps.is_empty() {
        return;
    }
    let index = match doc.first_child_by_tag(bundle, &Tag::Network) {
        Some(_) => 2,
        None => 1,
    };
    let storage = provide_child(doc, bundle, Tag::Storage, index);
    let bundle_id = doc.id_of(bundle).to_string();
    for map in maps {
        let id = match map.get("id") {
            Some(id) => id.clone(),
            None => provider.allocate(doc, &format!("{bundle_id}-storage-map")),
        };
        let element = doc.append_new_with_id(storage, Tag::StorageMapping, &id);
        let mut attrs = map.clone();
        attrs.remove("id");
        set_attrs(doc, element, &attrs);
    }
}

fn build(
    doc: &mut Document,
    bundle: NodeId,
    container_tag: Tag,
    options: &BundleCreateOptions,
    provider: &mut IdProvider,
) {
    let container = doc.create(container_tag);
    doc.insert_child(bundle, 0, container);
    set_attrs(doc, container, &options.container);
    if !options.network.is_empty() {
        let network = provide_child(doc, bundle, Tag::Network, 1);
        set_attrs(doc, network, &options.network);
    }
    add_port_maps(doc, bundle, &options.port_map, provider);
    add_storage_maps(doc, bundle, &options.storage_map, provider);
    arrange_first_meta_attributes(doc, bundle, &options.meta_attrs, Some(provider));
}

/// Creates a bundle at the end of `resources`.
pub fn create(
    doc: &mut Document,
    resources: NodeId,
    bundle_id: &str,
    options: &BundleCreateOptions,
    force_flags: &ForceFlags,
    provider: &mut IdProvider,
    reports: &mut ReportList,
) -> Result<NodeId> {
    let found = validate_create(doc, Some(bundle_id), options, force_flags, provider);
    checkpoint(found, reports)?;
    let Some(tag) = container_tag(&options.container_type) else {
        return Err(CoreError::report(ReportItem::error(ReportKind::InvalidOptionValue {
            option_name: "container type".to_string(),
            option_value: options.container_type.clone(),
            allowed_values: CONTAINER_TYPES.iter().map(|s| s.to_string()).collect(),
        })));
    };
    let bundle = doc.append_new_with_id(resources, Tag::Bundle, bundle_id);
    build(doc, bundle, tag, options, provider);
    debug!(bundle_id, container_type = %options.container_type, "created bundle");
    Ok(bundle)
}

/// The container element and its type name.
fn find_container(doc: &Document, bundle: NodeId) -> Option<(NodeId, String)> {
    doc.children(bundle).into_iter().find_map(|c| match doc.tag(c) {
        Some(tag @ (Tag::Docker | Tag::Podman | Tag::Rkt)) => Some((c, tag.as_str().to_string())),
        _ => None,
    })
}

/// Removes every child of `bundle` except its primitive.
fn remove_configuration(doc: &mut Document, bundle: NodeId) {
    for child in doc.children(bundle) {
        if !doc.is(child, &Tag::Primitive) {
            doc.remove(child);
        }
    }
}

/// Replaces the whole configuration of a bundle while keeping its id,
/// container type and inner primitive.
pub fn reset(
    doc: &mut Document,
    bundle: NodeId,
    options: &BundleCreateOptions,
    force_flags: &ForceFlags,
    provider: &mut IdProvider,
    reports: &mut ReportList,
) -> Result<()> {
    let container_type = find_container(doc, bundle)
        .map(|(_, t)| t)
        .unwrap_or_else(|| "docker".to_string());
    let options = BundleCreateOptions {
        container_type,
        ..options.clone()
    };
    let mut cleared = doc.clone();
    remove_configuration(&mut cleared, bundle);
    let found = validate_create(&cleared, None, &options, force_flags, provider);
    checkpoint(found, reports)?;
    remove_configuration(doc, bundle);
    let tag = container_tag(&options.container_type).unwrap_or(Tag::Docker);
    build(doc, bundle, tag, &options, provider);
    debug!(bundle_id = doc.id_of(bundle), "reset bundle");
    Ok(())
}

fn map_ids(doc: &Document, bundle: NodeId, parent_tag: &Tag, tag: &Tag) -> Vec<NodeId> {
    doc.children_by_tag(bundle, parent_tag)
        .into_iter()
        .flat_map(|p| doc.children_by_tag(p, tag))
        .collect()
}

fn find_maps_to_remove(
    doc: &Document,
    bundle: NodeId,
    parent_tag: &Tag,
    tag: &Tag,
    ids: &[String],
    reports: &mut ReportList,
) -> Vec<NodeId> {
    let existing = map_ids(doc, bundle, parent_tag, tag);
    let mut found = Vec::new();
    for id in ids {
        match existing.iter().find(|n| doc.id_of(**n) == id.as_str()) {
            Some(node) => found.push(*node),
            None => reports.push(ReportItem::error(ReportKind::IdNotFound {
                id: id.clone(),
                id_description: tag.as_str().to_string(),
                context_type: Some("bundle".to_string()),
                context_id: Some(doc.id_of(bundle).to_string()),
            })),
        }
    }
    found
}

/// Updates container and network options, adds or removes maps and sets
/// meta attributes. Empty option values remove the option.
pub fn update(
    doc: &mut Document,
    bundle: NodeId,
    options: &BundleUpdateOptions,
    force_flags: &ForceFlags,
    provider: &mut IdProvider,
    reports: &mut ReportList,
) -> Result<()> {
    let mut found = ReportList::new();
    found.extend(validate_container(&options.container, force_flags, false));
    found.extend(validate_network(&options.network, force_flags));
    for map in &options.port_map_add {
        found.extend(validate_port_map(map, force_flags));
    }
    for map in &options.storage_map_add {
        found.extend(validate_storage_map(map, force_flags));
    }
    found.extend(validate_map_ids(doc, &options.port_map_add, provider));
    found.extend(validate_map_ids(doc, &options.storage_map_add, provider));
    let port_maps = find_maps_to_remove(
        doc,
        bundle,
        &Tag::Network,
        &Tag::PortMapping,
        &options.port_map_remove,
        &mut found,
    );
    let storage_maps = find_maps_to_remove(
        doc,
        bundle,
        &Tag::Storage,
        &Tag::StorageMapping,
        &options.storage_map_remove,
        &mut found,
    );
    checkpoint(found, reports)?;

    if let Some((container, _)) = find_container(doc, bundle) {
        set_attrs(doc, container, &options.container);
    }
    if !options.network.is_empty() {
        let network = provide_child(doc, bundle, Tag::Network, 1);
        set_attrs(doc, network, &options.network);
    }
    for map in port_maps.into_iter().chain(storage_maps) {
        doc.remove(map);
    }
    add_port_maps(doc, bundle, &options.port_map_add, provider);
    add_storage_maps(doc, bundle, &options.storage_map_add, provider);
    arrange_first_meta_attributes(doc, bundle, &options.meta_attrs, Some(provider));
    // drop sections left empty
    for tag in [Tag::Network, Tag::Storage] {
        if let Some(section) = doc.first_child_by_tag(bundle, &tag) {
            let empty = doc.children(section).is_empty()
                && doc.get(section).map(|e| e.attributes.is_empty()).unwrap_or(true);
            if empty {
                doc.remove(section);
            }
        }
    }
    Ok(())
}

/// The primitive running in the bundle.
pub fn get_inner_resource(doc: &Document, bundle: NodeId) -> Option<NodeId> {
    doc.first_child_by_tag(bundle, &Tag::Primitive)
}

/// Moves `primitive` into `bundle`; a bundle holds at most one primitive.
pub fn add_resource(doc: &mut Document, bundle: NodeId, primitive: NodeId) -> Result<()> {
    if let Some(existing) = get_inner_resource(doc, bundle) {
        return Err(CoreError::report(ReportItem::error(
            ReportKind::ResourceAlreadyInBundle {
                bundle_id: doc.id_of(bundle).to_string(),
                resource_id: doc.id_of(existing).to_string(),
            },
        )));
    }
    doc.append_child(bundle, primitive);
    Ok(())
}
