//! Builders turning resource command arguments into structured requests.

use crate::args::{
    group_by_keywords, parse_key_value, parse_operations, ArgsByKeywords, Argv,
    CmdLineInputError,
};
use crate::report::{ReportItem, ReportKind, ReportList};
use std::collections::BTreeMap;

/// Flag switching the command line to [`FutureParsing`].
pub const FUTURE_OPTION: &str = "--future";

/// String to string options.
pub type Options = BTreeMap<String, String>;

/// Options of a single primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimitiveOptions {
    /// Agent parameters.
    pub instance_attrs: Options,
    /// Meta attributes.
    pub meta_attrs: Options,
    /// Operations, each holding at least `name`.
    pub operations: Vec<Options>,
}

/// Options of a clone or promotable clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Explicit clone id, derived from the primitive id when absent.
    pub clone_id: Option<String>,
    /// Meta attributes of the clone.
    pub meta_attrs: Options,
}

/// Primitive together with its optional wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexResourceOptions {
    /// The base resource.
    pub primitive: PrimitiveOptions,
    /// Set after `clone`.
    pub clone: Option<CloneOptions>,
    /// Set after `promotable`.
    pub promotable: Option<CloneOptions>,
    /// Set after `bundle`.
    pub bundle_id: Option<String>,
}

/// Options of `bundle create` and `bundle reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleCreateOptions {
    /// docker, podman or rkt; empty for reset.
    pub container_type: String,
    /// Container options.
    pub container: Options,
    /// Network options.
    pub network: Options,
    /// One map per `port-map`.
    pub port_map: Vec<Options>,
    /// One map per `storage-map`.
    pub storage_map: Vec<Options>,
    /// Meta attributes.
    pub meta_attrs: Options,
}

/// Options of `bundle update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleUpdateOptions {
    /// Container options to set; empty values remove.
    pub container: Options,
    /// Network options to set; empty values remove.
    pub network: Options,
    /// Port maps to add.
    pub port_map_add: Vec<Options>,
    /// Port map ids to remove.
    pub port_map_remove: Vec<String>,
    /// Storage maps to add.
    pub storage_map_add: Vec<Options>,
    /// Storage map ids to remove.
    pub storage_map_remove: Vec<String>,
    /// Meta attributes to set.
    pub meta_attrs: Options,
}

/// Where a section's `meta` arguments end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaPlacement {
    /// Meta attributes of the base resource.
    BaseResource,
    /// Meta attributes of the wrapper the section creates.
    Section,
}

/// How ambiguous wrapper sections of `resource create` are read.
///
/// `section` is `clone`, `promotable` or `bundle`.
pub trait ParsingStrategy: Send + Sync {
    /// Clone options given without the `meta` keyword.
    fn clone_options_without_meta(
        &self,
        clone_type: &str,
        reports: &mut ReportList,
    ) -> Result<(), CmdLineInputError>;

    /// `op` given after a wrapper section. On success the operations belong
    /// to the base resource.
    fn ops_after(&self, section: &str, reports: &mut ReportList) -> Result<(), CmdLineInputError>;

    /// `meta` given after a wrapper section.
    fn meta_after(
        &self,
        section: &str,
        reports: &mut ReportList,
    ) -> Result<MetaPlacement, CmdLineInputError>;
}

/// Backward compatible reading: everything is accepted, ambiguous parts
/// apply to the base resource and each occurrence produces a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyParsing;

/// Strict reading enabled by [`FUTURE_OPTION`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FutureParsing;

fn deprecated(reports: &mut ReportList, message: String) {
    reports.push(ReportItem::warning(ReportKind::DeprecatedSyntax { message }));
}

impl ParsingStrategy for LegacyParsing {
    fn clone_options_without_meta(
        &self,
        clone_type: &str,
        reports: &mut ReportList,
    ) -> Result<(), CmdLineInputError> {
        deprecated(
            reports,
            format!(
                "Configuring {clone_type} meta attributes without specifying the 'meta' \
                 keyword after the '{clone_type}' keyword is deprecated and will be removed \
                 in a future release. Specify {FUTURE_OPTION} to switch to the future behavior."
            ),
        );
        Ok(())
    }

    fn ops_after(&self, section: &str, reports: &mut ReportList) -> Result<(), CmdLineInputError> {
        deprecated(
            reports,
            format!(
                "Specifying 'op' after '{section}' now defines operations for the base \
                 resource. In future, this will be removed and operations will have to be \
                 specified before '{section}'. Specify {FUTURE_OPTION} to switch to the \
                 future behavior."
            ),
        );
        Ok(())
    }

    fn meta_after(
        &self,
        section: &str,
        reports: &mut ReportList,
    ) -> Result<MetaPlacement, CmdLineInputError> {
        let message = if section == "bundle" {
            format!(
                "Specifying 'meta' after 'bundle' now defines meta options for the base \
                 resource. In future, this will be removed and meta options will have to be \
                 specified before 'bundle'. Specify {FUTURE_OPTION} to switch to the future \
                 behavior."
            )
        } else {
            format!(
                "Specifying 'meta' after '{section}' now defines meta attributes for the \
                 base resource. In future, this will define meta attributes for the \
                 {section}. Specify {FUTURE_OPTION} to switch to the future behavior."
            )
        };
        deprecated(reports, message);
        Ok(MetaPlacement::BaseResource)
    }
}

impl ParsingStrategy for FutureParsing {
    fn clone_options_without_meta(
        &self,
        clone_type: &str,
        _reports: &mut ReportList,
    ) -> Result<(), CmdLineInputError> {
        Err(CmdLineInputError::new(format!(
            "Specifying instance attributes for a {clone_type} is not supported. Use \
             'meta' after '{clone_type}' if you want to specify meta attributes."
        )))
    }

    fn ops_after(&self, section: &str, _reports: &mut ReportList) -> Result<(), CmdLineInputError> {
        Err(CmdLineInputError::new(format!(
            "op settings must be defined on the base resource, not the {section}"
        )))
    }

    fn meta_after(
        &self,
        section: &str,
        _reports: &mut ReportList,
    ) -> Result<MetaPlacement, CmdLineInputError> {
        if section == "bundle" {
            return Err(CmdLineInputError::new(
                "meta options must be defined on the base resource, not the bundle",
            ));
        }
        Ok(MetaPlacement::Section)
    }
}

/// Parses `[instance attrs] [op ...] [meta ...]`.
pub fn parse_primitive(argv: &[String]) -> Result<PrimitiveOptions, CmdLineInputError> {
    let groups = group_by_keywords(argv, &["op", "meta"], Some("instance"))?;
    Ok(PrimitiveOptions {
        instance_attrs: parse_key_value(&groups.get_args_flat("instance"))?,
        meta_attrs: parse_key_value(&groups.get_args_flat("meta"))?,
        operations: parse_operations(&groups.get_args_groups("op"))?,
    })
}

/// Parses `[clone id] [meta ...]` of `resource clone` and `resource promotable`.
pub fn parse_clone(
    argv: &[String],
    promotable: bool,
    reports: &mut ReportList,
) -> Result<CloneOptions, CmdLineInputError> {
    let keywords = ["op", "meta"];
    let mut rest = argv;
    let mut clone_id = None;
    if let Some(first) = argv.first() {
        if !keywords.contains(&first.as_str()) && !first.contains('=') {
            clone_id = Some(first.clone());
            rest = &argv[1..];
        }
    }
    let groups = group_by_keywords(rest, &keywords, Some("options"))?;
    if groups.has_keyword("op") {
        return Err(CmdLineInputError::new(
            "op settings must be changed on base resource, not the clone",
        ));
    }
    if groups.has_keyword("options") {
        deprecated(
            reports,
            "configuring meta attributes without specifying the 'meta' keyword is \
             deprecated and will be removed in a future release"
                .to_string(),
        );
    }
    let mut tokens = groups.get_args_flat("options");
    tokens.extend(groups.get_args_flat("meta"));
    let mut meta_attrs = parse_key_value(&tokens)?;
    if promotable {
        if meta_attrs.contains_key("promotable") {
            return Err(CmdLineInputError::new(
                "you cannot specify both promotable option and promotable keyword",
            ));
        }
        meta_attrs.insert("promotable".to_string(), "true".to_string());
    }
    Ok(CloneOptions {
        clone_id,
        meta_attrs,
    })
}

/// Parses the arguments of `resource create`.
///
/// Structure errors are returned at once, deprecation warnings are pushed
/// into `reports`.
pub fn parse_create(
    argv: &[String],
    strategy: &dyn ParsingStrategy,
    reports: &mut ReportList,
) -> Result<ComplexResourceOptions, CmdLineInputError> {
    parse_create_inner(argv, strategy, reports).map_err(|err| {
        if err.message == "missing value of 'master' option" {
            CmdLineInputError::with_hint(
                err.message,
                "Master/Slave resources have been renamed to promotable clones, please use \
                 the 'promotable' keyword instead of 'master'.",
            )
        } else {
            err
        }
    })
}

fn parse_create_inner(
    argv: &[String],
    strategy: &dyn ParsingStrategy,
    reports: &mut ReportList,
) -> Result<ComplexResourceOptions, CmdLineInputError> {
    let top = group_by_keywords(argv, &["clone", "promotable", "bundle"], Some("primitive"))?;
    let primitive_groups =
        group_by_keywords(&top.get_args_flat("primitive"), &["op", "meta"], Some("instance"))?;

    let instance = primitive_groups.get_args_flat("instance");
    let mut meta = primitive_groups.get_args_flat("meta");
    let mut ops = primitive_groups.get_args_groups("op");
    let mut clone_sections: BTreeMap<&str, Argv> = BTreeMap::new();

    for clone_type in ["clone", "promotable"] {
        if !top.has_keyword(clone_type) {
            continue;
        }
        let groups = group_by_keywords(
            &top.get_args_flat(clone_type),
            &["op", "meta"],
            Some("options"),
        )?;
        let mut section = groups.get_args_flat("options");
        if let Some(first) = section.first() {
            let has_meta_without_keyword = if first.contains('=') {
                true
            } else {
                section.len() > 1
            };
            if has_meta_without_keyword {
                strategy.clone_options_without_meta(clone_type, reports)?;
            }
        }
        if groups.has_keyword("op") {
            strategy.ops_after(clone_type, reports)?;
            ops.extend(groups.get_args_groups("op"));
        }
        if groups.has_keyword("meta") {
            match strategy.meta_after(clone_type, reports)? {
                MetaPlacement::BaseResource => meta.extend(groups.get_args_flat("meta")),
                MetaPlacement::Section => section.extend(groups.get_args_flat("meta")),
            }
        }
        clone_sections.insert(clone_type, section);
    }

    let mut bundle_section = None;
    if top.has_keyword("bundle") {
        let groups = group_by_keywords(&top.get_args_flat("bundle"), &["op", "meta"], Some("options"))?;
        if groups.has_keyword("meta") {
            match strategy.meta_after("bundle", reports)? {
                MetaPlacement::BaseResource => meta.extend(groups.get_args_flat("meta")),
                MetaPlacement::Section => {
                    return Err(CmdLineInputError::new(
                        "meta options must be defined on the base resource, not the bundle",
                    ))
                }
            }
        }
        if groups.has_keyword("op") {
            strategy.ops_after("bundle", reports)?;
            ops.extend(groups.get_args_groups("op"));
        }
        bundle_section = Some(groups.get_args_flat("options"));
    }

    let bundle_id = match bundle_section {
        Some(section) if section.len() == 1 => section.into_iter().next(),
        Some(_) => {
            return Err(CmdLineInputError::new(
                "you have to specify exactly one bundle",
            ))
        }
        None => None,
    };

    Ok(ComplexResourceOptions {
        primitive: PrimitiveOptions {
            instance_attrs: parse_key_value(&instance)?,
            meta_attrs: parse_key_value(&meta)?,
            operations: parse_operations(&ops)?,
        },
        clone: clone_sections
            .remove("clone")
            .map(clone_options_from_section)
            .transpose()?,
        promotable: clone_sections
            .remove("promotable")
            .map(clone_options_from_section)
            .transpose()?,
        bundle_id,
    })
}

fn clone_options_from_section(mut section: Argv) -> Result<CloneOptions, CmdLineInputError> {
    let clone_id = match section.first() {
        Some(first) if !first.contains('=') => Some(section.remove(0)),
        _ => None,
    };
    Ok(CloneOptions {
        clone_id,
        meta_attrs: parse_key_value(&section)?,
    })
}

const BUNDLE_REPEATABLE_KEYWORDS: [&str; 2] = ["port-map", "storage-map"];
const BUNDLE_KEYWORDS: [&str; 5] = ["meta", "container", "network", "port-map", "storage-map"];

fn parse_bundle_groups(argv: &[String]) -> Result<ArgsByKeywords, CmdLineInputError> {
    let groups = group_by_keywords(argv, &BUNDLE_KEYWORDS, None)?;
    for keyword in BUNDLE_KEYWORDS {
        if !groups.has_keyword(keyword) {
            continue;
        }
        let empty = if BUNDLE_REPEATABLE_KEYWORDS.contains(&keyword) {
            groups.has_empty_keyword(keyword)
        } else {
            groups.get_args_flat(keyword).is_empty()
        };
        if empty {
            return Err(CmdLineInputError::new(format!(
                "No {keyword} options specified"
            )));
        }
    }
    Ok(groups)
}

fn parse_bundle_create_or_reset(
    argv: &[String],
    reset: bool,
) -> Result<BundleCreateOptions, CmdLineInputError> {
    let groups = parse_bundle_groups(argv)?;
    let mut container = groups.get_args_flat("container");
    let mut container_type = String::new();
    if !reset {
        if let Some(first) = container.first() {
            if !first.contains('=') {
                container_type = container.remove(0);
            }
        }
    }
    Ok(BundleCreateOptions {
        container_type,
        container: parse_key_value(&container)?,
        network: parse_key_value(&groups.get_args_flat("network"))?,
        port_map: groups
            .get_args_groups("port-map")
            .iter()
            .map(|g| parse_key_value(g))
            .collect::<Result<_, _>>()?,
        storage_map: groups
            .get_args_groups("storage-map")
            .iter()
            .map(|g| parse_key_value(g))
            .collect::<Result<_, _>>()?,
        meta_attrs: parse_key_value(&groups.get_args_flat("meta"))?,
    })
}

/// Parses `bundle create` options; an optional container type leads the
/// container section.
pub fn parse_bundle_create_options(argv: &[String]) -> Result<BundleCreateOptions, CmdLineInputError> {
    parse_bundle_create_or_reset(argv, false)
}

/// Parses `bundle reset` options.
pub fn parse_bundle_reset_options(argv: &[String]) -> Result<BundleCreateOptions, CmdLineInputError> {
    parse_bundle_create_or_reset(argv, true)
}

fn bundle_map_update_not_valid(map_name: &str) -> CmdLineInputError {
    CmdLineInputError::new(format!(
        "When using '{map_name}' you must specify either 'add' and options or either of \
         'delete' or 'remove' and id(s)"
    ))
}

fn split_map_update(
    groups: &[Argv],
    map_name: &str,
) -> Result<(Vec<Options>, Vec<String>), CmdLineInputError> {
    let mut add = Vec::new();
    let mut remove = Vec::new();
    for group in groups {
        if group.len() < 2 {
            return Err(bundle_map_update_not_valid(map_name));
        }
        match group[0].as_str() {
            "add" => add.push(parse_key_value(&group[1..])?),
            "delete" | "remove" => remove.extend(group[1..].iter().cloned()),
            _ => return Err(bundle_map_update_not_valid(map_name)),
        }
    }
    Ok((add, remove))
}

/// Parses `bundle update` options.
pub fn parse_bundle_update_options(argv: &[String]) -> Result<BundleUpdateOptions, CmdLineInputError> {
    let groups = parse_bundle_groups(argv)?;
    let (port_map_add, port_map_remove) =
        split_map_update(&groups.get_args_groups("port-map"), "port-map")?;
    let (storage_map_add, storage_map_remove) =
        split_map_update(&groups.get_args_groups("storage-map"), "storage-map")?;
    Ok(BundleUpdateOptions {
        container: parse_key_value(&groups.get_args_flat("container"))?,
        network: parse_key_value(&groups.get_args_flat("network"))?,
        port_map_add,
        port_map_remove,
        storage_map_add,
        storage_map_remove,
        meta_attrs: parse_key_value(&groups.get_args_flat("meta"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::argv;

    fn opts(pairs: &[(&str, &str)]) -> Options {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_primitive() {
        let parsed = parse_primitive(&argv([
            "a=1", "op", "monitor", "interval=10", "meta", "m=2",
        ]))
        .unwrap();
        assert_eq!(parsed.instance_attrs, opts(&[("a", "1")]));
        assert_eq!(parsed.meta_attrs, opts(&[("m", "2")]));
        assert_eq!(
            parsed.operations,
            vec![opts(&[("name", "monitor"), ("interval", "10")])]
        );
    }

    #[test]
    fn test_parse_clone_with_id_and_meta() {
        let mut reports = ReportList::new();
        let parsed = parse_clone(&argv(["C", "meta", "a=b"]), false, &mut reports).unwrap();
        assert_eq!(parsed.clone_id.as_deref(), Some("C"));
        assert_eq!(parsed.meta_attrs, opts(&[("a", "b")]));
        assert!(reports.is_empty());
    }

    #[test]
    fn test_parse_clone_without_meta_is_deprecated() {
        let mut reports = ReportList::new();
        let parsed = parse_clone(&argv(["a=b"]), false, &mut reports).unwrap();
        assert_eq!(parsed.meta_attrs, opts(&[("a", "b")]));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports.items()[0].kind.code(), "DEPRECATED_SYNTAX");
    }

    #[test]
    fn test_parse_clone_rejects_op() {
        let mut reports = ReportList::new();
        assert!(parse_clone(&argv(["op", "monitor", "a=b"]), false, &mut reports).is_err());
    }

    #[test]
    fn test_parse_clone_promotable() {
        let mut reports = ReportList::new();
        let parsed = parse_clone(&argv(["meta", "a=b"]), true, &mut reports).unwrap();
        assert_eq!(parsed.meta_attrs, opts(&[("a", "b"), ("promotable", "true")]));
        let err = parse_clone(&argv(["meta", "promotable=false"]), true, &mut reports).unwrap_err();
        assert!(err.message.contains("both promotable option and promotable keyword"));
    }

    #[test]
    fn test_parse_create_plain() {
        let mut reports = ReportList::new();
        let parsed =
            parse_create(&argv(["a=1", "meta", "m=1"]), &LegacyParsing, &mut reports).unwrap();
        assert_eq!(parsed.primitive.instance_attrs, opts(&[("a", "1")]));
        assert!(parsed.clone.is_none());
        assert!(parsed.bundle_id.is_none());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_parse_create_clone_meta_future_goes_to_clone() {
        let mut reports = ReportList::new();
        let parsed = parse_create(
            &argv(["a=1", "clone", "CL", "meta", "c=2"]),
            &FutureParsing,
            &mut reports,
        )
        .unwrap();
        let clone = parsed.clone.unwrap();
        assert_eq!(clone.clone_id.as_deref(), Some("CL"));
        assert_eq!(clone.meta_attrs, opts(&[("c", "2")]));
        assert!(parsed.primitive.meta_attrs.is_empty());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_parse_create_clone_meta_legacy_goes_to_primitive() {
        let mut reports = ReportList::new();
        let parsed = parse_create(
            &argv(["a=1", "clone", "meta", "c=2"]),
            &LegacyParsing,
            &mut reports,
        )
        .unwrap();
        assert_eq!(parsed.primitive.meta_attrs, opts(&[("c", "2")]));
        let clone = parsed.clone.unwrap();
        assert!(clone.meta_attrs.is_empty());
        assert!(clone.clone_id.is_none());
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_parse_create_clone_options_without_meta() {
        let mut reports = ReportList::new();
        let parsed =
            parse_create(&argv(["clone", "x=1"]), &LegacyParsing, &mut reports).unwrap();
        assert_eq!(parsed.clone.unwrap().meta_attrs, opts(&[("x", "1")]));
        assert_eq!(reports.len(), 1);

        let mut reports = ReportList::new();
        assert!(parse_create(&argv(["clone", "x=1"]), &FutureParsing, &mut reports).is_err());
    }

    #[test]
    fn test_parse_create_clone_id_only_is_not_deprecated() {
        let mut reports = ReportList::new();
        let parsed = parse_create(&argv(["clone", "CL"]), &FutureParsing, &mut reports).unwrap();
        assert_eq!(parsed.clone.unwrap().clone_id.as_deref(), Some("CL"));
    }

    #[test]
    fn test_parse_create_ops_after_clone() {
        let mut reports = ReportList::new();
        let parsed = parse_create(
            &argv(["promotable", "op", "monitor", "interval=5"]),
            &LegacyParsing,
            &mut reports,
        )
        .unwrap();
        assert_eq!(parsed.primitive.operations.len(), 1);
        assert!(parsed.promotable.is_some());
        assert_eq!(reports.len(), 1);

        let mut reports = ReportList::new();
        let err = parse_create(
            &argv(["promotable", "op", "monitor", "interval=5"]),
            &FutureParsing,
            &mut reports,
        )
        .unwrap_err();
        assert!(err.message.contains("not the promotable"));
    }

    #[test]
    fn test_parse_create_bundle() {
        let mut reports = ReportList::new();
        let parsed = parse_create(
            &argv(["a=1", "bundle", "B", "meta", "m=1", "op", "start", "timeout=5"]),
            &LegacyParsing,
            &mut reports,
        )
        .unwrap();
        assert_eq!(parsed.bundle_id.as_deref(), Some("B"));
        assert_eq!(parsed.primitive.meta_attrs, opts(&[("m", "1")]));
        assert_eq!(parsed.primitive.operations.len(), 1);
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_parse_create_bundle_meta_future_is_error() {
        let mut reports = ReportList::new();
        assert!(parse_create(
            &argv(["bundle", "B", "meta", "m=1"]),
            &FutureParsing,
            &mut reports
        )
        .is_err());
    }

    #[test]
    fn test_parse_create_exactly_one_bundle() {
        let mut reports = ReportList::new();
        let err =
            parse_create(&argv(["bundle", "B", "C"]), &LegacyParsing, &mut reports).unwrap_err();
        assert_eq!(err.message, "you have to specify exactly one bundle");
        let err = parse_create(&argv(["bundle"]), &LegacyParsing, &mut reports).unwrap_err();
        assert_eq!(err.message, "you have to specify exactly one bundle");
    }

    #[test]
    fn test_parse_create_master_hint() {
        let mut reports = ReportList::new();
        let err = parse_create(&argv(["a=1", "master"]), &LegacyParsing, &mut reports).unwrap_err();
        assert_eq!(err.message, "missing value of 'master' option");
        assert!(err.hint.unwrap().contains("promotable"));
    }

    #[test]
    fn test_parse_bundle_create() {
        let parsed = parse_bundle_create_options(&argv([
            "container", "docker", "image=i", "network", "control-port=1",
            "port-map", "port=80", "port-map", "port=81", "storage-map", "source-dir=/a",
            "meta", "m=1",
        ]))
        .unwrap();
        assert_eq!(parsed.container_type, "docker");
        assert_eq!(parsed.container, opts(&[("image", "i")]));
        assert_eq!(parsed.port_map.len(), 2);
        assert_eq!(parsed.storage_map.len(), 1);
        assert_eq!(parsed.meta_attrs, opts(&[("m", "1")]));
    }

    #[test]
    fn test_parse_bundle_reset_keeps_container_token() {
        let err = parse_bundle_reset_options(&argv(["container", "docker"])).unwrap_err();
        assert_eq!(err.message, "missing value of 'docker' option");
    }

    #[test]
    fn test_parse_bundle_empty_section() {
        let err = parse_bundle_create_options(&argv(["port-map", "port=1", "port-map"]))
            .unwrap_err();
        assert_eq!(err.message, "No port-map options specified");
        let err = parse_bundle_create_options(&argv(["network"])).unwrap_err();
        assert_eq!(err.message, "No network options specified");
    }

    #[test]
    fn test_parse_bundle_update() {
        let parsed = parse_bundle_update_options(&argv([
            "port-map", "add", "port=80", "port-map", "delete", "p1", "p2",
            "storage-map", "remove", "s1",
        ]))
        .unwrap();
        assert_eq!(parsed.port_map_add, vec![opts(&[("port", "80")])]);
        assert_eq!(parsed.port_map_remove, argv(["p1", "p2"]));
        assert_eq!(parsed.storage_map_remove, argv(["s1"]));
    }

    #[test]
    fn test_parse_bundle_update_invalid_map() {
        let err = parse_bundle_update_options(&argv(["port-map", "add"])).unwrap_err();
        assert!(err.message.starts_with("When using 'port-map'"));
        let err = parse_bundle_update_options(&argv(["storage-map", "edit", "x"])).unwrap_err();
        assert!(err.message.starts_with("When using 'storage-map'"));
    }
}
