//! Composable option validators.
//!
//! A validator maps an option mapping to a list of [`ReportItem`]s and never
//! fails by itself. Callers run a collection of them and decide whether the
//! outcome is fatal:
//!
//! ```
//! use hacfg_core::validate::{is_required, run_collection_of_option_validators, value_in, plain_pairs};
//! use std::collections::BTreeMap;
//!
//! let mut options = BTreeMap::new();
//! options.insert("some_option".to_string(), "A".to_string());
//! let reports = run_collection_of_option_validators(
//!     &plain_pairs(&options),
//!     &[is_required("name", "option"), value_in("some_option", &["B", "C"])],
//! );
//! assert_eq!(reports.len(), 2);
//! ```
//!
//! Sometimes the normalized value has to be validated while the report must
//! show what the user typed. [`ValuePair`] keeps both.

use crate::report::{ForceCode, ReportItem, ReportKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Original value as typed and its normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePair {
    /// User-facing value.
    pub original: String,
    /// Machine value used for comparison.
    pub normalized: String,
}

impl ValuePair {
    /// Pair whose normalized form equals the original.
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            original: value.clone(),
            normalized: value,
        }
    }
}

/// Options with paired values.
pub type PairedOptions = BTreeMap<String, ValuePair>;

/// A validator.
pub type Validator = Box<dyn Fn(&PairedOptions) -> Vec<ReportItem> + Send + Sync>;

/// Normalizes a value given its option name.
pub type Normalizer = fn(&str) -> String;

/// Pairs every value with itself.
pub fn plain_pairs(options: &BTreeMap<String, String>) -> PairedOptions {
    options
        .iter()
        .map(|(k, v)| (k.clone(), ValuePair::plain(v.clone())))
        .collect()
}

/// Pairs every value with its normalized form.
pub fn values_to_pairs<F>(options: &BTreeMap<String, String>, normalize: F) -> PairedOptions
where
    F: Fn(&str, &str) -> String,
{
    options
        .iter()
        .map(|(k, v)| {
            (
                k.clone(),
                ValuePair {
                    original: v.clone(),
                    normalized: normalize(k, v),
                },
            )
        })
        .collect()
}

/// Inverse of [`values_to_pairs`]: keeps the normalized forms.
pub fn pairs_to_values(options: &PairedOptions) -> BTreeMap<String, String> {
    options
        .iter()
        .map(|(k, v)| (k.clone(), v.normalized.clone()))
        .collect()
}

/// Builds a normalizer from per-option functions; other options pass through.
pub fn option_value_normalization(
    normalization_map: HashMap<&'static str, Normalizer>,
) -> impl Fn(&str, &str) -> String {
    move |key, value| match normalization_map.get(key) {
        Some(normalize) => normalize(value),
        None => value.to_string(),
    }
}

/// Reports REQUIRED_OPTION_IS_MISSING when `option_name` is absent.
pub fn is_required(option_name: &str, option_type: &str) -> Validator {
    let option_name = option_name.to_string();
    let option_type = option_type.to_string();
    Box::new(move |options| {
        if options.contains_key(&option_name) {
            return vec![];
        }
        vec![ReportItem::error(ReportKind::RequiredOptionIsMissing {
            option_names: vec![option_name.clone()],
            option_type: option_type.clone(),
        })]
    })
}

/// Reports INVALID_OPTION_VALUE when the normalized value is not allowed.
pub fn value_in(option_name: &str, allowed_values: &[&str]) -> Validator {
    let option_name = option_name.to_string();
    let allowed: Vec<String> = allowed_values.iter().map(|v| v.to_string()).collect();
    Box::new(move |options| match options.get(&option_name) {
        Some(value) if !allowed.contains(&value.normalized) => {
            vec![ReportItem::error(ReportKind::InvalidOptionValue {
                option_name: option_name.clone(),
                option_value: value.original.clone(),
                allowed_values: allowed.clone(),
            })]
        }
        _ => vec![],
    })
}

/// Reports MUTUALLY_EXCLUSIVE_OPTIONS when more than one name is present.
pub fn mutually_exclusive(names: &[&str], option_type: &str) -> Validator {
    let names: BTreeSet<String> = names.iter().map(|n| n.to_string()).collect();
    let option_type = option_type.to_string();
    Box::new(move |options| {
        let present: Vec<String> = names
            .iter()
            .filter(|n| options.contains_key(n.as_str()))
            .cloned()
            .collect();
        if present.len() > 1 {
            return vec![ReportItem::error(ReportKind::MutuallyExclusiveOptions {
                option_names: present,
                option_type: option_type.clone(),
            })];
        }
        vec![]
    })
}

/// Runs every validator and concatenates the results.
pub fn run_collection_of_option_validators(
    options: &PairedOptions,
    validators: &[Validator],
) -> Vec<ReportItem> {
    validators.iter().flat_map(|validate| validate(options)).collect()
}

/// Reports INVALID_OPTIONS for names not in `allowed`.
///
/// Without `force_code` the item is a plain error. With one, it is a
/// forceable error, or a warning when `allow_extra_names` is set.
pub fn names_in<'a, I>(
    allowed: &[&str],
    names: I,
    option_type: &str,
    force_code: Option<ForceCode>,
    allow_extra_names: bool,
) -> Vec<ReportItem>
where
    I: IntoIterator<Item = &'a str>,
{
    let invalid: BTreeSet<String> = names
        .into_iter()
        .filter(|n| !allowed.contains(n))
        .map(str::to_string)
        .collect();
    if invalid.is_empty() {
        return vec![];
    }
    let mut allowed_sorted: Vec<String> = allowed.iter().map(|a| a.to_string()).collect();
    allowed_sorted.sort();
    vec![ReportItem::forceable(
        ReportKind::InvalidOptions {
            option_names: invalid.into_iter().collect(),
            allowed: allowed_sorted,
            option_type: option_type.to_string(),
        },
        force_code,
        allow_extra_names,
    )]
}
