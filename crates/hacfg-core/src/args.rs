//! Keyword grouping of flat argument lists.
//!
//! Structural problems here are raised at once: nothing downstream can make
//! sense of a request whose option structure is broken.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Flat list of command line tokens.
pub type Argv = Vec<String>;

/// Malformed option structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CmdLineInputError {
    /// What is wrong.
    pub message: String,
    /// Optional pointer to the fix.
    pub hint: Option<String>,
}

impl CmdLineInputError {
    /// Error without a hint.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
        }
    }

    /// Error with a hint.
    pub fn with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Result of [`group_by_keywords`].
///
/// Each keyword keeps its occurrences as separate groups. Repeatable
/// keywords are read with [`ArgsByKeywords::get_args_groups`]; the others are
/// read flat, all occurrences concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgsByKeywords {
    groups: HashMap<String, Vec<Argv>>,
}

impl ArgsByKeywords {
    /// All tokens of `keyword` concatenated.
    pub fn get_args_flat(&self, keyword: &str) -> Argv {
        self.groups
            .get(keyword)
            .map(|groups| groups.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Occurrences of `keyword`, one group each.
    pub fn get_args_groups(&self, keyword: &str) -> Vec<Argv> {
        self.groups.get(keyword).cloned().unwrap_or_default()
    }

    /// Returns true if `keyword` appeared.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.groups.contains_key(keyword)
    }

    /// Returns true if any occurrence of `keyword` has no tokens.
    pub fn has_empty_keyword(&self, keyword: &str) -> bool {
        self.groups
            .get(keyword)
            .map(|groups| groups.iter().any(Vec::is_empty))
            .unwrap_or(false)
    }
}

/// Splits `argv` into groups opened by `keywords`.
///
/// Tokens before the first keyword go to `implicit_first_keyword`; the
/// implicit group is only recorded when it received tokens. Without an
/// implicit keyword such tokens are an error.
pub fn group_by_keywords(
    argv: &[String],
    keywords: &[&str],
    implicit_first_keyword: Option<&str>,
) -> Result<ArgsByKeywords, CmdLineInputError> {
    let mut groups: HashMap<String, Vec<Argv>> = HashMap::new();
    let mut current: Option<String> = None;
    let mut implicit: Argv = Vec::new();

    for arg in argv {
        if keywords.contains(&arg.as_str()) {
            groups.entry(arg.clone()).or_default().push(Vec::new());
            current = Some(arg.clone());
            continue;
        }
        match &current {
            Some(keyword) => {
                if let Some(group) = groups.get_mut(keyword).and_then(|g| g.last_mut()) {
                    group.push(arg.clone());
                }
            }
            None if implicit_first_keyword.is_some() => implicit.push(arg.clone()),
            None => {
                return Err(CmdLineInputError::new(format!(
                    "'{}' is not allowed before the first keyword, use one of: {}",
                    arg,
                    keywords.join(", ")
                )))
            }
        }
    }

    if let Some(keyword) = implicit_first_keyword {
        if !implicit.is_empty() {
            groups.entry(keyword.to_string()).or_default().insert(0, implicit);
        }
    }
    Ok(ArgsByKeywords { groups })
}

/// Parses `key=value` tokens.
#[derive(Debug, Clone)]
pub struct KeyValueParser {
    pairs: Vec<(String, String)>,
}

impl KeyValueParser {
    /// Splits every token at its first `=`.
    pub fn new(argv: &[String]) -> Result<Self, CmdLineInputError> {
        let mut pairs = Vec::with_capacity(argv.len());
        for arg in argv {
            let Some((key, value)) = arg.split_once('=') else {
                return Err(CmdLineInputError::new(format!(
                    "missing value of '{}' option",
                    arg
                )));
            };
            if key.is_empty() {
                return Err(CmdLineInputError::new(format!(
                    "missing key in '{}' option",
                    arg
                )));
            }
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self { pairs })
    }

    /// Pairs in input order, duplicates kept.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Map of the pairs; a key given twice with different values is an error.
    pub fn get_unique(&self) -> Result<BTreeMap<String, String>, CmdLineInputError> {
        let mut result = BTreeMap::new();
        for (key, value) in &self.pairs {
            if let Some(previous) = result.get(key) {
                if previous != value {
                    return Err(CmdLineInputError::new(format!(
                        "duplicate option '{}' with different values '{}' and '{}'",
                        key, previous, value
                    )));
                }
                continue;
            }
            result.insert(key.clone(), value.clone());
        }
        Ok(result)
    }
}

/// Parses `key=value` tokens into a map, rejecting conflicting duplicates.
pub fn parse_key_value(argv: &[String]) -> Result<BTreeMap<String, String>, CmdLineInputError> {
    KeyValueParser::new(argv)?.get_unique()
}

/// Splits `op` groups into single operations.
///
/// A group like `[monitor timeout=1 start timeout=2]` holds two operations.
/// Each returned operation starts with `name=<op name>`.
pub fn build_operations(op_groups: &[Argv]) -> Result<Vec<Argv>, CmdLineInputError> {
    let mut operations: Vec<Argv> = Vec::new();
    for group in op_groups {
        let Some(first) = group.first() else {
            return Err(not_enough_parts_in_operation());
        };
        if first.contains('=') {
            return Err(CmdLineInputError::new(
                "When using 'op' you must specify an operation name after 'op'",
            ));
        }
        for arg in group {
            if arg.contains('=') {
                if let Some(current) = operations.last_mut() {
                    current.push(arg.clone());
                }
            } else {
                operations.push(vec![format!("name={}", arg)]);
            }
        }
    }
    // checked after the loop, one group may hold several operations
    if operations.iter().any(|op| op.len() < 2) {
        return Err(not_enough_parts_in_operation());
    }
    Ok(operations)
}

/// Builds operations and parses each into a map.
pub fn parse_operations(
    op_groups: &[Argv],
) -> Result<Vec<BTreeMap<String, String>>, CmdLineInputError> {
    build_operations(op_groups)?
        .iter()
        .map(|op| parse_key_value(op))
        .collect()
}

fn not_enough_parts_in_operation() -> CmdLineInputError {
    CmdLineInputError::new(
        "When using 'op' you must specify an operation name and at least one option",
    )
}

/// One `(kind, scope type, scope)` permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInfo {
    /// read, write or deny.
    pub kind: String,
    /// xpath or id.
    pub scope_type: String,
    /// The xpath expression or referenced id.
    pub scope: String,
}

impl PermissionInfo {
    /// Builds a permission tuple.
    pub fn new(kind: &str, scope_type: &str, scope: &str) -> Self {
        Self {
            kind: kind.to_string(),
            scope_type: scope_type.to_string(),
            scope: scope.to_string(),
        }
    }
}

/// Parses `kind scope_type scope` triples; kind and scope type are lower-cased.
pub fn parse_permission_info_list(argv: &[String]) -> Result<Vec<PermissionInfo>, CmdLineInputError> {
    if argv.len() % 3 != 0 {
        return Err(CmdLineInputError::new(
            "permissions must be given as triples: <read|write|deny> <xpath|id> <query|id>",
        ));
    }
    Ok(argv
        .chunks(3)
        .map(|c| PermissionInfo {
            kind: c[0].to_lowercase(),
            scope_type: c[1].to_lowercase(),
            scope: c[2].clone(),
        })
        .collect())
}

/// Converts string literals to an [`Argv`].
pub fn argv<I, S>(items: I) -> Argv
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
