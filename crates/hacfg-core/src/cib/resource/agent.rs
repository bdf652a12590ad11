//! Resource agent names and the metadata a caller may supply about them.

use crate::report::{ReportItem, ReportKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent name `standard[:provider]:type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAgentName {
    /// ocf, systemd, stonith, ...
    pub standard: String,
    /// Provider, only used by ocf agents.
    pub provider: Option<String>,
    /// Agent type.
    pub agent_type: String,
}

impl ResourceAgentName {
    /// Parses a full agent name. `ocf` agents need a provider, other
    /// standards must not have one.
    pub fn parse(name: &str) -> Result<Self, ReportItem> {
        let invalid = || {
            ReportItem::error(ReportKind::InvalidResourceAgentName {
                name: name.to_string(),
            })
        };
        let parts: Vec<&str> = name.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [standard, agent_type] if *standard != "ocf" => Ok(Self {
                standard: standard.to_string(),
                provider: None,
                agent_type: agent_type.to_string(),
            }),
            ["ocf", provider, agent_type] => Ok(Self {
                standard: "ocf".to_string(),
                provider: Some(provider.to_string()),
                agent_type: agent_type.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    /// Stonith agent `stonith:<type>`.
    pub fn stonith(agent_type: &str) -> Self {
        Self {
            standard: "stonith".to_string(),
            provider: None,
            agent_type: agent_type.to_string(),
        }
    }

    /// Returns true for fencing agents.
    pub fn is_stonith(&self) -> bool {
        self.standard == "stonith"
    }
}

impl fmt::Display for ResourceAgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}:{}:{}", self.standard, provider, self.agent_type),
            None => write!(f, "{}:{}", self.standard, self.agent_type),
        }
    }
}

/// One agent parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentParameter {
    /// Name.
    pub name: String,
    /// Must be set when creating the resource.
    #[serde(default)]
    pub required: bool,
}

/// One agent action with its recommended settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Action name, e.g. `monitor`.
    pub name: String,
    /// Recommended interval.
    #[serde(default)]
    pub interval: Option<String>,
    /// Recommended timeout.
    #[serde(default)]
    pub timeout: Option<String>,
    /// Role the action applies to.
    #[serde(default)]
    pub role: Option<String>,
}

/// What is known about an agent. Without metadata instance attributes and
/// operation names are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Parameters.
    #[serde(default)]
    pub parameters: Vec<AgentParameter>,
    /// Actions.
    #[serde(default)]
    pub actions: Vec<AgentAction>,
    /// Fencing agent which also unfences.
    #[serde(default)]
    pub provides_unfencing: bool,
}

impl AgentMetadata {
    /// Parameter names.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Names of required parameters.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Action names, deduplicated in order.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for action in &self.actions {
            if !names.contains(&action.name.as_str()) {
                names.push(&action.name);
            }
        }
        names
    }
}
