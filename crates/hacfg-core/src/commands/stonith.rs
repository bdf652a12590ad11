//! Fencing device commands. A fencing device is a primitive of class
//! `stonith`.

use super::resource::{create_primitive, CreateRequest, Placement};
use crate::cib::resource::agent::ResourceAgentName;
use crate::env::Environment;
use crate::error::Result;
use crate::report::ReportList;

fn prepare(request: &CreateRequest) -> (ResourceAgentName, CreateRequest) {
    let agent_type = request
        .agent_name
        .strip_prefix("stonith:")
        .unwrap_or(&request.agent_name);
    let mut request = request.clone();
    let unfencing = request
        .metadata
        .as_ref()
        .map(|m| m.provides_unfencing)
        .unwrap_or(false);
    if unfencing {
        request
            .options
            .meta_attrs
            .entry("provides".to_string())
            .or_insert_with(|| "unfencing".to_string());
    }
    (ResourceAgentName::stonith(agent_type), request)
}

/// Creates a fencing device.
pub async fn create(env: &mut Environment, request: &CreateRequest) -> Result<ReportList> {
    let (agent, request) = prepare(request);
    create_primitive(env, &request, &agent, Placement::Resources).await
}

/// Creates a fencing device inside a group.
pub async fn create_in_group(
    env: &mut Environment,
    request: &CreateRequest,
    group_id: &str,
    adjacent_id: Option<&str>,
    put_after_adjacent: bool,
) -> Result<ReportList> {
    let (agent, request) = prepare(request);
    let placement = Placement::Group {
        group_id,
        adjacent_id,
        put_after_adjacent,
    };
    create_primitive(env, &request, &agent, placement).await
}
