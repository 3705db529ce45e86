//! Project id discovery. Accounts have one IAM project per region, named
//! after the region, so the id can be looked up when none is configured.

use crate::trigger::remote_call_error;
use crate::{CoreError, Phase};
use fgdeploy_remote::model::ProjectList;
use fgdeploy_remote::{ApiRequest, ControlPlane};
use tracing::{debug, info};

/// Id of the project named `region`, or `None` when the account has none.
pub fn lookup_project_id(
    plane: &dyn ControlPlane,
    region: &str,
) -> Result<Option<String>, CoreError> {
    let response = plane
        .call(&ApiRequest::list_projects(region))
        .map_err(|source| CoreError::Transport {
            phase: Phase::ProjectLookup,
            resource: region.to_owned(),
            source,
        })?;
    if !response.is_success() {
        return Err(remote_call_error(Phase::ProjectLookup, region, &response));
    }
    let list: ProjectList = if response.body.is_null() {
        ProjectList::default()
    } else {
        response.json().map_err(|e| CoreError::InvalidResponse {
            resource: region.to_owned(),
            message: e.to_string(),
        })?
    };
    let found = list
        .projects
        .into_iter()
        .find(|p| p.name == region)
        .map(|p| p.id);
    match &found {
        Some(id) => info!("using project {id} for region {region}"),
        None => debug!("no project named {region}"),
    }
    Ok(found)
}
