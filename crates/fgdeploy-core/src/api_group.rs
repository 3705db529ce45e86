//! API gateway group discovery for gateway triggers declared without a
//! `group_id`: the first group the account has is used, and one is created
//! when there is none.

use crate::trigger::remote_call_error;
use crate::triggers::{generated_name, str_field};
use crate::{CoreError, Phase};
use fgdeploy_remote::model::{ApiGroupList, CreateApiGroupBody};
use fgdeploy_remote::{ApiGroup, ApiRequest, ControlPlane};
use fgdeploy_schema::{EventData, FunctionUrn, TriggerKind};
use serde_json::Value;
use tracing::{debug, info};

const GROUP_PREFIX: &str = "API_Group";
const GROUP_REMARK: &str = "Created by fgdeploy";

/// Shared-gateway declarations without a group need one looked up.
pub(crate) fn needs_group(kind: TriggerKind, data: &EventData) -> bool {
    kind == TriggerKind::Gateway && str_field(data, "group_id").is_none()
}

/// First existing group, if any.
pub(crate) fn find_group(
    plane: &dyn ControlPlane,
    function_name: &str,
) -> Result<Option<ApiGroup>, CoreError> {
    let response = plane
        .call(&ApiRequest::list_api_groups())
        .map_err(|source| CoreError::Transport {
            phase: Phase::ApiGroup,
            resource: function_name.to_owned(),
            source,
        })?;
    if !response.is_success() {
        return Err(remote_call_error(Phase::ApiGroup, function_name, &response));
    }
    let list: ApiGroupList = if response.body.is_null() {
        ApiGroupList::default()
    } else {
        response.json().map_err(|e| CoreError::InvalidResponse {
            resource: function_name.to_owned(),
            message: e.to_string(),
        })?
    };
    debug!("{} API group(s) available", list.groups.len());
    Ok(list.groups.into_iter().next())
}

/// First existing group, or a new one named after the function.
pub(crate) fn ensure_group(
    plane: &dyn ControlPlane,
    urn: &FunctionUrn,
    function_name: &str,
) -> Result<ApiGroup, CoreError> {
    if let Some(group) = find_group(plane, function_name)? {
        return Ok(group);
    }
    let body = CreateApiGroupBody {
        name: generated_name(GROUP_PREFIX, urn, TriggerKind::Gateway, 0),
        remark: Some(GROUP_REMARK.to_owned()),
    };
    info!("creating API group {} for {function_name}", body.name);
    let transport = |source| CoreError::Transport {
        phase: Phase::ApiGroup,
        resource: function_name.to_owned(),
        source,
    };
    let request = ApiRequest::create_api_group(&body).map_err(transport)?;
    let response = plane.call(&request).map_err(transport)?;
    if !response.is_success() {
        return Err(remote_call_error(Phase::ApiGroup, function_name, &response));
    }
    response.json().map_err(|e| CoreError::InvalidResponse {
        resource: function_name.to_owned(),
        message: e.to_string(),
    })
}

/// Fill `group_id`, and `sl_domain` unless declared.
pub(crate) fn attach(data: &mut EventData, group: &ApiGroup) {
    data.insert("group_id".to_owned(), Value::String(group.id.clone()));
    if let Some(domain) = &group.sl_domain {
        data.entry("sl_domain".to_owned())
            .or_insert_with(|| Value::String(domain.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgdeploy_remote::{Operation, SimulatedPlatform};
    use serde_json::json;

    fn urn() -> FunctionUrn {
        FunctionUrn::new("cn-north-4", "p1", "default", "hello")
    }

    #[test]
    fn declared_group_needs_no_lookup() {
        let mut data = EventData::new();
        assert!(needs_group(TriggerKind::Gateway, &data));
        assert!(!needs_group(TriggerKind::DedicatedGateway, &data));
        data.insert("group_id".to_owned(), json!("g-1"));
        assert!(!needs_group(TriggerKind::Gateway, &data));
    }

    #[test]
    fn existing_group_is_reused() {
        let platform = SimulatedPlatform::new("cn-north-4");
        platform.insert_api_group(ApiGroup {
            id: "g-first".to_owned(),
            name: "first".to_owned(),
            sl_domain: Some("first.apic.example.com".to_owned()),
            remark: None,
        });
        platform.insert_api_group(ApiGroup {
            id: "g-second".to_owned(),
            ..ApiGroup::default()
        });
        let group = ensure_group(&platform, &urn(), "hello").unwrap();
        assert_eq!(group.id, "g-first");
        assert!(platform.calls_of(Operation::CreateApiGroup).is_empty());
    }

    #[test]
    fn missing_group_is_created_once() {
        let platform = SimulatedPlatform::new("cn-north-4");
        let created = ensure_group(&platform, &urn(), "hello").unwrap();
        assert!(created.name.starts_with("API_Group_"));
        let again = ensure_group(&platform, &urn(), "hello").unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(platform.api_groups().len(), 1);
    }

    #[test]
    fn attach_keeps_a_declared_domain() {
        let group = ApiGroup {
            id: "g-1".to_owned(),
            sl_domain: Some("auto.example.com".to_owned()),
            ..ApiGroup::default()
        };
        let mut data = EventData::new();
        data.insert("sl_domain".to_owned(), json!("mine.example.com"));
        attach(&mut data, &group);
        assert_eq!(data["group_id"], "g-1");
        assert_eq!(data["sl_domain"], "mine.example.com");
    }

    #[test]
    fn listing_failure_is_a_remote_error() {
        let platform = SimulatedPlatform::new("cn-north-4");
        platform.fail_next(Operation::ListApiGroups, 403, "APIG.1002", "denied");
        let err = ensure_group(&platform, &urn(), "hello").unwrap_err();
        assert_eq!(err.phase(), Some(Phase::ApiGroup));
    }
}
