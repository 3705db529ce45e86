use crate::api_group;
use crate::function::probe;
use crate::trigger::{
    declared_at, find_counterpart, list_triggers, ordinal_of, prepare, remote_call_error,
    Counterpart, ReconcileOptions, TriggerAction, TriggerOutcome,
};
use crate::summary::TriggerSummary;
use crate::triggers::TriggerRegistry;
use crate::{CoreError, Phase};
use fgdeploy_remote::{ApiRequest, ControlPlane};
use fgdeploy_schema::{normalize_keys, DesiredFunctionConfig, DesiredTriggerConfig, FunctionUrn};
use tracing::{info, warn};

/// Deletes declared triggers and functions. Each resource must be confirmed
/// present first; a missing one is a [`CoreError::NotFound`].
pub struct Remover<'a> {
    plane: &'a dyn ControlPlane,
    registry: &'a TriggerRegistry,
    project_id: &'a str,
    options: ReconcileOptions,
}

impl<'a> Remover<'a> {
    pub fn new(
        plane: &'a dyn ControlPlane,
        registry: &'a TriggerRegistry,
        project_id: &'a str,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            plane,
            registry,
            project_id,
            options,
        }
    }

    /// Delete the remote trigger matching `declared[index]`. Matching follows
    /// the same rules as deploy, but only a full match counts, and a gateway
    /// trigger without a declared group is looked for in the existing group.
    pub fn remove_trigger(
        &self,
        function_name: &str,
        urn: &FunctionUrn,
        declared: &[DesiredTriggerConfig],
        index: usize,
    ) -> Result<TriggerOutcome, CoreError> {
        let desired = declared_at(declared, index, function_name)?;
        let Some(strategy) = self.registry.resolve(&desired.kind) else {
            warn!(
                "trigger kind '{}' on {function_name} is not supported, skipping",
                desired.kind
            );
            return Ok(TriggerOutcome {
                kind: desired.kind.clone(),
                action: TriggerAction::Skipped,
                summary: None,
            });
        };
        let kind = strategy.kind();
        let not_found = || CoreError::NotFound {
            what: "trigger",
            resource: format!("{kind} trigger on {function_name}"),
        };
        let mut data = normalize_keys(&desired.event_data);
        if api_group::needs_group(kind, &data) {
            let group = api_group::find_group(self.plane, function_name)?.ok_or_else(not_found)?;
            api_group::attach(&mut data, &group);
        }
        let prepared = prepare(
            strategy,
            function_name,
            urn,
            ordinal_of(declared, index, kind),
            &data,
        )?;
        let remotes = list_triggers(
            self.plane,
            self.project_id,
            urn,
            kind,
            self.options.fail_open_listing,
        )?;
        let counterpart = find_counterpart(&prepared, &remotes, &[], &self.options, function_name)?;
        let remote = match counterpart {
            Counterpart::Full(remote) => remote,
            Counterpart::Identity(_) | Counterpart::None => return Err(not_found()),
        };

        info!("deleting {kind} trigger {} on {function_name}", remote.trigger_id);
        let resource = urn.to_string();
        let response = self
            .plane
            .call(&ApiRequest::delete_trigger(
                self.project_id,
                &resource,
                kind,
                &remote.trigger_id,
            ))
            .map_err(|source| CoreError::Transport {
                phase: Phase::TriggerRemove,
                resource: resource.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(remote_call_error(Phase::TriggerRemove, &resource, &response));
        }
        Ok(TriggerOutcome {
            kind: kind.code().to_owned(),
            action: TriggerAction::Removed,
            summary: Some(TriggerSummary::from_remote(remote)),
        })
    }

    /// Delete a function with all of its versions.
    pub fn remove_function(&self, desired: &DesiredFunctionConfig) -> Result<(), CoreError> {
        if probe(self.plane, self.project_id, &desired.urn)?.is_none() {
            return Err(CoreError::NotFound {
                what: "function",
                resource: desired.name.clone(),
            });
        }
        let resource = desired.urn.unversioned();
        info!("deleting function {resource}");
        let response = self
            .plane
            .call(&ApiRequest::delete_function(self.project_id, &resource))
            .map_err(|source| CoreError::Transport {
                phase: Phase::Remove,
                resource: resource.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(remote_call_error(Phase::Remove, &resource, &response));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgdeploy_remote::model::RemoteTriggerState;
    use fgdeploy_remote::{Operation, RemoteFunctionState, SimulatedPlatform};
    use fgdeploy_schema::{EventData, TriggerId, TriggerStatus};
    use serde_json::json;

    fn urn() -> FunctionUrn {
        FunctionUrn::new("cn-north-4", "p1", "default", "hello").with_version("v1")
    }

    fn platform_with_function() -> SimulatedPlatform {
        let platform = SimulatedPlatform::new("cn-north-4");
        platform
            .insert_function(RemoteFunctionState {
                func_name: "hello".to_owned(),
                func_urn: urn().to_string(),
                ..RemoteFunctionState::default()
            })
            .unwrap();
        platform
    }

    fn smn(topic: &str) -> DesiredTriggerConfig {
        let mut event_data = EventData::new();
        event_data.insert("topicUrn".to_owned(), json!(topic));
        DesiredTriggerConfig {
            kind: "SMN".to_owned(),
            status: TriggerStatus::Active,
            event_type_code: None,
            event_data,
        }
    }

    fn seed_smn(platform: &SimulatedPlatform, id: &str, topic: &str) {
        let mut event_data = EventData::new();
        event_data.insert("topic_urn".to_owned(), json!(topic));
        platform
            .insert_trigger(
                &urn().to_string(),
                RemoteTriggerState {
                    trigger_id: TriggerId::new(id),
                    trigger_type_code: "SMN".to_owned(),
                    trigger_status: TriggerStatus::Active,
                    event_type_code: None,
                    event_data,
                    created_time: None,
                    last_updated_time: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn removes_matching_trigger() {
        let platform = platform_with_function();
        seed_smn(&platform, "s-1", "urn:smn:a");
        seed_smn(&platform, "s-2", "urn:smn:b");
        let registry = TriggerRegistry::with_builtin();
        let remover = Remover::new(&platform, &registry, "p1", ReconcileOptions::default());

        let outcome = remover
            .remove_trigger("hello", &urn(), &[smn("urn:smn:b")], 0)
            .unwrap();
        assert_eq!(outcome.action, TriggerAction::Removed);
        let left = platform.triggers(&urn().to_string());
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].trigger_id, "s-1");
    }

    #[test]
    fn missing_trigger_is_not_found() {
        let platform = platform_with_function();
        let registry = TriggerRegistry::with_builtin();
        let remover = Remover::new(&platform, &registry, "p1", ReconcileOptions::default());
        let err = remover
            .remove_trigger("hello", &urn(), &[smn("urn:smn:a")], 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { what: "trigger", .. }));
        assert!(platform.calls_of(Operation::DeleteFunctionTrigger).is_empty());
    }

    #[test]
    fn gateway_without_group_is_looked_up_but_never_created() {
        let platform = platform_with_function();
        let registry = TriggerRegistry::with_builtin();
        let remover = Remover::new(&platform, &registry, "p1", ReconcileOptions::default());
        let declared = [DesiredTriggerConfig {
            kind: "APIG".to_owned(),
            status: TriggerStatus::Active,
            event_type_code: None,
            event_data: EventData::new(),
        }];
        let err = remover.remove_trigger("hello", &urn(), &declared, 0).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { what: "trigger", .. }));
        assert!(platform.calls_of(Operation::CreateApiGroup).is_empty());
        assert!(platform.calls_of(Operation::ListFunctionTriggers).is_empty());
    }

    #[test]
    fn removes_the_declared_one_of_two_same_kind_triggers() {
        let platform = platform_with_function();
        let registry = TriggerRegistry::with_builtin();
        for (id, topic) in [("l-1", "t1"), ("l-2", "t2")] {
            let mut event_data = EventData::new();
            event_data.insert("log_group_id".to_owned(), json!("g1"));
            event_data.insert("log_topic_id".to_owned(), json!(topic));
            platform
                .insert_trigger(
                    &urn().to_string(),
                    RemoteTriggerState {
                        trigger_id: TriggerId::new(id),
                        trigger_type_code: "LTS".to_owned(),
                        trigger_status: TriggerStatus::Active,
                        event_type_code: None,
                        event_data,
                        created_time: None,
                        last_updated_time: None,
                    },
                )
                .unwrap();
        }
        let lts = |topic: &str| {
            let mut event_data = EventData::new();
            event_data.insert("log_group_id".to_owned(), json!("g1"));
            event_data.insert("log_topic_id".to_owned(), json!(topic));
            DesiredTriggerConfig {
                kind: "log-tail-trigger".to_owned(),
                status: TriggerStatus::Active,
                event_type_code: None,
                event_data,
            }
        };
        let remover = Remover::new(&platform, &registry, "p1", ReconcileOptions::default());
        remover
            .remove_trigger("hello", &urn(), &[lts("t1"), lts("t2")], 1)
            .unwrap();
        let left = platform.triggers(&urn().to_string());
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].trigger_id, "l-1");
    }

    #[test]
    fn function_delete_targets_unversioned_urn() {
        let platform = platform_with_function();
        let registry = TriggerRegistry::with_builtin();
        let remover = Remover::new(&platform, &registry, "p1", ReconcileOptions::default());
        let desired = crate::fixtures::desired_function("hello", urn());
        remover.remove_function(&desired).unwrap();

        let calls = platform.calls_of(Operation::DeleteFunction);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].path.ends_with(":function:default:hello"));
        assert!(platform.function(&urn().to_string()).is_none());
    }

    #[test]
    fn missing_function_is_not_found() {
        let platform = SimulatedPlatform::new("cn-north-4");
        let registry = TriggerRegistry::with_builtin();
        let remover = Remover::new(&platform, &registry, "p1", ReconcileOptions::default());
        let desired = crate::fixtures::desired_function("hello", urn());
        let err = remover.remove_function(&desired).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { what: "function", .. }));
        assert!(platform.calls_of(Operation::DeleteFunction).is_empty());
    }
}
