use fgdeploy_core::{
    CoreError, Deployer, FailurePolicy, FunctionAction, ReconcileOptions, Scope, Selection,
    TriggerAction,
};
use fgdeploy_remote::{
    ApiRequest, ApiResponse, CodePackager, ControlPlane, Operation, PackagedCode, RemoteError,
    SimulatedPlatform,
};
use fgdeploy_schema::{parse_manifest_str, CodeSource, NormalizeOptions, NormalizedManifest};
use serde_json::Value;
use std::sync::Arc;

const MANIFEST: &str = r#"
manifest_version = 1
service = "orders"

[provider]
region = "cn-north-4"
project_id = "p1"
runtime = "Python3.9"

[[functions]]
name = "ingest"
code_uri = "ingest.zip"
handler = "index.handler"
tags = { team = "core" }

[[functions.triggers]]
kind = "timer-trigger"
event_data = { schedule = "5m" }

[[functions.triggers]]
kind = "SMN"
event_data = { topicUrn = "urn:smn:cn-north-4:p1:orders" }

[[functions]]
name = "report"
code_uri = "report.zip"

[[functions.triggers]]
kind = "LTS"
event_data = { logGroupId = "g1", logTopicId = "t1" }
"#;

struct FixedPackager(&'static str);

impl CodePackager for FixedPackager {
    fn package(&self, _code: &CodeSource) -> Result<PackagedCode, RemoteError> {
        Ok(PackagedCode::Inline {
            file: self.0.to_owned(),
            size: self.0.len() as u64,
            filename: None,
        })
    }
}

fn manifest(source: &str) -> NormalizedManifest {
    parse_manifest_str(source)
        .unwrap()
        .normalize(&NormalizeOptions::default())
        .unwrap()
}

fn deployer(platform: &Arc<SimulatedPlatform>) -> Deployer {
    Deployer::new(Box::new(Arc::clone(platform)), Box::new(FixedPackager("UEsDBA==")))
        .with_interrupt(|| false)
}

fn new_platform() -> Arc<SimulatedPlatform> {
    Arc::new(SimulatedPlatform::new("cn-north-4"))
}

#[test]
fn second_deploy_changes_nothing_remote_beyond_function_update() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(MANIFEST);

    let first = d.deploy(&m, &Selection::all()).unwrap();
    assert!(first.succeeded());
    assert!(first
        .functions
        .iter()
        .all(|f| f.function.as_ref().unwrap().action == FunctionAction::Created));
    let triggers_after_first = platform.snapshot().triggers;

    platform.clear_calls();
    let second = d.deploy(&m, &Selection::all()).unwrap();
    assert!(second.succeeded());
    for report in &second.functions {
        assert_eq!(report.function.as_ref().unwrap().action, FunctionAction::Updated);
        assert!(report
            .triggers
            .iter()
            .all(|t| t.action == TriggerAction::Unchanged));
    }
    assert!(platform.calls_of(Operation::CreateFunction).is_empty());
    assert!(platform.calls_of(Operation::CreateFunctionTrigger).is_empty());
    assert!(platform.calls_of(Operation::UpdateTrigger).is_empty());
    assert_eq!(platform.snapshot().triggers, triggers_after_first);
}

#[test]
fn identical_code_is_reported_and_config_still_applied() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(MANIFEST);
    d.deploy(&m, &Selection::all()).unwrap();

    platform.clear_calls();
    let report = d.deploy(&m, &Selection::all()).unwrap();
    let ingest = report.functions[0].function.as_ref().unwrap();
    assert!(ingest.code_unchanged);
    assert_eq!(platform.calls_of(Operation::UpdateFunctionConfig).len(), 2);
}

#[test]
fn timer_schedule_change_updates_trigger_in_place() {
    let platform = new_platform();
    let d = deployer(&platform);
    d.deploy(&manifest(MANIFEST), &Selection::all()).unwrap();
    let before: Vec<_> = platform
        .snapshot()
        .triggers
        .values()
        .flatten()
        .filter(|t| t.trigger_type_code == "TIMER")
        .map(|t| t.trigger_id.clone())
        .collect();

    let changed = manifest(&MANIFEST.replace("schedule = \"5m\"", "schedule = \"3m\""));
    let report = d
        .deploy(&changed, &Selection::from_filters(None, Some("TIMER".to_owned())))
        .unwrap();
    let timer = &report.functions[0].triggers[0];
    assert_eq!(timer.action, TriggerAction::Updated);

    let timers: Vec<_> = platform
        .snapshot()
        .triggers
        .values()
        .flatten()
        .filter(|t| t.trigger_type_code == "TIMER")
        .cloned()
        .collect();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].trigger_id, before[0]);
    assert_eq!(timers[0].event_data["schedule"], Value::from("3m"));
}

#[test]
fn removing_schedule_falls_back_to_default() {
    let platform = new_platform();
    let d = deployer(&platform);
    let no_schedule = MANIFEST.replace("event_data = { schedule = \"5m\" }", "");
    d.deploy(&manifest(&no_schedule), &Selection::all()).unwrap();

    let timer = platform
        .snapshot()
        .triggers
        .values()
        .flatten()
        .find(|t| t.trigger_type_code == "TIMER")
        .cloned()
        .unwrap();
    assert_eq!(timer.event_data["schedule"], Value::from("3m"));
    assert_eq!(timer.event_data["schedule_type"], Value::from("Rate"));
}

/// Drops `func_urn` from create responses, as some platform versions do.
struct SparseCreate(Arc<SimulatedPlatform>);

impl ControlPlane for SparseCreate {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        let mut response = self.0.call(request)?;
        if request.operation() == Operation::CreateFunction {
            if let Some(body) = response.body.as_object_mut() {
                body.remove("func_urn");
            }
        }
        Ok(response)
    }
}

#[test]
fn create_summary_falls_back_to_probe() {
    let platform = new_platform();
    let d = Deployer::new(
        Box::new(SparseCreate(Arc::clone(&platform))),
        Box::new(FixedPackager("UEsDBA==")),
    )
    .with_interrupt(|| false);
    let report = d.deploy(&manifest(MANIFEST), &Selection::all()).unwrap();
    assert!(report.succeeded());
    let summary = &report.functions[0].function.as_ref().unwrap().summary;
    assert_eq!(summary.name, "ingest");
    assert_eq!(summary.urn, "urn:fss:cn-north-4:p1:function:default:ingest:latest");
    assert_eq!(summary.runtime, "Python3.9");
}

#[test]
fn continue_policy_reports_every_failure() {
    let platform = new_platform();
    platform.fail_next(Operation::CreateFunction, 400, "FSS.0400", "quota exceeded");
    let report = deployer(&platform)
        .deploy(&manifest(MANIFEST), &Selection::all())
        .unwrap();
    assert!(!report.succeeded());
    let failures: Vec<_> = report.failures().map(|f| f.name.as_str()).collect();
    assert_eq!(failures, vec!["ingest"]);
    assert!(report.functions[1].succeeded());
    assert!(report.skipped.is_empty());
}

#[test]
fn abort_policy_stops_after_first_failure() {
    let platform = new_platform();
    platform.fail_transport_next(Operation::CreateFunction);
    let report = deployer(&platform)
        .with_failure_policy(FailurePolicy::Abort)
        .deploy(&manifest(MANIFEST), &Selection::all())
        .unwrap();
    assert_eq!(report.functions.len(), 1);
    assert!(matches!(
        report.functions[0].error,
        Some(CoreError::Transport { .. })
    ));
    assert_eq!(report.skipped, vec!["report"]);
}

#[test]
fn trigger_failure_stops_remaining_triggers_of_that_function() {
    let platform = new_platform();
    platform.fail_next(Operation::CreateFunctionTrigger, 500, "FSS.0500", "internal");
    let report = deployer(&platform)
        .deploy(&manifest(MANIFEST), &Selection::all())
        .unwrap();
    let ingest = &report.functions[0];
    assert!(ingest.function.is_some());
    assert!(ingest.triggers.is_empty());
    assert!(ingest.error.is_some());
    assert!(report.functions[1].succeeded());
}

#[test]
fn interrupt_before_start_attempts_nothing() {
    let platform = new_platform();
    let report = Deployer::new(Box::new(Arc::clone(&platform)), Box::new(FixedPackager("x")))
        .with_interrupt(|| true)
        .deploy(&manifest(MANIFEST), &Selection::all())
        .unwrap();
    assert!(report.interrupted);
    assert!(report.functions.is_empty());
    assert_eq!(report.skipped, vec!["ingest", "report"]);
    assert!(platform.calls().is_empty());
}

#[test]
fn function_scope_leaves_triggers_alone() {
    let platform = new_platform();
    let selection = Selection::from_filters(Some("ingest".to_owned()), None);
    assert_eq!(selection.scope, Scope::FunctionOnly);
    let report = deployer(&platform)
        .deploy(&manifest(MANIFEST), &selection)
        .unwrap();
    assert_eq!(report.functions.len(), 1);
    assert!(report.functions[0].triggers.is_empty());
    assert!(platform.calls_of(Operation::ListFunctionTriggers).is_empty());
}

#[test]
fn listing_failure_is_fatal_unless_fail_open() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(MANIFEST);
    let only_report = Selection::from_filters(Some("report".to_owned()), None);
    d.deploy(&m, &only_report).unwrap();

    let triggers = Selection::from_filters(Some("report".to_owned()), Some("lts".to_owned()));
    platform.fail_next(Operation::ListFunctionTriggers, 500, "FSS.0500", "internal");
    let report = d.deploy(&m, &triggers).unwrap();
    assert!(!report.succeeded());

    platform.fail_next(Operation::ListFunctionTriggers, 500, "FSS.0500", "internal");
    let report = deployer(&platform)
        .with_options(ReconcileOptions {
            fail_open_listing: true,
            ..ReconcileOptions::default()
        })
        .deploy(&m, &triggers)
        .unwrap();
    assert!(report.succeeded());
    assert_eq!(report.functions[0].triggers[0].action, TriggerAction::Created);
}

#[test]
fn remove_then_info_shows_nothing_deployed() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(MANIFEST);
    d.deploy(&m, &Selection::all()).unwrap();

    let info = d.info(&m, &Selection::all()).unwrap();
    assert!(info.functions.iter().all(|f| f.deployed.is_some()));

    let removed = d.remove(&m, &Selection::all()).unwrap();
    assert!(removed.succeeded());
    assert!(removed.functions.iter().all(|f| f.removed));
    assert!(platform.snapshot().functions.is_empty());
    assert!(platform.snapshot().triggers.values().all(Vec::is_empty));

    let info = d.info(&m, &Selection::all()).unwrap();
    assert!(info.functions.iter().all(|f| f.deployed.is_none()));
}

#[test]
fn trigger_only_remove_keeps_function() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(MANIFEST);
    d.deploy(&m, &Selection::all()).unwrap();

    let report = d
        .remove(&m, &Selection::from_filters(None, Some("smn".to_owned())))
        .unwrap();
    assert!(report.succeeded());
    assert_eq!(report.functions[0].triggers[0].action, TriggerAction::Removed);
    assert!(!report.functions[0].removed);
    assert_eq!(platform.snapshot().functions.len(), 2);
    assert!(platform.calls_of(Operation::DeleteFunction).is_empty());
}

const SAME_KIND_MANIFEST: &str = r#"
manifest_version = 1
service = "metrics"

[provider]
region = "cn-north-4"
project_id = "p1"
runtime = "Python3.9"

[[functions]]
name = "collect"
code_uri = "collect.zip"

[[functions.triggers]]
kind = "timer-trigger"
event_data = { schedule = "3m" }

[[functions.triggers]]
kind = "timer-trigger"
event_data = { schedule = "5m" }

[[functions.triggers]]
kind = "LTS"
event_data = { logGroupId = "g1", logTopicId = "t1" }

[[functions.triggers]]
kind = "LTS"
event_data = { logGroupId = "g1", logTopicId = "t2" }
"#;

fn remote_of_kind(
    platform: &SimulatedPlatform,
    code: &str,
) -> Vec<fgdeploy_remote::RemoteTriggerState> {
    platform
        .snapshot()
        .triggers
        .values()
        .flatten()
        .filter(|t| t.trigger_type_code == code)
        .cloned()
        .collect()
}

#[test]
fn same_kind_triggers_on_one_function_stay_separate_across_deploys() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(SAME_KIND_MANIFEST);

    let first = d.deploy(&m, &Selection::all()).unwrap();
    assert!(first.succeeded());
    assert!(first.functions[0]
        .triggers
        .iter()
        .all(|t| t.action == TriggerAction::Created));
    assert_eq!(remote_of_kind(&platform, "TIMER").len(), 2);
    assert_eq!(remote_of_kind(&platform, "LTS").len(), 2);
    let after_first = platform.snapshot().triggers;

    platform.clear_calls();
    let second = d.deploy(&m, &Selection::all()).unwrap();
    assert!(second.succeeded());
    assert_eq!(second.functions[0].triggers.len(), 4);
    assert!(second.functions[0]
        .triggers
        .iter()
        .all(|t| t.action == TriggerAction::Unchanged));
    assert!(platform.calls_of(Operation::CreateFunctionTrigger).is_empty());
    assert!(platform.calls_of(Operation::UpdateTrigger).is_empty());
    assert_eq!(platform.snapshot().triggers, after_first);

    let mut schedules: Vec<String> = remote_of_kind(&platform, "TIMER")
        .iter()
        .map(|t| t.event_data["schedule"].as_str().unwrap_or_default().to_owned())
        .collect();
    schedules.sort();
    assert_eq!(schedules, vec!["3m", "5m"]);
}

#[test]
fn same_kind_triggers_are_each_removed() {
    let platform = new_platform();
    let d = deployer(&platform);
    let m = manifest(SAME_KIND_MANIFEST);
    d.deploy(&m, &Selection::all()).unwrap();

    let report = d
        .remove(&m, &Selection::from_filters(Some("collect".to_owned()), Some("lts".to_owned())))
        .unwrap();
    assert!(report.succeeded());
    assert_eq!(report.functions[0].triggers.len(), 2);
    assert!(remote_of_kind(&platform, "LTS").is_empty());
    assert_eq!(remote_of_kind(&platform, "TIMER").len(), 2);
}
