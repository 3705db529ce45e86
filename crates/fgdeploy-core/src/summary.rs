//! Human- and machine-readable summaries of deployed resources.

use fgdeploy_remote::{RemoteFunctionState, RemoteTriggerState};
use fgdeploy_schema::{EventData, TriggerStatus};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub urn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub runtime: String,
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_size: Option<u64>,
    pub timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FunctionSummary {
    /// Summary from a platform response. `None` when the response does not
    /// identify the function.
    pub fn from_remote(state: &RemoteFunctionState) -> Option<Self> {
        if state.func_urn.is_empty() {
            return None;
        }
        Some(Self {
            name: state.func_name.clone(),
            urn: state.func_urn.clone(),
            project_name: state.project_name.clone(),
            runtime: state.runtime.clone().unwrap_or_default(),
            handler: state.handler.clone().unwrap_or_default(),
            code_size: state.code_size,
            timeout: state.timeout.unwrap_or_default(),
            description: state.description.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerSummary {
    pub trigger_id: String,
    pub kind: String,
    pub status: TriggerStatus,
    /// String-valued event data only; nested or numeric values are left out.
    pub event_data: BTreeMap<String, String>,
}

impl TriggerSummary {
    pub fn from_remote(state: &RemoteTriggerState) -> Self {
        Self {
            trigger_id: state.trigger_id.to_string(),
            kind: state.trigger_type_code.clone(),
            status: state.trigger_status,
            event_data: string_entries(&state.event_data),
        }
    }
}

fn string_entries(data: &EventData) -> BTreeMap<String, String> {
    data.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
        .collect()
}
