//! Wire models for the function control plane.
//!
//! Field names follow the platform's snake_case JSON. Optional fields are
//! omitted from outgoing bodies rather than sent as `null`, so an absent
//! value never overwrites anything on the server.

use chrono::{DateTime, Utc};
use fgdeploy_schema::{EventData, TriggerId, TriggerKind, TriggerStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Function type requested on create.
pub const FUNCTION_TYPE_V2: &str = "v2";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncCode {
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncVpc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// Concurrency settings: `concurrency` is the instance ceiling (`-1` for
/// unlimited), `concurrent_num` the per-instance request count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_num: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerAccessVpc {
    pub vpc_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkController {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_public_network: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_access_vpcs: Option<Vec<TriggerAccessVpc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub group_id: String,
    pub stream_id: String,
    pub group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,
}

/// Server-side view of a function as returned by `ShowFunctionConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFunctionState {
    #[serde(default)]
    pub func_name: String,
    #[serde(default)]
    pub func_urn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Plain environment variables, as a JSON-encoded object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_xrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_vpc: Option<FuncVpc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_config: Option<StrategyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_controller: Option<NetworkController>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depend_version_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer_handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dynamic_memory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteFunctionState {
    /// Plain environment variables decoded from `user_data`.
    ///
    /// Malformed or non-object payloads decode to `None`.
    pub fn environment(&self) -> Option<BTreeMap<String, String>> {
        decode_user_data(self.user_data.as_deref())
    }

    pub fn encrypted_environment(&self) -> Option<BTreeMap<String, String>> {
        decode_user_data(self.encrypted_user_data.as_deref())
    }
}

/// Encode environment variables the way `user_data` carries them.
pub fn encode_user_data(variables: &BTreeMap<String, String>) -> String {
    serde_json::to_string(variables).unwrap_or_else(|_| "{}".to_owned())
}

fn decode_user_data(raw: Option<&str>) -> Option<BTreeMap<String, String>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str(raw).ok()
}

/// One trigger as returned by `ListFunctionTriggers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTriggerState {
    pub trigger_id: TriggerId,
    /// Kept as a raw code: the platform may list kinds this tool does not model.
    pub trigger_type_code: String,
    #[serde(default)]
    pub trigger_status: TriggerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_code: Option<String>,
    #[serde(default)]
    pub event_data: EventData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_time: Option<DateTime<Utc>>,
}

impl RemoteTriggerState {
    pub fn kind(&self) -> Option<TriggerKind> {
        TriggerKind::from_code(&self.trigger_type_code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateFunctionBody {
    pub func_name: String,
    pub package: String,
    pub runtime: String,
    pub handler: String,
    pub memory_size: u32,
    pub timeout: u32,
    pub code_type: String,
    #[serde(rename = "type")]
    pub function_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_xrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_code: Option<FuncCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_vpc: Option<FuncVpc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_controller: Option<NetworkController>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer_handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateFunctionCodeBody {
    pub code_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_code: Option<FuncCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depend_version_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateFunctionConfigBody {
    pub func_name: String,
    pub runtime: String,
    pub handler: String,
    pub memory_size: u32,
    pub timeout: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_xrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_vpc: Option<FuncVpc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_config: Option<StrategyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_controller: Option<NetworkController>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer_handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dynamic_memory: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTriggerBody {
    pub trigger_type_code: TriggerKind,
    pub trigger_status: TriggerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_code: Option<String>,
    #[serde(default)]
    pub event_data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTriggerBody {
    pub trigger_status: TriggerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<EventData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Tag list used both as the `ListTags` response and the create/delete body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

impl TagList {
    pub fn from_map(tags: &BTreeMap<String, String>) -> Self {
        Self {
            tags: tags
                .iter()
                .map(|(key, value)| TagEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.tags.into_iter().map(|t| (t.key, t.value)).collect()
    }
}

/// An API gateway group that gateway triggers publish under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Subdomain the gateway assigned to the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiGroupList {
    #[serde(default)]
    pub groups: Vec<ApiGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateApiGroupBody {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// Identity-service project; one per region for a given account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Result of a synchronous invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    #[serde(default)]
    pub request_id: String,
    /// Whatever the function returned, as the platform rendered it.
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub status: i32,
}
