use crate::desired::TagPolicy;
use crate::keys::EventData;
use crate::trigger::TriggerStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("provider.region must not be empty")]
    EmptyRegion,
    #[error("no project id: set provider.project_id or configure the remote")]
    MissingProjectId,
    #[error("function name must not be empty")]
    EmptyFunctionName,
    #[error("invalid function name '{0}': ':' is reserved for URNs")]
    InvalidFunctionName(String),
    #[error("function '{0}' is declared more than once")]
    DuplicateFunction(String),
    #[error("function '{0}' uses zip code but declares no code_uri")]
    MissingCodeUri(String),
    #[error("trigger #{index} of function '{function}' has an empty kind")]
    EmptyTriggerKind { function: String, index: usize },
    #[error("invalid function URN: '{0}'")]
    InvalidUrn(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ManifestV1 {
    pub manifest_version: u32,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub functions: Vec<FunctionSection>,
}

/// Service-wide values every function inherits unless it declares its own.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub xrole: Option<String>,
    #[serde(default)]
    pub tag_policy: Option<TagPolicy>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            region: default_region(),
            project_id: None,
            package: None,
            runtime: None,
            memory_size: None,
            timeout: None,
            xrole: None,
            tag_policy: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    #[default]
    Zip,
    Obs,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FunctionSection {
    pub name: String,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub code_type: CodeType,
    #[serde(default)]
    pub code_uri: Option<String>,
    #[serde(default)]
    pub code_url: Option<String>,
    #[serde(default)]
    pub code_filename: Option<String>,
    #[serde(default)]
    pub xrole: Option<String>,
    #[serde(default)]
    pub app_xrole: Option<String>,
    #[serde(default)]
    pub environment: Option<EnvironmentSection>,
    #[serde(default)]
    pub vpc: Option<VpcSection>,
    #[serde(default)]
    pub domain_names: Option<Vec<String>>,
    #[serde(default)]
    pub concurrency: Option<ConcurrencySection>,
    #[serde(default)]
    pub log: Option<LogSection>,
    #[serde(default)]
    pub initializer_handler: Option<String>,
    #[serde(default)]
    pub initializer_timeout: Option<u32>,
    #[serde(default)]
    pub pre_stop_handler: Option<String>,
    #[serde(default)]
    pub pre_stop_timeout: Option<u32>,
    #[serde(default)]
    pub enable_dynamic_memory: Option<bool>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tag_policy: Option<TagPolicy>,
    #[serde(default)]
    pub triggers: Vec<TriggerSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSection {
    #[serde(default)]
    pub variables: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub encrypted_variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VpcSection {
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub disable_public_network: Option<bool>,
    #[serde(default)]
    pub trigger_access_vpcs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencySection {
    /// Instance ceiling; `-1` lifts the limit.
    #[serde(default)]
    pub max_instances: Option<i32>,
    /// Concurrent requests served by a single instance.
    #[serde(default)]
    pub per_instance: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub stream_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TriggerSection {
    pub kind: String,
    #[serde(default)]
    pub status: Option<TriggerStatus>,
    #[serde(default)]
    pub event_type_code: Option<String>,
    #[serde(default)]
    pub event_data: EventData,
}

fn default_region() -> String {
    "cn-north-4".to_owned()
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
