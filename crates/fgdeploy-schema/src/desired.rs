use crate::keys::EventData;
use crate::trigger::TriggerStatus;
use crate::urn::FunctionUrn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How declared tags combine with tags already present on the function.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TagPolicy {
    /// Declared tags replace the remote set; remote-only keys are deleted.
    #[default]
    Overwrite,
    /// Declared tags are added on top of the remote set.
    Merge,
}

/// Where the function's code comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CodeSource {
    /// A local archive, packaged and uploaded inline.
    Zip {
        code_uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_filename: Option<String>,
    },
    /// An archive already stored in object storage, referenced by URL.
    Obs { code_url: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcBinding {
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub cidr: Option<String>,
    pub gateway: Option<String>,
}

impl VpcBinding {
    /// True when either a VPC or a subnet is declared.
    pub fn is_declared(&self) -> bool {
        self.vpc_id.is_some() || self.subnet_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub vpc: VpcBinding,
    pub disable_public_network: Option<bool>,
    pub trigger_access_vpcs: Option<Vec<String>>,
    pub domain_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBinding {
    pub group_id: Option<String>,
    pub stream_id: Option<String>,
    pub group_name: Option<String>,
    pub stream_name: Option<String>,
}

/// User-declared attributes of one function, read fresh for every
/// reconciliation pass.
///
/// Fields left `None` were not declared; the resolver falls back to the
/// remote value and then to a built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredFunctionConfig {
    pub name: String,
    pub urn: FunctionUrn,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub memory_size: Option<u32>,
    pub timeout: Option<u32>,
    pub description: Option<String>,
    pub package: String,
    pub code: CodeSource,
    pub xrole: Option<String>,
    pub app_xrole: Option<String>,
    pub network: NetworkConfig,
    pub environment: Option<BTreeMap<String, String>>,
    pub encrypted_environment: Option<BTreeMap<String, String>>,
    pub max_instances: Option<i32>,
    pub per_instance_concurrency: Option<u32>,
    pub log: LogBinding,
    pub initializer_handler: Option<String>,
    pub initializer_timeout: Option<u32>,
    pub pre_stop_handler: Option<String>,
    pub pre_stop_timeout: Option<u32>,
    pub enable_dynamic_memory: Option<bool>,
    pub tags: Option<BTreeMap<String, String>>,
    pub tag_policy: TagPolicy,
    pub triggers: Vec<DesiredTriggerConfig>,
}

/// One declared event trigger.
///
/// `event_data` is kept as declared: keys may be camelCase or snake_case and
/// are only normalized when the trigger is canonicalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredTriggerConfig {
    pub kind: String,
    pub status: TriggerStatus,
    pub event_type_code: Option<String>,
    pub event_data: EventData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vpc_binding_declared_by_vpc_or_subnet() {
        assert!(!VpcBinding::default().is_declared());
        let vpc_only = VpcBinding {
            vpc_id: Some("vpc-1".to_owned()),
            ..VpcBinding::default()
        };
        let subnet_only = VpcBinding {
            subnet_id: Some("subnet-1".to_owned()),
            ..VpcBinding::default()
        };
        assert!(vpc_only.is_declared());
        assert!(subnet_only.is_declared());
    }

    #[test]
    fn tag_policy_defaults_to_overwrite() {
        assert_eq!(TagPolicy::default(), TagPolicy::Overwrite);
        let merge: TagPolicy = serde_json::from_str("\"merge\"").unwrap();
        assert_eq!(merge, TagPolicy::Merge);
    }
}
