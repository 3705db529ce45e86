use crate::desired::{
    CodeSource, DesiredFunctionConfig, DesiredTriggerConfig, LogBinding, NetworkConfig, VpcBinding,
};
use crate::manifest::{CodeType, FunctionSection, ManifestError, ManifestV1, ProviderSection};
use crate::types::ProjectId;
use crate::urn::FunctionUrn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DEFAULT_PACKAGE: &str = "default";

/// Inputs that come from outside the manifest.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Project id to use when the manifest's provider section has none.
    pub project_id: Option<String>,
    /// Version segment for every function URN; `latest` when absent.
    pub qualifier: Option<String>,
}

/// Validated manifest with provider-level values pushed down into each
/// function. Functions stay in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedManifest {
    pub service: Option<String>,
    pub region: String,
    pub project_id: ProjectId,
    pub functions: Vec<DesiredFunctionConfig>,
}

impl ManifestV1 {
    pub fn normalize(&self, options: &NormalizeOptions) -> Result<NormalizedManifest, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }

        let region = self.provider.region.trim().to_owned();
        if region.is_empty() {
            return Err(ManifestError::EmptyRegion);
        }

        let project_id = non_empty(self.provider.project_id.as_deref())
            .or_else(|| non_empty(options.project_id.as_deref()))
            .ok_or(ManifestError::MissingProjectId)?;

        let mut seen = BTreeSet::new();
        let mut functions = Vec::with_capacity(self.functions.len());
        for section in &self.functions {
            let function = normalize_function(section, &self.provider, &region, &project_id, options)?;
            if !seen.insert(function.name.clone()) {
                return Err(ManifestError::DuplicateFunction(function.name));
            }
            functions.push(function);
        }

        Ok(NormalizedManifest {
            service: self.service.clone(),
            region,
            project_id: ProjectId::new(project_id),
            functions,
        })
    }
}

impl NormalizedManifest {
    pub fn function(&self, name: &str) -> Option<&DesiredFunctionConfig> {
        self.functions.iter().find(|f| f.name == name)
    }
}

fn normalize_function(
    section: &FunctionSection,
    provider: &ProviderSection,
    region: &str,
    project_id: &str,
    options: &NormalizeOptions,
) -> Result<DesiredFunctionConfig, ManifestError> {
    let name = section.name.trim().to_owned();
    if name.is_empty() {
        return Err(ManifestError::EmptyFunctionName);
    }
    if name.contains(':') {
        return Err(ManifestError::InvalidFunctionName(name));
    }

    let package = non_empty(section.package.as_deref())
        .or_else(|| non_empty(provider.package.as_deref()))
        .unwrap_or_else(|| DEFAULT_PACKAGE.to_owned());

    let mut urn = FunctionUrn::new(region, project_id, &package, &name);
    if let Some(qualifier) = options.qualifier.as_deref() {
        urn = urn.with_version(qualifier);
    }

    let code = match section.code_type {
        CodeType::Zip => CodeSource::Zip {
            code_uri: non_empty(section.code_uri.as_deref())
                .ok_or_else(|| ManifestError::MissingCodeUri(name.clone()))?,
            code_filename: non_empty(section.code_filename.as_deref()),
        },
        CodeType::Obs => CodeSource::Obs {
            code_url: non_empty(section.code_url.as_deref()),
        },
    };

    let vpc = section.vpc.clone().unwrap_or_default();
    let network = NetworkConfig {
        vpc: VpcBinding {
            vpc_id: non_empty(vpc.vpc_id.as_deref()),
            subnet_id: non_empty(vpc.subnet_id.as_deref()),
            cidr: non_empty(vpc.cidr.as_deref()),
            gateway: non_empty(vpc.gateway.as_deref()),
        },
        disable_public_network: vpc.disable_public_network,
        trigger_access_vpcs: vpc.trigger_access_vpcs.map(|v| normalize_string_list(&v)),
        domain_names: section.domain_names.as_deref().map(normalize_string_list),
    };

    let log = section.log.clone().unwrap_or_default();
    let concurrency = section.concurrency.clone().unwrap_or_default();
    let environment = section.environment.clone().unwrap_or_default();

    let mut triggers = Vec::with_capacity(section.triggers.len());
    for (index, trigger) in section.triggers.iter().enumerate() {
        let kind = trigger.kind.trim().to_owned();
        if kind.is_empty() {
            return Err(ManifestError::EmptyTriggerKind {
                function: name.clone(),
                index,
            });
        }
        triggers.push(DesiredTriggerConfig {
            kind,
            status: trigger.status.unwrap_or_default(),
            event_type_code: non_empty(trigger.event_type_code.as_deref()),
            event_data: trigger.event_data.clone(),
        });
    }

    Ok(DesiredFunctionConfig {
        name,
        urn,
        runtime: non_empty(section.runtime.as_deref())
            .or_else(|| non_empty(provider.runtime.as_deref())),
        handler: non_empty(section.handler.as_deref()),
        memory_size: section.memory_size.or(provider.memory_size),
        timeout: section.timeout.or(provider.timeout),
        description: section.description.clone(),
        package,
        code,
        xrole: non_empty(section.xrole.as_deref()).or_else(|| non_empty(provider.xrole.as_deref())),
        app_xrole: non_empty(section.app_xrole.as_deref()),
        network,
        environment: environment.variables,
        encrypted_environment: environment.encrypted_variables,
        max_instances: concurrency.max_instances,
        per_instance_concurrency: concurrency.per_instance,
        log: LogBinding {
            group_id: non_empty(log.group_id.as_deref()),
            stream_id: non_empty(log.stream_id.as_deref()),
            group_name: non_empty(log.group_name.as_deref()),
            stream_name: non_empty(log.stream_name.as_deref()),
        },
        initializer_handler: non_empty(section.initializer_handler.as_deref()),
        initializer_timeout: section.initializer_timeout,
        pre_stop_handler: non_empty(section.pre_stop_handler.as_deref()),
        pre_stop_timeout: section.pre_stop_timeout,
        enable_dynamic_memory: section.enable_dynamic_memory,
        tags: section.tags.clone(),
        tag_policy: section
            .tag_policy
            .or(provider.tag_policy)
            .unwrap_or_default(),
        triggers,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn normalize_string_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
