use fgdeploy_schema::{
    CodeSource, DesiredFunctionConfig, FunctionUrn, LogBinding, NetworkConfig, TagPolicy,
};

/// A zip-packaged function with nothing else declared.
pub(crate) fn desired_function(name: &str, urn: FunctionUrn) -> DesiredFunctionConfig {
    DesiredFunctionConfig {
        name: name.to_owned(),
        urn,
        runtime: None,
        handler: None,
        memory_size: None,
        timeout: None,
        description: None,
        package: "default".to_owned(),
        code: CodeSource::Zip {
            code_uri: format!("{name}.zip"),
            code_filename: None,
        },
        xrole: None,
        app_xrole: None,
        network: NetworkConfig::default(),
        environment: None,
        encrypted_environment: None,
        max_instances: None,
        per_instance_concurrency: None,
        log: LogBinding::default(),
        initializer_handler: None,
        initializer_timeout: None,
        pre_stop_handler: None,
        pre_stop_timeout: None,
        enable_dynamic_memory: None,
        tags: None,
        tag_policy: TagPolicy::Overwrite,
        triggers: Vec::new(),
    }
}
