//! Field precedence for function create and update requests.
//!
//! Every attribute resolves the same way: the declared value if present,
//! else the value last observed on the platform, else a built-in default.
//! Attributes without a default resolve to `None` and are left out of the
//! request body.

use fgdeploy_remote::model::{
    encode_user_data, CreateFunctionBody, FuncVpc, LogConfig, NetworkController,
    RemoteFunctionState, StrategyConfig, TriggerAccessVpc, UpdateFunctionCodeBody,
    UpdateFunctionConfigBody, FUNCTION_TYPE_V2,
};
use fgdeploy_remote::PackagedCode;
use fgdeploy_schema::DesiredFunctionConfig;

pub const DEFAULT_HANDLER: &str = "index.handler";
pub const DEFAULT_MEMORY_SIZE: u32 = 256;
pub const DEFAULT_TIMEOUT: u32 = 30;
pub const DEFAULT_RUNTIME: &str = "Node.js14.18";

/// Declared, then remote, then default.
pub fn resolve<T>(declared: Option<T>, remote: Option<T>, default: Option<T>) -> Option<T> {
    declared.or(remote).or(default)
}

/// Resolves request fields for one function against an optional remote
/// snapshot. Pure: identical inputs always produce identical bodies.
pub struct ConfigResolver<'a> {
    desired: &'a DesiredFunctionConfig,
    remote: Option<&'a RemoteFunctionState>,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(desired: &'a DesiredFunctionConfig, remote: Option<&'a RemoteFunctionState>) -> Self {
        Self { desired, remote }
    }

    fn remote_field<T>(&self, f: impl FnOnce(&RemoteFunctionState) -> Option<T>) -> Option<T> {
        self.remote.and_then(f)
    }

    pub fn handler(&self) -> String {
        resolve(
            self.desired.handler.clone(),
            self.remote_field(|r| r.handler.clone()),
            Some(DEFAULT_HANDLER.to_owned()),
        )
        .unwrap_or_default()
    }

    pub fn memory_size(&self) -> u32 {
        resolve(
            self.desired.memory_size,
            self.remote_field(|r| r.memory_size),
            Some(DEFAULT_MEMORY_SIZE),
        )
        .unwrap_or(DEFAULT_MEMORY_SIZE)
    }

    pub fn timeout(&self) -> u32 {
        resolve(
            self.desired.timeout,
            self.remote_field(|r| r.timeout),
            Some(DEFAULT_TIMEOUT),
        )
        .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn runtime(&self) -> String {
        resolve(
            self.desired.runtime.clone(),
            self.remote_field(|r| r.runtime.clone()),
            Some(DEFAULT_RUNTIME.to_owned()),
        )
        .unwrap_or_default()
    }

    pub fn description(&self) -> Option<String> {
        resolve(
            self.desired.description.clone(),
            self.remote_field(|r| r.description.clone()),
            None,
        )
    }

    pub fn xrole(&self) -> Option<String> {
        resolve(
            self.desired.xrole.clone(),
            self.remote_field(|r| r.xrole.clone()),
            None,
        )
    }

    pub fn app_xrole(&self) -> Option<String> {
        resolve(
            self.desired.app_xrole.clone(),
            self.remote_field(|r| r.app_xrole.clone()),
            None,
        )
    }

    /// VPC binding, resolved per field. Omitted unless a VPC or subnet id
    /// resolves.
    pub fn func_vpc(&self) -> Option<FuncVpc> {
        let declared = &self.desired.network.vpc;
        let remote = self.remote_field(|r| r.func_vpc.clone()).unwrap_or_default();
        let vpc = FuncVpc {
            vpc_id: resolve(declared.vpc_id.clone(), remote.vpc_id, None),
            subnet_id: resolve(declared.subnet_id.clone(), remote.subnet_id, None),
            cidr: resolve(declared.cidr.clone(), remote.cidr, None),
            gateway: resolve(declared.gateway.clone(), remote.gateway, None),
        };
        (vpc.vpc_id.is_some() || vpc.subnet_id.is_some()).then_some(vpc)
    }

    pub fn network_controller(&self) -> Option<NetworkController> {
        let network = &self.desired.network;
        let remote = self
            .remote_field(|r| r.network_controller.clone())
            .unwrap_or_default();
        let declared_vpcs = network.trigger_access_vpcs.as_ref().map(|ids| {
            ids.iter()
                .map(|id| TriggerAccessVpc { vpc_id: id.clone() })
                .collect::<Vec<_>>()
        });
        let controller = NetworkController {
            disable_public_network: resolve(
                network.disable_public_network,
                remote.disable_public_network,
                None,
            ),
            trigger_access_vpcs: resolve(declared_vpcs, remote.trigger_access_vpcs, None),
        };
        (controller.disable_public_network.is_some() || controller.trigger_access_vpcs.is_some())
            .then_some(controller)
    }

    pub fn domain_names(&self) -> Option<Vec<String>> {
        resolve(
            self.desired.network.domain_names.clone(),
            self.remote_field(|r| r.domain_names.clone()),
            None,
        )
    }

    /// Plain environment. An explicitly declared empty table clears the
    /// remote variables.
    pub fn user_data(&self) -> Option<String> {
        resolve(
            self.desired.environment.as_ref().map(encode_user_data),
            self.remote_field(|r| r.user_data.clone()),
            None,
        )
    }

    pub fn encrypted_user_data(&self) -> Option<String> {
        resolve(
            self.desired.encrypted_environment.as_ref().map(encode_user_data),
            self.remote_field(|r| r.encrypted_user_data.clone()),
            None,
        )
    }

    /// Concurrency ceiling and per-instance count; only sent on update.
    pub fn strategy_config(&self) -> Option<StrategyConfig> {
        let remote = self
            .remote_field(|r| r.strategy_config.clone())
            .unwrap_or_default();
        let strategy = StrategyConfig {
            concurrency: resolve(self.desired.max_instances, remote.concurrency, None),
            concurrent_num: resolve(
                self.desired.per_instance_concurrency,
                remote.concurrent_num,
                None,
            ),
        };
        (strategy.concurrency.is_some() || strategy.concurrent_num.is_some()).then_some(strategy)
    }

    /// Log sink. Group id, stream id and group name must all resolve or the
    /// whole block is omitted.
    pub fn log_config(&self) -> Option<LogConfig> {
        let declared = &self.desired.log;
        let remote = self.remote_field(|r| r.log_config.clone());
        let group_id = resolve(
            declared.group_id.clone(),
            remote.as_ref().map(|l| l.group_id.clone()),
            None,
        )?;
        let stream_id = resolve(
            declared.stream_id.clone(),
            remote.as_ref().map(|l| l.stream_id.clone()),
            None,
        )?;
        let group_name = resolve(
            declared.group_name.clone(),
            remote.as_ref().map(|l| l.group_name.clone()),
            None,
        )?;
        let stream_name = resolve(
            declared.stream_name.clone(),
            remote.and_then(|l| l.stream_name),
            None,
        );
        [&group_id, &stream_id, &group_name]
            .iter()
            .all(|v| !v.is_empty())
            .then_some(LogConfig {
                group_id,
                stream_id,
                group_name,
                stream_name,
            })
    }

    pub fn initializer_handler(&self) -> Option<String> {
        resolve(
            self.desired.initializer_handler.clone(),
            self.remote_field(|r| r.initializer_handler.clone()),
            None,
        )
    }

    pub fn initializer_timeout(&self) -> Option<u32> {
        resolve(
            self.desired.initializer_timeout,
            self.remote_field(|r| r.initializer_timeout),
            None,
        )
    }

    pub fn pre_stop_handler(&self) -> Option<String> {
        resolve(
            self.desired.pre_stop_handler.clone(),
            self.remote_field(|r| r.pre_stop_handler.clone()),
            None,
        )
    }

    pub fn pre_stop_timeout(&self) -> Option<u32> {
        resolve(
            self.desired.pre_stop_timeout,
            self.remote_field(|r| r.pre_stop_timeout),
            None,
        )
    }

    pub fn enable_dynamic_memory(&self) -> Option<bool> {
        resolve(
            self.desired.enable_dynamic_memory,
            self.remote_field(|r| r.enable_dynamic_memory),
            None,
        )
    }

    /// The create endpoint ignores domain names, encrypted variables and the
    /// dynamic-memory flag; when any is declared a follow-up config update
    /// carries them.
    pub fn needs_followup_update(&self) -> bool {
        self.desired.network.domain_names.is_some()
            || self.desired.encrypted_environment.is_some()
            || self.desired.enable_dynamic_memory.is_some()
    }

    pub fn create_body(&self, code: &PackagedCode) -> CreateFunctionBody {
        CreateFunctionBody {
            func_name: self.desired.name.clone(),
            package: self.desired.package.clone(),
            runtime: self.runtime(),
            handler: self.handler(),
            memory_size: self.memory_size(),
            timeout: self.timeout(),
            code_type: code.code_type().to_owned(),
            function_type: FUNCTION_TYPE_V2.to_owned(),
            description: self.description(),
            user_data: self.user_data(),
            xrole: self.xrole(),
            app_xrole: self.app_xrole(),
            code_url: code.code_url(),
            code_filename: code.filename(),
            func_code: code.func_code(),
            func_vpc: self.func_vpc(),
            network_controller: self.network_controller(),
            log_config: self.log_config(),
            initializer_handler: self.initializer_handler(),
            initializer_timeout: self.initializer_timeout(),
            pre_stop_handler: self.pre_stop_handler(),
            pre_stop_timeout: self.pre_stop_timeout(),
        }
    }

    /// Code update body; carries the remote dependency list when it has one.
    pub fn update_code_body(&self, code: &PackagedCode) -> UpdateFunctionCodeBody {
        let depend_version_list = self
            .remote_field(|r| Some(r.depend_version_list.clone()))
            .filter(|list| !list.is_empty());
        UpdateFunctionCodeBody {
            code_type: code.code_type().to_owned(),
            code_url: code.code_url(),
            code_filename: code.filename(),
            func_code: code.func_code(),
            depend_version_list,
        }
    }

    pub fn update_config_body(&self) -> UpdateFunctionConfigBody {
        UpdateFunctionConfigBody {
            func_name: self.desired.name.clone(),
            runtime: self.runtime(),
            handler: self.handler(),
            memory_size: self.memory_size(),
            timeout: self.timeout(),
            description: self.description(),
            user_data: self.user_data(),
            encrypted_user_data: self.encrypted_user_data(),
            xrole: self.xrole(),
            app_xrole: self.app_xrole(),
            func_vpc: self.func_vpc(),
            strategy_config: self.strategy_config(),
            network_controller: self.network_controller(),
            domain_names: self.domain_names(),
            log_config: self.log_config(),
            initializer_handler: self.initializer_handler(),
            initializer_timeout: self.initializer_timeout(),
            pre_stop_handler: self.pre_stop_handler(),
            pre_stop_timeout: self.pre_stop_timeout(),
            enable_dynamic_memory: self.enable_dynamic_memory(),
        }
    }
}
