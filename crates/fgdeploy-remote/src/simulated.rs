//! In-memory control plane.
//!
//! [`SimulatedPlatform`] answers every catalogued operation the way the real
//! platform does (status codes, error bodies, the unchanged-code conflict)
//! and records each call in a journal. Tests use it directly; the reference
//! server exposes it over HTTP.

use crate::classify::CODE_UNCHANGED;
use crate::model::{
    ApiGroup, ApiGroupList, CreateApiGroupBody, CreateFunctionBody, CreateTriggerBody,
    InvocationResult, Project, ProjectList, RemoteFunctionState, RemoteTriggerState, TagList,
    UpdateFunctionCodeBody, UpdateFunctionConfigBody, UpdateTriggerBody,
};
use crate::operation::{ApiRequest, ApiResponse, Operation, Target};
use crate::packager::inline_size;
use crate::{ControlPlane, RemoteError};
use chrono::Utc;
use fgdeploy_schema::{FunctionUrn, TriggerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const ERR_BAD_REQUEST: &str = "FSS.0400";
pub const ERR_FUNCTION_NOT_FOUND: &str = "FSS.1051";
pub const ERR_TRIGGER_NOT_FOUND: &str = "FSS.1052";
pub const ERR_FUNCTION_EXISTS: &str = "FSS.1061";
pub const ERR_GROUP_EXISTS: &str = "APIG.3011";

/// Everything the platform stores, keyed by version-less function URN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    #[serde(default)]
    pub functions: BTreeMap<String, RemoteFunctionState>,
    #[serde(default)]
    pub triggers: BTreeMap<String, Vec<RemoteTriggerState>>,
    #[serde(default)]
    pub tags: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub api_groups: Vec<ApiGroup>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub next_id: u64,
}

/// One journaled call. `status` is `0` for injected transport failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub path: String,
    pub body: Option<Value>,
    pub status: u16,
}

#[derive(Debug, Clone)]
enum Fault {
    Respond(ApiResponse),
    Transport,
}

#[derive(Debug, Default)]
struct PlatformState {
    data: PlatformSnapshot,
    journal: Vec<RecordedCall>,
    faults: Vec<(Operation, Fault)>,
}

#[derive(Debug)]
pub struct SimulatedPlatform {
    region: String,
    state: Mutex<PlatformState>,
}

impl SimulatedPlatform {
    pub fn new(region: &str) -> Self {
        Self::from_snapshot(region, PlatformSnapshot::default())
    }

    pub fn from_snapshot(region: &str, snapshot: PlatformSnapshot) -> Self {
        Self {
            region: region.to_owned(),
            state: Mutex::new(PlatformState {
                data: snapshot,
                ..PlatformState::default()
            }),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> PlatformSnapshot {
        self.lock().data.clone()
    }

    /// Seed a function. Its `func_urn` must be a valid URN.
    pub fn insert_function(&self, function: RemoteFunctionState) -> Result<(), RemoteError> {
        let key = function_key(&function.func_urn)
            .ok_or_else(|| RemoteError::Config(format!("invalid URN '{}'", function.func_urn)))?;
        self.lock().data.functions.insert(key, function);
        Ok(())
    }

    /// Seed a trigger on an existing or future function.
    pub fn insert_trigger(&self, urn: &str, trigger: RemoteTriggerState) -> Result<(), RemoteError> {
        let key = function_key(urn)
            .ok_or_else(|| RemoteError::Config(format!("invalid URN '{urn}'")))?;
        self.lock().data.triggers.entry(key).or_default().push(trigger);
        Ok(())
    }

    pub fn function(&self, urn: &str) -> Option<RemoteFunctionState> {
        let key = function_key(urn)?;
        self.lock().data.functions.get(&key).cloned()
    }

    pub fn triggers(&self, urn: &str) -> Vec<RemoteTriggerState> {
        function_key(urn)
            .and_then(|key| self.lock().data.triggers.get(&key).cloned())
            .unwrap_or_default()
    }

    /// Seed an API gateway group.
    pub fn insert_api_group(&self, group: ApiGroup) {
        self.lock().data.api_groups.push(group);
    }

    pub fn api_groups(&self) -> Vec<ApiGroup> {
        self.lock().data.api_groups.clone()
    }

    /// Register the identity-service project answering for `name`.
    pub fn insert_project(&self, name: &str, id: &str) {
        self.lock().data.projects.push(Project {
            id: id.to_owned(),
            name: name.to_owned(),
        });
    }

    pub fn tags(&self, resource_id: &str) -> BTreeMap<String, String> {
        self.lock()
            .data
            .tags
            .get(resource_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Answer the next call of `operation` with the given error instead of
    /// executing it.
    pub fn fail_next(&self, operation: Operation, status: u16, code: &str, message: &str) {
        self.lock().faults.push((
            operation,
            Fault::Respond(ApiResponse::error(status, code, message)),
        ));
    }

    /// Make the next call of `operation` fail before reaching the platform.
    pub fn fail_transport_next(&self, operation: Operation) {
        self.lock().faults.push((operation, Fault::Transport));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().journal.clone()
    }

    pub fn calls_of(&self, operation: Operation) -> Vec<RecordedCall> {
        self.lock()
            .journal
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().journal.clear();
    }
}

impl ControlPlane for SimulatedPlatform {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        let mut state = self.lock();
        let fault = state
            .faults
            .iter()
            .position(|(op, _)| *op == request.operation())
            .map(|pos| state.faults.remove(pos).1);

        let result = match fault {
            Some(Fault::Transport) => Err(RemoteError::Http(format!(
                "injected transport failure for {}",
                request.operation()
            ))),
            Some(Fault::Respond(response)) => Ok(response),
            None => Ok(state.data.dispatch(&self.region, request)),
        };

        state.journal.push(RecordedCall {
            operation: request.operation(),
            path: request.path(),
            body: request.body().cloned(),
            status: result.as_ref().map_or(0, |r| r.status),
        });
        result
    }
}

fn function_key(urn: &str) -> Option<String> {
    FunctionUrn::parse(urn).ok().map(|u| u.unversioned())
}

fn bad_request(message: &str) -> ApiResponse {
    ApiResponse::error(400, ERR_BAD_REQUEST, message)
}

fn function_not_found(urn: &str) -> ApiResponse {
    ApiResponse::error(
        404,
        ERR_FUNCTION_NOT_FOUND,
        &format!("function {urn} does not exist"),
    )
}

fn to_json(value: &impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl PlatformSnapshot {
    fn dispatch(&mut self, region: &str, request: &ApiRequest) -> ApiResponse {
        match (request.operation(), request.target()) {
            (Operation::ShowFunctionConfig, Target::Function(urn)) => self.show_function(urn),
            (Operation::CreateFunction, _) => match request.body_as::<CreateFunctionBody>() {
                Ok(body) => self.create_function(region, request.project_id(), body),
                Err(e) => bad_request(&e.to_string()),
            },
            (Operation::UpdateFunctionCode, Target::Function(urn)) => {
                match request.body_as::<UpdateFunctionCodeBody>() {
                    Ok(body) => self.update_code(urn, body),
                    Err(e) => bad_request(&e.to_string()),
                }
            }
            (Operation::UpdateFunctionConfig, Target::Function(urn)) => {
                match request.body_as::<UpdateFunctionConfigBody>() {
                    Ok(body) => self.update_config(urn, body),
                    Err(e) => bad_request(&e.to_string()),
                }
            }
            (Operation::DeleteFunction, Target::Function(urn)) => self.delete_function(urn),
            (Operation::ListFunctionTriggers, Target::Triggers(urn)) => self.list_triggers(urn),
            (Operation::CreateFunctionTrigger, Target::Triggers(urn)) => {
                match request.body_as::<CreateTriggerBody>() {
                    Ok(body) => self.create_trigger(urn, body),
                    Err(e) => bad_request(&e.to_string()),
                }
            }
            (Operation::UpdateTrigger, Target::Trigger { urn, kind, id }) => {
                match request.body_as::<UpdateTriggerBody>() {
                    Ok(body) => self.update_trigger(urn, kind.code(), id, body),
                    Err(e) => bad_request(&e.to_string()),
                }
            }
            (Operation::DeleteFunctionTrigger, Target::Trigger { urn, kind, id }) => {
                self.delete_trigger(urn, kind.code(), id)
            }
            (Operation::ListTags, Target::Resource(id)) => {
                let tags = self.tags.get(id).cloned().unwrap_or_default();
                ApiResponse::ok(200, to_json(&TagList::from_map(&tags)))
            }
            (Operation::CreateTags, Target::Resource(id)) => match request.body_as::<TagList>() {
                Ok(body) => {
                    self.tags.entry(id.clone()).or_default().extend(body.into_map());
                    ApiResponse::ok(204, Value::Null)
                }
                Err(e) => bad_request(&e.to_string()),
            },
            (Operation::DeleteTags, Target::Resource(id)) => match request.body_as::<TagList>() {
                Ok(body) => {
                    if let Some(existing) = self.tags.get_mut(id) {
                        for tag in body.tags {
                            existing.remove(&tag.key);
                        }
                    }
                    ApiResponse::ok(204, Value::Null)
                }
                Err(e) => bad_request(&e.to_string()),
            },
            (Operation::InvokeFunction, Target::Function(urn)) => {
                self.invoke(urn, request.body().cloned().unwrap_or(Value::Null))
            }
            (Operation::ListApiGroups, Target::ApiGroups) => ApiResponse::ok(
                200,
                to_json(&ApiGroupList {
                    groups: self.api_groups.clone(),
                }),
            ),
            (Operation::CreateApiGroup, Target::ApiGroups) => {
                match request.body_as::<CreateApiGroupBody>() {
                    Ok(body) => self.create_api_group(region, body),
                    Err(e) => bad_request(&e.to_string()),
                }
            }
            (Operation::ListProjects, Target::Projects(name)) => ApiResponse::ok(
                200,
                to_json(&ProjectList {
                    projects: self
                        .projects
                        .iter()
                        .filter(|p| p.name == *name)
                        .cloned()
                        .collect(),
                }),
            ),
            _ => bad_request("operation does not fit target"),
        }
    }

    /// Functions echo their event back as the result.
    fn invoke(&mut self, urn: &str, event: Value) -> ApiResponse {
        if function_key(urn).filter(|k| self.functions.contains_key(k)).is_none() {
            return function_not_found(urn);
        }
        self.next_id += 1;
        let result = InvocationResult {
            request_id: hex_id(&[urn.as_bytes(), b"invoke".as_slice()], self.next_id),
            result: event.to_string(),
            log: format!("invoked {urn}"),
            status: 200,
        };
        ApiResponse::ok(200, to_json(&result))
    }

    fn create_api_group(&mut self, region: &str, body: CreateApiGroupBody) -> ApiResponse {
        if body.name.trim().is_empty() {
            return bad_request("group name must not be empty");
        }
        if self.api_groups.iter().any(|g| g.name == body.name) {
            return ApiResponse::error(
                409,
                ERR_GROUP_EXISTS,
                &format!("API group {} already exists", body.name),
            );
        }
        self.next_id += 1;
        let id = hex_id(&[body.name.as_bytes(), b"group".as_slice()], self.next_id).replace('-', "");
        let group = ApiGroup {
            sl_domain: Some(format!("{}.apic.{region}.huaweicloudapis.com", &id[..12])),
            id,
            name: body.name,
            remark: body.remark,
        };
        let response = ApiResponse::ok(201, to_json(&group));
        self.api_groups.push(group);
        response
    }

    fn show_function(&self, urn: &str) -> ApiResponse {
        match function_key(urn).and_then(|key| self.functions.get(&key)) {
            Some(function) => ApiResponse::ok(200, to_json(function)),
            None => function_not_found(urn),
        }
    }

    fn create_function(
        &mut self,
        region: &str,
        project_id: &str,
        body: CreateFunctionBody,
    ) -> ApiResponse {
        if body.func_name.is_empty() {
            return bad_request("func_name must not be empty");
        }
        let urn = FunctionUrn::new(region, project_id, &body.package, &body.func_name);
        let key = urn.unversioned();
        if self.functions.contains_key(&key) {
            return ApiResponse::error(
                409,
                ERR_FUNCTION_EXISTS,
                &format!("function {} already exists", body.func_name),
            );
        }

        let (digest, code_size) = code_fingerprint(
            body.func_code.as_ref().map(|c| c.file.as_str()),
            body.code_url.as_deref(),
        );
        let function = RemoteFunctionState {
            func_name: body.func_name,
            func_urn: urn.to_string(),
            project_name: Some(region.to_owned()),
            package: Some(body.package),
            runtime: Some(body.runtime),
            handler: Some(body.handler),
            memory_size: Some(body.memory_size),
            timeout: Some(body.timeout),
            description: body.description,
            code_type: Some(body.code_type),
            code_url: body.code_url,
            code_filename: body.code_filename,
            code_size: Some(code_size),
            digest: Some(digest),
            user_data: body.user_data,
            xrole: body.xrole,
            app_xrole: body.app_xrole,
            func_vpc: body.func_vpc,
            network_controller: body.network_controller,
            log_config: body.log_config,
            initializer_handler: body.initializer_handler,
            initializer_timeout: body.initializer_timeout,
            pre_stop_handler: body.pre_stop_handler,
            pre_stop_timeout: body.pre_stop_timeout,
            last_modified: Some(Utc::now()),
            ..RemoteFunctionState::default()
        };
        let response = ApiResponse::ok(200, to_json(&function));
        self.functions.insert(key, function);
        response
    }

    fn update_code(&mut self, urn: &str, body: UpdateFunctionCodeBody) -> ApiResponse {
        let Some(function) = function_key(urn).and_then(|key| self.functions.get_mut(&key)) else {
            return function_not_found(urn);
        };
        let (digest, code_size) = code_fingerprint(
            body.func_code.as_ref().map(|c| c.file.as_str()),
            body.code_url.as_deref(),
        );
        if function.digest.as_deref() == Some(digest.as_str()) {
            return ApiResponse::error(409, CODE_UNCHANGED, "function code has not changed");
        }
        function.digest = Some(digest);
        function.code_size = Some(code_size);
        function.code_type = Some(body.code_type);
        function.code_url = body.code_url;
        if body.code_filename.is_some() {
            function.code_filename = body.code_filename;
        }
        if let Some(list) = body.depend_version_list {
            function.depend_version_list = list;
        }
        function.last_modified = Some(Utc::now());
        ApiResponse::ok(200, to_json(function))
    }

    fn update_config(&mut self, urn: &str, body: UpdateFunctionConfigBody) -> ApiResponse {
        let Some(function) = function_key(urn).and_then(|key| self.functions.get_mut(&key)) else {
            return function_not_found(urn);
        };
        function.runtime = Some(body.runtime);
        function.handler = Some(body.handler);
        function.memory_size = Some(body.memory_size);
        function.timeout = Some(body.timeout);

        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut function.description, body.description);
        set(&mut function.user_data, body.user_data);
        set(&mut function.encrypted_user_data, body.encrypted_user_data);
        set(&mut function.xrole, body.xrole);
        set(&mut function.app_xrole, body.app_xrole);
        set(&mut function.func_vpc, body.func_vpc);
        set(&mut function.strategy_config, body.strategy_config);
        set(&mut function.network_controller, body.network_controller);
        set(&mut function.domain_names, body.domain_names);
        set(&mut function.log_config, body.log_config);
        set(&mut function.initializer_handler, body.initializer_handler);
        set(&mut function.initializer_timeout, body.initializer_timeout);
        set(&mut function.pre_stop_handler, body.pre_stop_handler);
        set(&mut function.pre_stop_timeout, body.pre_stop_timeout);
        set(&mut function.enable_dynamic_memory, body.enable_dynamic_memory);
        function.last_modified = Some(Utc::now());
        ApiResponse::ok(200, to_json(function))
    }

    fn delete_function(&mut self, urn: &str) -> ApiResponse {
        let Some(key) = function_key(urn) else {
            return function_not_found(urn);
        };
        if self.functions.remove(&key).is_none() {
            return function_not_found(urn);
        }
        self.triggers.remove(&key);
        self.tags.remove(&key);
        ApiResponse::ok(204, Value::Null)
    }

    fn list_triggers(&self, urn: &str) -> ApiResponse {
        let Some(key) = function_key(urn).filter(|k| self.functions.contains_key(k)) else {
            return function_not_found(urn);
        };
        let triggers = self.triggers.get(&key).cloned().unwrap_or_default();
        ApiResponse::ok(200, to_json(&triggers))
    }

    fn create_trigger(&mut self, urn: &str, body: CreateTriggerBody) -> ApiResponse {
        let Some(key) = function_key(urn).filter(|k| self.functions.contains_key(k)) else {
            return function_not_found(urn);
        };
        self.next_id += 1;
        let now = Utc::now();
        let trigger = RemoteTriggerState {
            trigger_id: trigger_id(&key, body.trigger_type_code.code(), self.next_id),
            trigger_type_code: body.trigger_type_code.code().to_owned(),
            trigger_status: body.trigger_status,
            event_type_code: body.event_type_code,
            event_data: body.event_data,
            created_time: Some(now),
            last_updated_time: Some(now),
        };
        let response = ApiResponse::ok(201, to_json(&trigger));
        self.triggers.entry(key).or_default().push(trigger);
        response
    }

    fn find_trigger(&self, urn: &str, kind: &str, id: &TriggerId) -> Option<(String, usize)> {
        let key = function_key(urn)?;
        let index = self
            .triggers
            .get(&key)?
            .iter()
            .position(|t| t.trigger_id == *id && t.trigger_type_code.eq_ignore_ascii_case(kind))?;
        Some((key, index))
    }

    fn update_trigger(
        &mut self,
        urn: &str,
        kind: &str,
        id: &TriggerId,
        body: UpdateTriggerBody,
    ) -> ApiResponse {
        let Some((key, index)) = self.find_trigger(urn, kind, id) else {
            return trigger_not_found(id);
        };
        let Some(trigger) = self.triggers.get_mut(&key).and_then(|list| list.get_mut(index)) else {
            return trigger_not_found(id);
        };
        trigger.trigger_status = body.trigger_status;
        if let Some(event_data) = body.event_data {
            trigger.event_data = event_data;
        }
        trigger.last_updated_time = Some(Utc::now());
        ApiResponse::ok(200, to_json(trigger))
    }

    fn delete_trigger(&mut self, urn: &str, kind: &str, id: &TriggerId) -> ApiResponse {
        let Some((key, index)) = self.find_trigger(urn, kind, id) else {
            return trigger_not_found(id);
        };
        if let Some(list) = self.triggers.get_mut(&key) {
            list.remove(index);
        }
        ApiResponse::ok(204, Value::Null)
    }
}

fn trigger_not_found(id: &TriggerId) -> ApiResponse {
    ApiResponse::error(
        404,
        ERR_TRIGGER_NOT_FOUND,
        &format!("trigger {id} does not exist"),
    )
}

/// Content digest and decoded size of uploaded code.
fn code_fingerprint(inline: Option<&str>, code_url: Option<&str>) -> (String, u64) {
    match inline {
        Some(file) => (
            blake3::hash(file.as_bytes()).to_hex().to_string(),
            inline_size(file).unwrap_or(0),
        ),
        None => (
            blake3::hash(code_url.unwrap_or_default().as_bytes())
                .to_hex()
                .to_string(),
            0,
        ),
    }
}

/// UUID-shaped trigger id derived from the function, kind and a counter.
fn trigger_id(function_key: &str, kind: &str, counter: u64) -> TriggerId {
    TriggerId::new(hex_id(&[function_key.as_bytes(), kind.as_bytes()], counter))
}

/// UUID-shaped id hashed from `parts` and a counter.
fn hex_id(parts: &[&[u8]], counter: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.update(&counter.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    let hex = hex.as_str();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
