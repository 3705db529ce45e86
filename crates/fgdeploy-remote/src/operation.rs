use crate::RemoteError;
use fgdeploy_schema::{TriggerId, TriggerKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Shared API gateway group collection.
pub const API_GROUPS_PATH: &str = "/v1.0/apigw/api-groups";
/// Identity-service project listing.
pub const PROJECTS_PATH: &str = "/v3/projects";

/// HTTP verb of a control-plane route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every control-plane call the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ShowFunctionConfig,
    CreateFunction,
    UpdateFunctionCode,
    UpdateFunctionConfig,
    DeleteFunction,
    ListFunctionTriggers,
    CreateFunctionTrigger,
    UpdateTrigger,
    DeleteFunctionTrigger,
    ListTags,
    CreateTags,
    DeleteTags,
    InvokeFunction,
    ListApiGroups,
    CreateApiGroup,
    ListProjects,
}

impl Operation {
    pub fn method(self) -> Method {
        match self {
            Operation::ShowFunctionConfig
            | Operation::ListFunctionTriggers
            | Operation::ListTags
            | Operation::ListApiGroups
            | Operation::ListProjects => Method::Get,
            Operation::CreateFunction
            | Operation::CreateFunctionTrigger
            | Operation::CreateTags
            | Operation::InvokeFunction
            | Operation::CreateApiGroup => Method::Post,
            Operation::UpdateFunctionCode
            | Operation::UpdateFunctionConfig
            | Operation::UpdateTrigger => Method::Put,
            Operation::DeleteFunction
            | Operation::DeleteFunctionTrigger
            | Operation::DeleteTags => Method::Delete,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::ShowFunctionConfig => "ShowFunctionConfig",
            Operation::CreateFunction => "CreateFunction",
            Operation::UpdateFunctionCode => "UpdateFunctionCode",
            Operation::UpdateFunctionConfig => "UpdateFunctionConfig",
            Operation::DeleteFunction => "DeleteFunction",
            Operation::ListFunctionTriggers => "ListFunctionTriggers",
            Operation::CreateFunctionTrigger => "CreateFunctionTrigger",
            Operation::UpdateTrigger => "UpdateTrigger",
            Operation::DeleteFunctionTrigger => "DeleteFunctionTrigger",
            Operation::ListTags => "ListTags",
            Operation::CreateTags => "CreateTags",
            Operation::DeleteTags => "DeleteTags",
            Operation::InvokeFunction => "InvokeFunction",
            Operation::ListApiGroups => "ListApiGroups",
            Operation::CreateApiGroup => "CreateApiGroup",
            Operation::ListProjects => "ListProjects",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The resource a request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Functions,
    Function(String),
    Triggers(String),
    Trigger {
        urn: String,
        kind: TriggerKind,
        id: TriggerId,
    },
    Resource(String),
    /// API gateway groups of the account; not project-scoped.
    ApiGroups,
    /// Identity-service projects with the given name.
    Projects(String),
}

/// One control-plane call: operation, path parameters, and JSON body.
///
/// Requests are only built through the typed constructors below, so the
/// target always fits the operation's route.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    operation: Operation,
    project_id: String,
    target: Target,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(operation: Operation, project_id: &str, target: Target) -> Self {
        Self {
            operation,
            project_id: project_id.to_owned(),
            target,
            body: None,
        }
    }

    fn with_body(mut self, body: &impl Serialize) -> Result<Self, RemoteError> {
        let value =
            serde_json::to_value(body).map_err(|e| RemoteError::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn show_function_config(project_id: &str, urn: &str) -> Self {
        Self::new(
            Operation::ShowFunctionConfig,
            project_id,
            Target::Function(urn.to_owned()),
        )
    }

    pub fn create_function(project_id: &str, body: &impl Serialize) -> Result<Self, RemoteError> {
        Self::new(Operation::CreateFunction, project_id, Target::Functions).with_body(body)
    }

    pub fn update_function_code(
        project_id: &str,
        urn: &str,
        body: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::UpdateFunctionCode,
            project_id,
            Target::Function(urn.to_owned()),
        )
        .with_body(body)
    }

    pub fn update_function_config(
        project_id: &str,
        urn: &str,
        body: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::UpdateFunctionConfig,
            project_id,
            Target::Function(urn.to_owned()),
        )
        .with_body(body)
    }

    pub fn delete_function(project_id: &str, urn: &str) -> Self {
        Self::new(
            Operation::DeleteFunction,
            project_id,
            Target::Function(urn.to_owned()),
        )
    }

    pub fn list_triggers(project_id: &str, urn: &str) -> Self {
        Self::new(
            Operation::ListFunctionTriggers,
            project_id,
            Target::Triggers(urn.to_owned()),
        )
    }

    pub fn create_trigger(
        project_id: &str,
        urn: &str,
        body: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::CreateFunctionTrigger,
            project_id,
            Target::Triggers(urn.to_owned()),
        )
        .with_body(body)
    }

    pub fn update_trigger(
        project_id: &str,
        urn: &str,
        kind: TriggerKind,
        id: &TriggerId,
        body: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::UpdateTrigger,
            project_id,
            Target::Trigger {
                urn: urn.to_owned(),
                kind,
                id: id.clone(),
            },
        )
        .with_body(body)
    }

    pub fn delete_trigger(project_id: &str, urn: &str, kind: TriggerKind, id: &TriggerId) -> Self {
        Self::new(
            Operation::DeleteFunctionTrigger,
            project_id,
            Target::Trigger {
                urn: urn.to_owned(),
                kind,
                id: id.clone(),
            },
        )
    }

    pub fn list_tags(project_id: &str, resource_id: &str) -> Self {
        Self::new(
            Operation::ListTags,
            project_id,
            Target::Resource(resource_id.to_owned()),
        )
    }

    pub fn create_tags(
        project_id: &str,
        resource_id: &str,
        body: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::CreateTags,
            project_id,
            Target::Resource(resource_id.to_owned()),
        )
        .with_body(body)
    }

    pub fn delete_tags(
        project_id: &str,
        resource_id: &str,
        body: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::DeleteTags,
            project_id,
            Target::Resource(resource_id.to_owned()),
        )
        .with_body(body)
    }

    /// Synchronous invocation with `event` as the payload.
    pub fn invoke_function(
        project_id: &str,
        urn: &str,
        event: &impl Serialize,
    ) -> Result<Self, RemoteError> {
        Self::new(
            Operation::InvokeFunction,
            project_id,
            Target::Function(urn.to_owned()),
        )
        .with_body(event)
    }

    pub fn list_api_groups() -> Self {
        Self::new(Operation::ListApiGroups, "", Target::ApiGroups)
    }

    pub fn create_api_group(body: &impl Serialize) -> Result<Self, RemoteError> {
        Self::new(Operation::CreateApiGroup, "", Target::ApiGroups).with_body(body)
    }

    /// Projects named after a region.
    pub fn list_projects(region: &str) -> Self {
        Self::new(
            Operation::ListProjects,
            "",
            Target::Projects(region.to_owned()),
        )
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn method(&self) -> Method {
        self.operation.method()
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Deserialize the request body into a typed wire model.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, RemoteError> {
        let body = self.body.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(body).map_err(|e| RemoteError::Serialization(e.to_string()))
    }

    /// Route path relative to the endpoint, e.g.
    /// `/v2/<project>/fgs/functions/<urn>/config`.
    pub fn path(&self) -> String {
        match &self.target {
            Target::ApiGroups => return API_GROUPS_PATH.to_owned(),
            Target::Projects(name) => return format!("{PROJECTS_PATH}?name={name}"),
            _ => {}
        }
        let prefix = format!("/v2/{}/fgs", self.project_id);
        let suffix = match (&self.target, self.operation) {
            (Target::Function(urn), Operation::ShowFunctionConfig | Operation::UpdateFunctionConfig) => {
                format!("functions/{urn}/config")
            }
            (Target::Function(urn), Operation::UpdateFunctionCode) => format!("functions/{urn}/code"),
            (Target::Function(urn), Operation::InvokeFunction) => {
                format!("functions/{urn}/invocations")
            }
            (Target::Function(urn), _) => format!("functions/{urn}"),
            (Target::Functions, _) => "functions".to_owned(),
            (Target::Triggers(urn), _) => format!("triggers/{urn}"),
            (Target::Trigger { urn, kind, id }, _) => format!("triggers/{urn}/{}/{id}", kind.code()),
            (Target::Resource(id), Operation::CreateTags) => format!("resources/{id}/tags/create"),
            (Target::Resource(id), Operation::DeleteTags) => format!("resources/{id}/tags/delete"),
            (Target::Resource(id), _) => format!("resources/{id}/tags"),
            (Target::ApiGroups | Target::Projects(_), _) => String::new(),
        };
        format!("{prefix}/{suffix}")
    }

    /// Inverse of [`ApiRequest::path`]: recognize a method and path as one of
    /// the catalogued operations. Returns `None` for anything else.
    pub fn from_route(method: Method, path: &str, body: Option<serde_json::Value>) -> Option<Self> {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        if path == API_GROUPS_PATH {
            let operation = match method {
                Method::Get => Operation::ListApiGroups,
                Method::Post => Operation::CreateApiGroup,
                _ => return None,
            };
            return Some(Self {
                operation,
                project_id: String::new(),
                target: Target::ApiGroups,
                body,
            });
        }
        if path == PROJECTS_PATH && method == Method::Get {
            let name = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("name="))
                .filter(|name| !name.is_empty())?;
            return Some(Self::list_projects(name));
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let [version, project_id, service, rest @ ..] = segments.as_slice() else {
            return None;
        };
        if *version != "v2" || *service != "fgs" || project_id.is_empty() {
            return None;
        }

        let (operation, target) = match (method, rest) {
            (Method::Post, ["functions"]) => (Operation::CreateFunction, Target::Functions),
            (Method::Get, ["functions", urn, "config"]) => {
                (Operation::ShowFunctionConfig, Target::Function((*urn).to_owned()))
            }
            (Method::Put, ["functions", urn, "config"]) => {
                (Operation::UpdateFunctionConfig, Target::Function((*urn).to_owned()))
            }
            (Method::Put, ["functions", urn, "code"]) => {
                (Operation::UpdateFunctionCode, Target::Function((*urn).to_owned()))
            }
            (Method::Post, ["functions", urn, "invocations"]) => {
                (Operation::InvokeFunction, Target::Function((*urn).to_owned()))
            }
            (Method::Delete, ["functions", urn]) => {
                (Operation::DeleteFunction, Target::Function((*urn).to_owned()))
            }
            (Method::Get, ["triggers", urn]) => {
                (Operation::ListFunctionTriggers, Target::Triggers((*urn).to_owned()))
            }
            (Method::Post, ["triggers", urn]) => {
                (Operation::CreateFunctionTrigger, Target::Triggers((*urn).to_owned()))
            }
            (Method::Put | Method::Delete, ["triggers", urn, kind, id]) => {
                let operation = if method == Method::Put {
                    Operation::UpdateTrigger
                } else {
                    Operation::DeleteFunctionTrigger
                };
                let target = Target::Trigger {
                    urn: (*urn).to_owned(),
                    kind: TriggerKind::from_code(kind)?,
                    id: TriggerId::new(*id),
                };
                (operation, target)
            }
            (Method::Get, ["resources", id, "tags"]) => {
                (Operation::ListTags, Target::Resource((*id).to_owned()))
            }
            (Method::Post, ["resources", id, "tags", "create"]) => {
                (Operation::CreateTags, Target::Resource((*id).to_owned()))
            }
            (Method::Delete, ["resources", id, "tags", "delete"]) => {
                (Operation::DeleteTags, Target::Resource((*id).to_owned()))
            }
            _ => return None,
        };

        if target_has_empty_segment(&target) {
            return None;
        }

        Some(Self {
            operation,
            project_id: (*project_id).to_owned(),
            target,
            body,
        })
    }
}

fn target_has_empty_segment(target: &Target) -> bool {
    match target {
        Target::Functions | Target::ApiGroups => false,
        Target::Function(s) | Target::Triggers(s) | Target::Resource(s) | Target::Projects(s) => {
            s.is_empty()
        }
        Target::Trigger { urn, id, .. } => urn.is_empty() || id.is_empty(),
    }
}

/// Outcome of a control-plane call that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
}

impl ApiResponse {
    pub fn ok(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body,
            error_code: None,
            error_msg: None,
        }
    }

    pub fn error(status: u16, code: &str, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error_code": code, "error_msg": message }),
            error_code: Some(code.to_owned()),
            error_msg: Some(message.to_owned()),
        }
    }

    /// Build a response from a raw status and JSON body, lifting
    /// `error_code` / `error_msg` out of non-2xx bodies.
    pub fn from_parts(status: u16, body: serde_json::Value) -> Self {
        if (200..300).contains(&status) {
            return Self::ok(status, body);
        }
        let field = |name: &str| {
            body.get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        Self {
            status,
            error_code: field("error_code"),
            error_msg: field("error_msg"),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RemoteError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| RemoteError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URN: &str = "urn:fss:cn-north-4:p1:function:default:hello:latest";

    #[test]
    fn paths_follow_route_table() {
        assert_eq!(
            ApiRequest::show_function_config("p1", URN).path(),
            format!("/v2/p1/fgs/functions/{URN}/config")
        );
        assert_eq!(
            ApiRequest::create_function("p1", &json!({})).unwrap().path(),
            "/v2/p1/fgs/functions"
        );
        assert_eq!(
            ApiRequest::update_function_code("p1", URN, &json!({}))
                .unwrap()
                .path(),
            format!("/v2/p1/fgs/functions/{URN}/code")
        );
        assert_eq!(
            ApiRequest::delete_trigger("p1", URN, TriggerKind::Timer, &TriggerId::new("t-1")).path(),
            format!("/v2/p1/fgs/triggers/{URN}/TIMER/t-1")
        );
        assert_eq!(
            ApiRequest::delete_tags("p1", "res", &json!({})).unwrap().path(),
            "/v2/p1/fgs/resources/res/tags/delete"
        );
    }

    #[test]
    fn route_parsing_inverts_path() {
        let requests = vec![
            ApiRequest::show_function_config("p1", URN),
            ApiRequest::create_function("p1", &json!({"func_name": "hello"})).unwrap(),
            ApiRequest::update_function_code("p1", URN, &json!({})).unwrap(),
            ApiRequest::update_function_config("p1", URN, &json!({})).unwrap(),
            ApiRequest::delete_function("p1", URN),
            ApiRequest::list_triggers("p1", URN),
            ApiRequest::create_trigger("p1", URN, &json!({})).unwrap(),
            ApiRequest::update_trigger("p1", URN, TriggerKind::LogTail, &TriggerId::new("x"), &json!({}))
                .unwrap(),
            ApiRequest::delete_trigger("p1", URN, TriggerKind::Gateway, &TriggerId::new("y")),
            ApiRequest::list_tags("p1", URN),
            ApiRequest::create_tags("p1", URN, &json!({"tags": []})).unwrap(),
            ApiRequest::delete_tags("p1", URN, &json!({"tags": []})).unwrap(),
            ApiRequest::invoke_function("p1", URN, &json!({"k": "v"})).unwrap(),
            ApiRequest::list_api_groups(),
            ApiRequest::create_api_group(&json!({"name": "API_Group_abc"})).unwrap(),
            ApiRequest::list_projects("cn-north-4"),
        ];
        for request in requests {
            let parsed =
                ApiRequest::from_route(request.method(), &request.path(), request.body().cloned())
                    .unwrap_or_else(|| panic!("unrecognized route {}", request.path()));
            assert_eq!(parsed, request);
        }
    }

    #[test]
    fn gateway_and_identity_routes_sit_outside_the_function_prefix() {
        assert_eq!(ApiRequest::list_api_groups().path(), "/v1.0/apigw/api-groups");
        assert_eq!(
            ApiRequest::list_projects("cn-north-4").path(),
            "/v3/projects?name=cn-north-4"
        );
        assert_eq!(
            ApiRequest::invoke_function("p1", URN, &json!({})).unwrap().path(),
            format!("/v2/p1/fgs/functions/{URN}/invocations")
        );
        assert!(ApiRequest::from_route(Method::Get, "/v3/projects", None).is_none());
        assert!(ApiRequest::from_route(Method::Delete, API_GROUPS_PATH, None).is_none());
    }

    #[test]
    fn unknown_routes_are_rejected() {
        assert!(ApiRequest::from_route(Method::Get, "/v2/p1/fgs/unknown", None).is_none());
        assert!(ApiRequest::from_route(Method::Post, "/v2/p1/fgs/functions/x/config", None).is_none());
        assert!(ApiRequest::from_route(Method::Put, "/v2/p1/fgs/triggers/u/RABBIT/1", None).is_none());
        assert!(ApiRequest::from_route(Method::Get, "/v1/p1/fgs/functions", None).is_none());
        assert!(ApiRequest::from_route(Method::Get, "/", None).is_none());
    }

    #[test]
    fn error_fields_are_lifted_from_failed_bodies() {
        let response = ApiResponse::from_parts(
            409,
            json!({"error_code": "FSS.0409", "error_msg": "code not changed"}),
        );
        assert!(!response.is_success());
        assert_eq!(response.error_code.as_deref(), Some("FSS.0409"));
        assert_eq!(response.error_msg.as_deref(), Some("code not changed"));

        let ok = ApiResponse::from_parts(200, json!({"error_code": "ignored"}));
        assert!(ok.is_success());
        assert_eq!(ok.error_code, None);
    }
}
