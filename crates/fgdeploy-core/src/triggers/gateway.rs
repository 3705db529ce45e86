use super::{
    generated_name, required_str, same_field, str_field, TriggerContext, TriggerStrategy,
};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

pub const DEFAULT_ENV_NAME: &str = "DEFAULT_ENVIRONMENT_RELEASE_ID";
pub const DEFAULT_ENV_ID: &str = "RELEASE";
pub const DEFAULT_PROTOCOL: &str = "HTTPS";
pub const DEFAULT_MATCH_MODE: &str = "SWA";
pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_AUTH: &str = "IAM";
pub const BACKEND_TYPE: &str = "FUNCTION";

/// Shared-gateway API route to the function.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayTrigger;

/// API route on a dedicated gateway instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedicatedGatewayTrigger;

fn canonical_route(
    ctx: &TriggerContext<'_>,
    data: &EventData,
    kind: TriggerKind,
) -> Result<EventData, CoreError> {
    let group_id = required_str(data, "group_id", ctx, kind)?;
    let name = str_field(data, "name")
        .map(|n| n.replace('-', "_"))
        .unwrap_or_else(|| generated_name(kind.code(), ctx.urn, kind, ctx.ordinal));
    let protocol = str_field(data, "protocol")
        .map(|p| p.to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_PROTOCOL.to_owned());
    let or_default = |key: &str, default: &str| {
        Value::String(str_field(data, key).unwrap_or_else(|| default.to_owned()))
    };

    let mut out = data.clone();
    out.insert("name".to_owned(), Value::String(name));
    out.insert("group_id".to_owned(), Value::String(group_id));
    out.insert("env_name".to_owned(), or_default("env_name", DEFAULT_ENV_NAME));
    out.insert("env_id".to_owned(), or_default("env_id", DEFAULT_ENV_ID));
    out.insert("protocol".to_owned(), Value::String(protocol));
    out.insert("match_mode".to_owned(), or_default("match_mode", DEFAULT_MATCH_MODE));
    out.insert("req_method".to_owned(), or_default("req_method", DEFAULT_METHOD));
    out.insert("auth".to_owned(), or_default("auth", DEFAULT_AUTH));
    out.insert("backend_type".to_owned(), Value::String(BACKEND_TYPE.to_owned()));
    out.insert(
        "path".to_owned(),
        or_default("path", &format!("/{}", ctx.function_name)),
    );
    Ok(out)
}

impl TriggerStrategy for GatewayTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Gateway
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        canonical_route(ctx, data, self.kind())
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        ["name", "group_id", "env_id"]
            .iter()
            .all(|key| same_field(desired, remote, key))
    }
}

impl TriggerStrategy for DedicatedGatewayTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::DedicatedGateway
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let instance_id = required_str(data, "instance_id", ctx, self.kind())?;
        let mut out = canonical_route(ctx, data, self.kind())?;
        out.insert("instance_id".to_owned(), Value::String(instance_id));
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        ["name", "instance_id", "path", "group_id", "env_id"]
            .iter()
            .all(|key| same_field(desired, remote, key))
    }
}
