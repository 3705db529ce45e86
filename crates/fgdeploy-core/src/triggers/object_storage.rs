use super::{
    generated_name, required_str, same_field, str_field, string_list, TriggerContext,
    TriggerStrategy,
};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

/// Bucket event notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectStorageTrigger;

/// `a` covers `b` when they are equal or `a` is a `prefix:*` wildcard and
/// `b` starts with `prefix:`.
fn event_covers(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match a.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => b.starts_with(prefix),
        _ => false,
    }
}

/// At least one event on each side is the same, or wildcard-related in either
/// direction.
pub(crate) fn events_overlap(desired: &[String], remote: &[String]) -> bool {
    desired
        .iter()
        .any(|d| remote.iter().any(|r| event_covers(d, r) || event_covers(r, d)))
}

impl TriggerStrategy for ObjectStorageTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::ObjectStorage
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let bucket = required_str(data, "bucket", ctx, self.kind())?;
        let events = string_list(data, "events");
        if events.is_empty() {
            return Err(CoreError::configuration(
                ctx.function_name,
                "OBS trigger requires at least one event in event_data.events",
            ));
        }
        let name = str_field(data, "name")
            .unwrap_or_else(|| {
                generated_name(self.kind().code(), ctx.urn, self.kind(), ctx.ordinal)
            });

        let mut out = data.clone();
        out.insert("bucket".to_owned(), Value::String(bucket));
        out.insert(
            "events".to_owned(),
            Value::Array(events.into_iter().map(Value::String).collect()),
        );
        out.insert("name".to_owned(), Value::String(name));
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "bucket")
            && events_overlap(&string_list(desired, "events"), &string_list(remote, "events"))
    }
}
