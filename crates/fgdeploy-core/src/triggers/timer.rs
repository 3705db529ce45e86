use super::{generated_name, same_field, str_field, TriggerContext, TriggerStrategy};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

pub const DEFAULT_SCHEDULE: &str = "3m";
pub const DEFAULT_SCHEDULE_TYPE: &str = "Rate";

/// Scheduled invocation, either a rate (`3m`) or a cron expression.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerTrigger;

impl TriggerStrategy for TimerTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Timer
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let name = str_field(data, "name")
            .unwrap_or_else(|| {
                generated_name(self.kind().code(), ctx.urn, self.kind(), ctx.ordinal)
            });
        let schedule = str_field(data, "schedule").unwrap_or_else(|| DEFAULT_SCHEDULE.to_owned());
        let schedule_type =
            str_field(data, "schedule_type").unwrap_or_else(|| DEFAULT_SCHEDULE_TYPE.to_owned());

        let mut out = data.clone();
        out.insert("name".to_owned(), Value::String(name));
        out.insert("schedule".to_owned(), Value::String(schedule));
        out.insert("schedule_type".to_owned(), Value::String(schedule_type));
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        ["name", "schedule", "schedule_type"]
            .iter()
            .all(|key| same_field(desired, remote, key))
    }

    fn supports_status_edit(&self) -> bool {
        true
    }

    fn identity_matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "name") && same_field(desired, remote, "schedule_type")
    }
}
