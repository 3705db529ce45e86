use super::{required_str, same_field, TriggerContext, TriggerStrategy};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

/// Log-service subscription on a log group and topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTailTrigger;

impl TriggerStrategy for LogTailTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::LogTail
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let group = required_str(data, "log_group_id", ctx, self.kind())?;
        let topic = required_str(data, "log_topic_id", ctx, self.kind())?;
        let mut out = data.clone();
        out.insert("log_group_id".to_owned(), Value::String(group));
        out.insert("log_topic_id".to_owned(), Value::String(topic));
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "log_group_id") && same_field(desired, remote, "log_topic_id")
    }

    fn supports_status_edit(&self) -> bool {
        true
    }

    fn identity_matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "log_group_id")
    }
}
