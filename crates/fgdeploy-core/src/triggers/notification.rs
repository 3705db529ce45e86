use super::{required_str, same_field, TriggerContext, TriggerStrategy};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

/// Subscription to a notification topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationTrigger;

impl TriggerStrategy for NotificationTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Notification
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let topic = required_str(data, "topic_urn", ctx, self.kind())?;
        let mut out = data.clone();
        out.insert("topic_urn".to_owned(), Value::String(topic));
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "topic_urn")
    }
}
