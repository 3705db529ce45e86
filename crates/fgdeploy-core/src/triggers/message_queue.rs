use super::{required_str, same_field, string_list, u64_field, TriggerContext, TriggerStrategy};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Kafka topic consumer. Credentials (`kafka_user`, `kafka_password`) are
/// passed through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageQueueTrigger;

impl TriggerStrategy for MessageQueueTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::MessageQueue
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let instance_id = required_str(data, "instance_id", ctx, self.kind())?;
        let mut out = data.clone();
        out.insert("instance_id".to_owned(), Value::String(instance_id));
        out.insert(
            "batch_size".to_owned(),
            Value::from(u64_field(data, "batch_size").unwrap_or(DEFAULT_BATCH_SIZE)),
        );
        out.insert(
            "topic_ids".to_owned(),
            Value::Array(
                string_list(data, "topic_ids")
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        if !same_field(desired, remote, "instance_id") {
            return false;
        }
        let remote_topics = string_list(remote, "topic_ids");
        string_list(desired, "topic_ids")
            .iter()
            .any(|t| remote_topics.contains(t))
    }

    fn supports_status_edit(&self) -> bool {
        true
    }

    fn identity_matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "instance_id")
    }
}
