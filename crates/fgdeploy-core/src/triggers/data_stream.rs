use super::{
    bool_field, required_str, same_field, str_field, u64_field, TriggerContext, TriggerStrategy,
};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;

pub const DEFAULT_SHARD_ITERATOR: &str = "TRIM_HORIZON";
pub const DEFAULT_POLLING_INTERVAL: u64 = 30;
pub const DEFAULT_MAX_FETCH_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Data-ingestion stream consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataStreamTrigger;

impl TriggerStrategy for DataStreamTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::DataStream
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let stream_name = required_str(data, "stream_name", ctx, self.kind())?;
        let mut out = data.clone();
        out.insert("stream_name".to_owned(), Value::String(stream_name));
        out.insert(
            "sharditerator_type".to_owned(),
            Value::String(
                str_field(data, "sharditerator_type")
                    .unwrap_or_else(|| DEFAULT_SHARD_ITERATOR.to_owned()),
            ),
        );
        out.insert(
            "polling_interval".to_owned(),
            Value::from(u64_field(data, "polling_interval").unwrap_or(DEFAULT_POLLING_INTERVAL)),
        );
        out.insert(
            "is_serial".to_owned(),
            Value::Bool(bool_field(data, "is_serial").unwrap_or(true)),
        );
        out.insert(
            "max_fetch_bytes".to_owned(),
            Value::from(u64_field(data, "max_fetch_bytes").unwrap_or(DEFAULT_MAX_FETCH_BYTES)),
        );
        out.insert(
            "batch_size".to_owned(),
            Value::from(u64_field(data, "batch_size").unwrap_or(DEFAULT_BATCH_SIZE)),
        );
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "stream_name")
            && same_field(desired, remote, "sharditerator_type")
    }

    fn supports_status_edit(&self) -> bool {
        true
    }

    fn identity_matches(&self, desired: &EventData, remote: &EventData) -> bool {
        same_field(desired, remote, "stream_name")
    }
}
