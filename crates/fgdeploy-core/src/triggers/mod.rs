//! Per-kind trigger strategies.
//!
//! Each supported kind implements [`TriggerStrategy`]: turn loosely-shaped
//! declared event data into the exact field set the platform expects, and
//! decide whether a remote trigger of the same kind is the declared one.
//! [`TriggerRegistry`] maps kinds to strategies and is passed explicitly to
//! the reconciler and remover.

mod audit_trail;
mod data_stream;
mod gateway;
mod log_tail;
mod message_queue;
mod notification;
mod object_storage;
mod timer;

pub use audit_trail::AuditTrailTrigger;
pub use data_stream::DataStreamTrigger;
pub use gateway::{DedicatedGatewayTrigger, GatewayTrigger};
pub use log_tail::LogTailTrigger;
pub use message_queue::MessageQueueTrigger;
pub use notification::NotificationTrigger;
pub use object_storage::ObjectStorageTrigger;
pub use timer::TimerTrigger;

use crate::CoreError;
use fgdeploy_remote::model::UpdateTriggerBody;
use fgdeploy_schema::{EventData, FunctionUrn, TriggerKind, TriggerStatus};
use serde_json::Value;
use std::collections::BTreeMap;

/// Alphabet for generated trigger names; omits characters that are easy to
/// misread (`g`, `l`, `o`, `q`, `u`, `v`, `0`, `1`, `9`).
const NAME_ALPHABET: &[u8] = b"abcdefhijkmnprstwxyz2345678";
const NAME_SUFFIX_LEN: usize = 6;

/// The function a trigger is being canonicalized for.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub function_name: &'a str,
    pub urn: &'a FunctionUrn,
    /// Position among the function's declared triggers of the same kind.
    pub ordinal: usize,
}

pub trait TriggerStrategy: Send + Sync {
    fn kind(&self) -> TriggerKind;

    /// Build the canonical event data for a declaration. `data` has already
    /// been through [`fgdeploy_schema::normalize_keys`].
    fn canonicalize(&self, ctx: &TriggerContext<'_>, data: &EventData)
        -> Result<EventData, CoreError>;

    /// Whether `remote` is the trigger described by canonical `desired`.
    fn matches(&self, desired: &EventData, remote: &EventData) -> bool;

    /// Whether the platform accepts in-place updates for this kind.
    fn supports_status_edit(&self) -> bool {
        false
    }

    /// Weaker predicate than [`matches`](Self::matches): the remote trigger
    /// is the same resource with different settings. Only consulted for
    /// kinds that support in-place updates.
    fn identity_matches(&self, _desired: &EventData, _remote: &EventData) -> bool {
        false
    }

    /// Update request for an existing trigger. `event_data` is `None` for a
    /// status-only change.
    fn update_body(&self, status: TriggerStatus, event_data: Option<&EventData>) -> UpdateTriggerBody {
        UpdateTriggerBody {
            trigger_status: status,
            event_data: event_data.cloned(),
        }
    }
}

/// Kind → strategy lookup, scoped to one invocation.
pub struct TriggerRegistry {
    strategies: BTreeMap<TriggerKind, Box<dyn TriggerStrategy>>,
}

impl TriggerRegistry {
    /// A registry with no strategies; every kind is skipped.
    pub fn new() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// A registry with a strategy for every modeled kind.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GatewayTrigger));
        registry.register(Box::new(DedicatedGatewayTrigger));
        registry.register(Box::new(ObjectStorageTrigger));
        registry.register(Box::new(AuditTrailTrigger));
        registry.register(Box::new(DataStreamTrigger));
        registry.register(Box::new(TimerTrigger));
        registry.register(Box::new(LogTailTrigger));
        registry.register(Box::new(MessageQueueTrigger));
        registry.register(Box::new(NotificationTrigger));
        registry
    }

    /// Add or replace the strategy for its kind.
    pub fn register(&mut self, strategy: Box<dyn TriggerStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: TriggerKind) -> Option<&dyn TriggerStrategy> {
        self.strategies.get(&kind).map(Box::as_ref)
    }

    /// Look up a declared kind tag or code.
    pub fn resolve(&self, tag: &str) -> Option<&dyn TriggerStrategy> {
        TriggerKind::from_code(tag).and_then(|kind| self.get(kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = TriggerKind> + '_ {
        self.strategies.keys().copied()
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Deterministic default name: `<prefix>_` plus six characters derived from
/// the version-less URN, the kind and the ordinal, stable across runs.
///
/// Ordinal 0 hashes only the URN and kind, so a function's first trigger of
/// a kind is named the same whether or not it has same-kind siblings.
pub fn generated_name(
    prefix: &str,
    urn: &FunctionUrn,
    kind: TriggerKind,
    ordinal: usize,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(urn.unversioned().as_bytes());
    hasher.update(b"\0");
    hasher.update(kind.code().as_bytes());
    if ordinal > 0 {
        hasher.update(b"\0");
        hasher.update(&(ordinal as u64).to_le_bytes());
    }
    let hash = hasher.finalize();
    let suffix: String = hash.as_bytes()[..NAME_SUFFIX_LEN]
        .iter()
        .map(|b| NAME_ALPHABET[usize::from(*b) % NAME_ALPHABET.len()] as char)
        .collect();
    format!("{prefix}_{suffix}")
}

/// A scalar field rendered as a string. Empty strings count as absent.
pub(crate) fn str_field(data: &EventData, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn u64_field(data: &EventData, key: &str) -> Option<u64> {
    match data.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_field(data: &EventData, key: &str) -> Option<bool> {
    match data.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list of strings, accepting a single string as a one-element list.
pub(crate) fn string_list(data: &EventData, key: &str) -> Vec<String> {
    match data.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::trim))
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_owned()],
        _ => Vec::new(),
    }
}

pub(crate) fn required_str(
    data: &EventData,
    key: &str,
    ctx: &TriggerContext<'_>,
    kind: TriggerKind,
) -> Result<String, CoreError> {
    str_field(data, key).ok_or_else(|| {
        CoreError::configuration(
            ctx.function_name,
            format!("{kind} trigger requires event_data.{key}"),
        )
    })
}

/// Both sides carry the field and agree on it.
pub(crate) fn same_field(desired: &EventData, remote: &EventData, key: &str) -> bool {
    match (str_field(desired, key), str_field(remote, key)) {
        (Some(d), Some(r)) => d == r,
        _ => false,
    }
}

/// Neither side carries the field, or both agree on it.
pub(crate) fn same_optional_field(desired: &EventData, remote: &EventData, key: &str) -> bool {
    str_field(desired, key) == str_field(remote, key)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn urn() -> FunctionUrn {
        FunctionUrn::new("cn-north-4", "p1", "default", "hello")
    }

    pub fn data(value: serde_json::Value) -> EventData {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => EventData::new(),
        }
    }

    /// Canonicalize, then check the result matches itself as a remote shape.
    pub fn assert_self_match(strategy: &dyn TriggerStrategy, declared: serde_json::Value) {
        let urn = urn();
        let ctx = TriggerContext {
            function_name: "hello",
            urn: &urn,
            ordinal: 0,
        };
        let canonical = strategy
            .canonicalize(&ctx, &fgdeploy_schema::normalize_keys(&data(declared)))
            .unwrap();
        assert!(strategy.matches(&canonical, &canonical.clone()));
        if strategy.supports_status_edit() {
            assert!(strategy.identity_matches(&canonical, &canonical));
        }
    }
}
