use serde::{Deserialize, Serialize};
use std::fmt;

/// Event-trigger kinds modeled by fgdeploy.
///
/// Declarations name a kind either by its platform code (`TIMER`) or by its
/// descriptive tag (`timer-trigger`); anything else is left unmodeled and
/// [`TriggerKind::from_code`] returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    #[serde(rename = "APIG")]
    Gateway,
    #[serde(rename = "DEDICATEDGATEWAY")]
    DedicatedGateway,
    #[serde(rename = "OBS")]
    ObjectStorage,
    #[serde(rename = "CTS")]
    AuditTrail,
    #[serde(rename = "DIS")]
    DataStream,
    #[serde(rename = "TIMER")]
    Timer,
    #[serde(rename = "LTS")]
    LogTail,
    #[serde(rename = "KAFKA")]
    MessageQueue,
    #[serde(rename = "SMN")]
    Notification,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 9] = [
        TriggerKind::Gateway,
        TriggerKind::DedicatedGateway,
        TriggerKind::ObjectStorage,
        TriggerKind::AuditTrail,
        TriggerKind::DataStream,
        TriggerKind::Timer,
        TriggerKind::LogTail,
        TriggerKind::MessageQueue,
        TriggerKind::Notification,
    ];

    /// Platform trigger type code, as sent on the wire.
    pub fn code(self) -> &'static str {
        match self {
            TriggerKind::Gateway => "APIG",
            TriggerKind::DedicatedGateway => "DEDICATEDGATEWAY",
            TriggerKind::ObjectStorage => "OBS",
            TriggerKind::AuditTrail => "CTS",
            TriggerKind::DataStream => "DIS",
            TriggerKind::Timer => "TIMER",
            TriggerKind::LogTail => "LTS",
            TriggerKind::MessageQueue => "KAFKA",
            TriggerKind::Notification => "SMN",
        }
    }

    /// Descriptive tag accepted in declarations.
    pub fn tag(self) -> &'static str {
        match self {
            TriggerKind::Gateway => "gateway-trigger",
            TriggerKind::DedicatedGateway => "dedicated-gateway-trigger",
            TriggerKind::ObjectStorage => "object-storage-trigger",
            TriggerKind::AuditTrail => "audit-trail-trigger",
            TriggerKind::DataStream => "data-stream-trigger",
            TriggerKind::Timer => "timer-trigger",
            TriggerKind::LogTail => "log-tail-trigger",
            TriggerKind::MessageQueue => "message-queue-trigger",
            TriggerKind::Notification => "notification-trigger",
        }
    }

    /// Resolve a declared kind tag or platform code, case-insensitively.
    pub fn from_code(input: &str) -> Option<Self> {
        let needle = input.trim();
        Self::ALL.into_iter().find(|kind| {
            kind.code().eq_ignore_ascii_case(needle) || kind.tag().eq_ignore_ascii_case(needle)
        })
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerStatus {
    #[default]
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "disabled")]
    Disabled,
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStatus::Active => f.write_str("ACTIVE"),
            TriggerStatus::Disabled => f.write_str("DISABLED"),
        }
    }
}
