//! Resource reconciliation engine for fgdeploy.
//!
//! This crate ties the declared configuration (`fgdeploy-schema`) to a control
//! plane (`fgdeploy-remote`): the `ConfigResolver` merges declared, remote and
//! default values; the `FunctionReconciler` chooses create or update per
//! function; the `TriggerReconciler` canonicalizes each declared trigger
//! through a per-kind strategy and creates, updates or leaves it; the
//! `Remover` mirrors both for deletion; and the `Deployer` walks a manifest
//! sequentially under an explicit failure policy.

pub(crate) mod api_group;
pub mod concurrency;
pub mod engine;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod function;
pub mod project;
pub mod remover;
pub mod resolver;
pub mod summary;
pub mod tags;
pub mod trigger;
pub mod triggers;

pub use concurrency::{install_signal_handler, shutdown_requested};
pub use engine::{
    Deployer, FailurePolicy, FunctionInfo, FunctionReport, InfoReport, RunReport, Scope, Selection,
};
pub use function::{FunctionAction, FunctionOutcome, FunctionReconciler};
pub use project::lookup_project_id;
pub use remover::Remover;
pub use resolver::{resolve, ConfigResolver};
pub use summary::{FunctionSummary, TriggerSummary};
pub use tags::{plan_tags, TagPlan};
pub use trigger::{ReconcileOptions, TriggerAction, TriggerOutcome, TriggerReconciler};
pub use triggers::{TriggerContext, TriggerRegistry, TriggerStrategy};

use fgdeploy_schema::{TriggerId, TriggerKind};
use std::fmt;
use thiserror::Error;

/// Step of reconciliation an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probe,
    Create,
    UpdateCode,
    UpdateConfig,
    Tags,
    TriggerList,
    TriggerCreate,
    TriggerUpdate,
    Remove,
    TriggerRemove,
    ApiGroup,
    Invoke,
    ProjectLookup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Probe => "probe",
            Phase::Create => "create",
            Phase::UpdateCode => "code update",
            Phase::UpdateConfig => "config update",
            Phase::Tags => "tags",
            Phase::TriggerList => "trigger listing",
            Phase::TriggerCreate => "trigger create",
            Phase::TriggerUpdate => "trigger update",
            Phase::Remove => "remove",
            Phase::TriggerRemove => "trigger remove",
            Phase::ApiGroup => "API group lookup",
            Phase::Invoke => "invoke",
            Phase::ProjectLookup => "project lookup",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] fgdeploy_schema::ManifestError),
    #[error("configuration error for '{resource}': {message}")]
    Configuration { resource: String, message: String },
    #[error("no function named '{0}' is declared")]
    UnknownFunction(String),
    #[error("{what} does not exist: {resource}")]
    NotFound { what: &'static str, resource: String },
    #[error("{phase} failed for '{resource}': HTTP {status} {}", describe_remote(.code.as_deref(), .message.as_deref()))]
    RemoteCall {
        phase: Phase,
        resource: String,
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },
    #[error("{phase} failed for '{resource}': {source}")]
    Transport {
        phase: Phase,
        resource: String,
        #[source]
        source: fgdeploy_remote::RemoteError,
    },
    #[error("ambiguous {kind} trigger on '{resource}': remote triggers {} all match", join_ids(.ids))]
    AmbiguousTrigger {
        resource: String,
        kind: TriggerKind,
        ids: Vec<TriggerId>,
    },
    #[error("packaging failed for '{resource}': {source}")]
    Packaging {
        resource: String,
        #[source]
        source: fgdeploy_remote::RemoteError,
    },
    #[error("unexpected response for '{resource}': {message}")]
    InvalidResponse { resource: String, message: String },
}

impl CoreError {
    pub(crate) fn configuration(resource: &str, message: impl Into<String>) -> Self {
        CoreError::Configuration {
            resource: resource.to_owned(),
            message: message.into(),
        }
    }

    /// Phase the error is attributed to, when it came from a remote call.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            CoreError::RemoteCall { phase, .. } | CoreError::Transport { phase, .. } => {
                Some(*phase)
            }
            _ => None,
        }
    }

    /// Declared configuration is at fault; nothing remote was attempted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::Manifest(_) | CoreError::Configuration { .. } | CoreError::UnknownFunction(_)
        )
    }

    /// The control plane refused a call or could not be reached.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            CoreError::RemoteCall { .. }
                | CoreError::Transport { .. }
                | CoreError::NotFound { .. }
                | CoreError::InvalidResponse { .. }
        )
    }
}

fn describe_remote(code: Option<&str>, message: Option<&str>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_owned(),
        (None, Some(message)) => message.to_owned(),
        (None, None) => "no error details".to_owned(),
    }
}

fn join_ids(ids: &[TriggerId]) -> String {
    ids.iter().map(TriggerId::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_call_error_preserves_platform_details() {
        let err = CoreError::RemoteCall {
            phase: Phase::Create,
            resource: "hello".to_owned(),
            status: 400,
            code: Some("FSS.0400".to_owned()),
            message: Some("bad runtime".to_owned()),
        };
        assert_eq!(
            err.to_string(),
            "create failed for 'hello': HTTP 400 FSS.0400: bad runtime"
        );
        assert_eq!(err.phase(), Some(Phase::Create));
        assert!(err.is_remote());
        assert!(!err.is_configuration());
    }

    #[test]
    fn ambiguous_trigger_lists_ids() {
        let err = CoreError::AmbiguousTrigger {
            resource: "hello".to_owned(),
            kind: TriggerKind::Timer,
            ids: vec![TriggerId::new("a"), TriggerId::new("b")],
        };
        assert!(err.to_string().contains("a, b"));
        assert_eq!(err.phase(), None);
    }

    #[test]
    fn configuration_errors_are_classified() {
        let err = CoreError::configuration("hello", "xrole required");
        assert!(err.is_configuration());
        assert!(!err.is_remote());
    }
}
