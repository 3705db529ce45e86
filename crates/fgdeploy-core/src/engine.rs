use crate::concurrency::shutdown_requested;
use crate::function::{probe, FunctionOutcome, FunctionReconciler};
use crate::remover::Remover;
use crate::summary::FunctionSummary;
use crate::trigger::{remote_call_error, ReconcileOptions, TriggerOutcome, TriggerReconciler};
use crate::triggers::TriggerRegistry;
use crate::{CoreError, Phase};
use fgdeploy_remote::{ApiRequest, CodePackager, ControlPlane, InvocationResult};
use fgdeploy_schema::{DesiredFunctionConfig, DesiredTriggerConfig, NormalizedManifest, TriggerKind};
use serde::Serialize;
use tracing::{error, info, warn};

/// What to do with the remaining functions once one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next function.
    #[default]
    Continue,
    /// Stop; remaining functions are reported as skipped.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Functions and their triggers.
    #[default]
    All,
    /// Functions only; declared triggers are left alone.
    FunctionOnly,
    /// Triggers only; the function itself is not reconciled.
    TriggersOnly,
}

/// Which declared resources a run touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub scope: Scope,
    /// Restrict to one declared function.
    pub function: Option<String>,
    /// Restrict trigger work to one kind (tag or code, any case).
    pub trigger_kind: Option<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Scope from command-line style flags: a trigger filter means
    /// triggers only, a function filter alone means that function only.
    pub fn from_filters(function: Option<String>, trigger_kind: Option<String>) -> Self {
        let scope = match (&function, &trigger_kind) {
            (_, Some(_)) => Scope::TriggersOnly,
            (Some(_), None) => Scope::FunctionOnly,
            (None, None) => Scope::All,
        };
        Self {
            scope,
            function,
            trigger_kind,
        }
    }

    fn includes_function(&self) -> bool {
        self.scope != Scope::TriggersOnly
    }

    fn includes_triggers(&self) -> bool {
        self.scope != Scope::FunctionOnly
    }

    fn wants_trigger(&self, trigger: &DesiredTriggerConfig) -> bool {
        let Some(filter) = self.trigger_kind.as_deref() else {
            return true;
        };
        if trigger.kind.eq_ignore_ascii_case(filter.trim()) {
            return true;
        }
        match (TriggerKind::from_code(filter), TriggerKind::from_code(&trigger.kind)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Everything one function went through in a run.
#[derive(Debug, Serialize)]
pub struct FunctionReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionOutcome>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub removed: bool,
    pub triggers: Vec<TriggerOutcome>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub error: Option<CoreError>,
}

impl FunctionReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            function: None,
            removed: false,
            triggers: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<CoreError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub functions: Vec<FunctionReport>,
    /// Functions never attempted, after an abort or an interrupt.
    pub skipped: Vec<String>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        !self.interrupted && self.functions.iter().all(FunctionReport::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FunctionReport> {
        self.functions.iter().filter(|f| !f.succeeded())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub urn: String,
    /// `None` when the function is not deployed.
    pub deployed: Option<FunctionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub region: String,
    pub functions: Vec<FunctionInfo>,
}

type InterruptCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// Sequential orchestrator over a normalized manifest.
///
/// Functions are processed one at a time in declared order, and each
/// function's triggers likewise. A failure ends the current function's
/// remaining steps; the [`FailurePolicy`] decides whether later functions
/// still run. An interrupt is honoured between functions, never mid-call.
pub struct Deployer {
    plane: Box<dyn ControlPlane>,
    packager: Box<dyn CodePackager>,
    registry: TriggerRegistry,
    options: ReconcileOptions,
    policy: FailurePolicy,
    interrupted: InterruptCheck,
}

impl Deployer {
    pub fn new(plane: Box<dyn ControlPlane>, packager: Box<dyn CodePackager>) -> Self {
        Self {
            plane,
            packager,
            registry: TriggerRegistry::with_builtin(),
            options: ReconcileOptions::default(),
            policy: FailurePolicy::default(),
            interrupted: Box::new(shutdown_requested),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: TriggerRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the interrupt check consulted before each function.
    #[must_use]
    pub fn with_interrupt(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.interrupted = Box::new(check);
        self
    }

    fn select<'m>(
        manifest: &'m NormalizedManifest,
        selection: &Selection,
    ) -> Result<Vec<&'m DesiredFunctionConfig>, CoreError> {
        match selection.function.as_deref() {
            Some(name) => manifest
                .function(name)
                .map(|f| vec![f])
                .ok_or_else(|| CoreError::UnknownFunction(name.to_owned())),
            None => Ok(manifest.functions.iter().collect()),
        }
    }

    /// Walk the selected functions, stopping early on interrupt or abort.
    fn run<'m>(
        &self,
        functions: &[&'m DesiredFunctionConfig],
        mut step: impl FnMut(&'m DesiredFunctionConfig) -> FunctionReport,
    ) -> RunReport {
        let mut report = RunReport::default();
        for (index, function) in functions.iter().enumerate() {
            if (self.interrupted)() {
                warn!("interrupted; {} function(s) not attempted", functions.len() - index);
                report.interrupted = true;
                report.skipped = functions[index..].iter().map(|f| f.name.clone()).collect();
                break;
            }
            let outcome = step(*function);
            let failed = !outcome.succeeded();
            if let Some(e) = &outcome.error {
                error!("{}: {e}", outcome.name);
            }
            report.functions.push(outcome);
            if failed && self.policy == FailurePolicy::Abort {
                report.skipped = functions[index + 1..]
                    .iter()
                    .map(|f| f.name.clone())
                    .collect();
                break;
            }
        }
        report
    }

    pub fn deploy(
        &self,
        manifest: &NormalizedManifest,
        selection: &Selection,
    ) -> Result<RunReport, CoreError> {
        let functions = Self::select(manifest, selection)?;
        let project_id = manifest.project_id.as_str();
        let reconciler = FunctionReconciler::new(self.plane.as_ref(), self.packager.as_ref(), project_id);
        let triggers =
            TriggerReconciler::new(self.plane.as_ref(), &self.registry, project_id, self.options);

        Ok(self.run(&functions, |desired| {
            let mut report = FunctionReport::new(&desired.name);
            let mut urn = desired.urn.clone();
            if selection.includes_function() {
                match reconciler.deploy(desired) {
                    Ok(outcome) => {
                        urn = outcome.urn.clone();
                        report.function = Some(outcome);
                    }
                    Err(e) => {
                        report.error = Some(e);
                        return report;
                    }
                }
            }
            if selection.includes_triggers() {
                let wanted = desired
                    .triggers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| selection.wants_trigger(t));
                for (index, _) in wanted {
                    match triggers.deploy(&desired.name, &urn, &desired.triggers, index) {
                        Ok(outcome) => report.triggers.push(outcome),
                        Err(e) => {
                            report.error = Some(e);
                            break;
                        }
                    }
                }
            }
            info!("{}: done", desired.name);
            report
        }))
    }

    /// Delete selected resources: each function's triggers first, then the
    /// function itself.
    pub fn remove(
        &self,
        manifest: &NormalizedManifest,
        selection: &Selection,
    ) -> Result<RunReport, CoreError> {
        let functions = Self::select(manifest, selection)?;
        let remover = Remover::new(
            self.plane.as_ref(),
            &self.registry,
            manifest.project_id.as_str(),
            self.options,
        );

        Ok(self.run(&functions, |desired| {
            let mut report = FunctionReport::new(&desired.name);
            if selection.scope == Scope::TriggersOnly {
                let wanted = desired
                    .triggers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| selection.wants_trigger(t));
                for (index, _) in wanted {
                    let removed =
                        remover.remove_trigger(&desired.name, &desired.urn, &desired.triggers, index);
                    match removed {
                        Ok(outcome) => report.triggers.push(outcome),
                        Err(e) => {
                            report.error = Some(e);
                            return report;
                        }
                    }
                }
                return report;
            }
            if selection.scope == Scope::All {
                for index in 0..desired.triggers.len() {
                    let removed =
                        remover.remove_trigger(&desired.name, &desired.urn, &desired.triggers, index);
                    match removed {
                        Ok(outcome) => report.triggers.push(outcome),
                        Err(CoreError::NotFound { resource, .. }) => {
                            warn!("{resource} already absent");
                        }
                        Err(e) => {
                            report.error = Some(e);
                            return report;
                        }
                    }
                }
            }
            match remover.remove_function(desired) {
                Ok(()) => report.removed = true,
                Err(e) => report.error = Some(e),
            }
            report
        }))
    }

    /// Probe each selected function and report what is deployed.
    pub fn info(
        &self,
        manifest: &NormalizedManifest,
        selection: &Selection,
    ) -> Result<InfoReport, CoreError> {
        let functions = Self::select(manifest, selection)?;
        let mut infos = Vec::with_capacity(functions.len());
        for desired in functions {
            let remote = probe(self.plane.as_ref(), manifest.project_id.as_str(), &desired.urn)?;
            infos.push(FunctionInfo {
                name: desired.name.clone(),
                urn: desired.urn.to_string(),
                deployed: remote.as_ref().and_then(FunctionSummary::from_remote),
            });
        }
        Ok(InfoReport {
            service: manifest.service.clone(),
            region: manifest.region.clone(),
            functions: infos,
        })
    }

    /// Run a declared function once, synchronously, with `event` as input.
    pub fn invoke(
        &self,
        manifest: &NormalizedManifest,
        function_name: &str,
        event: &serde_json::Value,
    ) -> Result<InvocationResult, CoreError> {
        let desired = manifest
            .function(function_name)
            .ok_or_else(|| CoreError::UnknownFunction(function_name.to_owned()))?;
        let resource = desired.urn.to_string();
        let transport = |source| CoreError::Transport {
            phase: Phase::Invoke,
            resource: resource.clone(),
            source,
        };
        let request = ApiRequest::invoke_function(manifest.project_id.as_str(), &resource, event)
            .map_err(transport)?;
        info!("invoking {resource}");
        let response = self.plane.call(&request).map_err(transport)?;
        if response.status == 404 {
            return Err(CoreError::NotFound {
                what: "function",
                resource: desired.name.clone(),
            });
        }
        if !response.is_success() {
            return Err(remote_call_error(Phase::Invoke, &resource, &response));
        }
        response.json().map_err(|e| CoreError::InvalidResponse {
            resource: resource.clone(),
            message: e.to_string(),
        })
    }
}
