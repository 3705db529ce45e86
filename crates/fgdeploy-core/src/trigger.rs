use crate::api_group;
use crate::summary::TriggerSummary;
use crate::triggers::{TriggerContext, TriggerRegistry, TriggerStrategy};
use crate::{CoreError, Phase};
use fgdeploy_remote::model::CreateTriggerBody;
use fgdeploy_remote::{ApiRequest, ControlPlane, RemoteTriggerState};
use fgdeploy_schema::{
    normalize_keys, DesiredTriggerConfig, EventData, FunctionUrn, TriggerId, TriggerKind,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Engine switches for the two ambiguous cases of trigger matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Take the first full match by list order instead of failing when
    /// several remote triggers match.
    pub first_match_wins: bool,
    /// Treat a failed trigger listing as an empty one.
    pub fail_open_listing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerAction {
    Created,
    Updated,
    Unchanged,
    Removed,
    /// Kind not modeled; nothing was sent.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    pub kind: String,
    pub action: TriggerAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<TriggerSummary>,
}

/// Remote triggers of one kind that correspond to a declaration.
pub(crate) enum Counterpart<'r> {
    /// Exactly the declared trigger, possibly with another status.
    Full(&'r RemoteTriggerState),
    /// Same resource, different settings; updatable in place.
    Identity(&'r RemoteTriggerState),
    None,
}

/// Canonicalized declaration ready for matching.
pub(crate) struct PreparedTrigger<'s> {
    pub strategy: &'s dyn TriggerStrategy,
    pub canonical: EventData,
}

impl<'s> PreparedTrigger<'s> {
    pub(crate) fn kind(&self) -> TriggerKind {
        self.strategy.kind()
    }
}

/// Canonicalize already-normalized event data for one declaration.
pub(crate) fn prepare<'s>(
    strategy: &'s dyn TriggerStrategy,
    function_name: &str,
    urn: &FunctionUrn,
    ordinal: usize,
    data: &EventData,
) -> Result<PreparedTrigger<'s>, CoreError> {
    let ctx = TriggerContext {
        function_name,
        urn,
        ordinal,
    };
    let canonical = strategy.canonicalize(&ctx, data)?;
    Ok(PreparedTrigger {
        strategy,
        canonical,
    })
}

/// The declaration at `index`, or a configuration error naming the function.
pub(crate) fn declared_at<'d>(
    declared: &'d [DesiredTriggerConfig],
    index: usize,
    function_name: &str,
) -> Result<&'d DesiredTriggerConfig, CoreError> {
    declared.get(index).ok_or_else(|| {
        CoreError::configuration(
            function_name,
            format!("no trigger declared at position {index}"),
        )
    })
}

/// Position of `declared[index]` among the declarations of `kind`.
pub(crate) fn ordinal_of(
    declared: &[DesiredTriggerConfig],
    index: usize,
    kind: TriggerKind,
) -> usize {
    declared[..index.min(declared.len())]
        .iter()
        .filter(|t| TriggerKind::from_code(&t.kind) == Some(kind))
        .count()
}

/// Another declaration of the same kind on the same function.
pub(crate) struct Sibling<'s> {
    prepared: PreparedTrigger<'s>,
    /// Declared before the trigger being reconciled.
    earlier: bool,
}

/// Canonical forms of the other same-kind declarations. Only kinds with
/// identity matching need them; declarations that fail to canonicalize are
/// left out and reported when their own turn comes.
pub(crate) fn siblings<'s>(
    strategy: &'s dyn TriggerStrategy,
    function_name: &str,
    urn: &FunctionUrn,
    declared: &[DesiredTriggerConfig],
    index: usize,
) -> Vec<Sibling<'s>> {
    if !strategy.supports_status_edit() {
        return Vec::new();
    }
    let kind = strategy.kind();
    declared
        .iter()
        .enumerate()
        .filter(|(i, t)| *i != index && TriggerKind::from_code(&t.kind) == Some(kind))
        .filter_map(|(i, t)| {
            let ordinal = ordinal_of(declared, i, kind);
            match prepare(strategy, function_name, urn, ordinal, &normalize_keys(&t.event_data)) {
                Ok(prepared) => Some(Sibling {
                    prepared,
                    earlier: i < index,
                }),
                Err(err) => {
                    debug!("ignoring {kind} sibling #{i} on {function_name}: {err}");
                    None
                }
            }
        })
        .collect()
}

/// List remote triggers of the function, filtered to `kind`.
pub(crate) fn list_triggers(
    plane: &dyn ControlPlane,
    project_id: &str,
    urn: &FunctionUrn,
    kind: TriggerKind,
    fail_open: bool,
) -> Result<Vec<RemoteTriggerState>, CoreError> {
    let resource = urn.to_string();
    let failed = |err: CoreError| {
        if fail_open {
            warn!("trigger listing for {resource} failed, assuming none: {err}");
            Ok(Vec::new())
        } else {
            Err(err)
        }
    };

    let response = match plane.call(&ApiRequest::list_triggers(project_id, &resource)) {
        Ok(response) => response,
        Err(source) => {
            return failed(CoreError::Transport {
                phase: Phase::TriggerList,
                resource: resource.clone(),
                source,
            })
        }
    };
    if response.status == 404 {
        debug!("no triggers listed for {resource}: function not found");
        return Ok(Vec::new());
    }
    if !response.is_success() {
        return failed(remote_call_error(Phase::TriggerList, &resource, &response));
    }
    let all: Vec<RemoteTriggerState> = if response.body.is_null() {
        Vec::new()
    } else {
        response.json().map_err(|e| CoreError::InvalidResponse {
            resource: resource.clone(),
            message: e.to_string(),
        })?
    };
    Ok(all.into_iter().filter(|t| t.kind() == Some(kind)).collect())
}

/// Pick the counterpart of a prepared declaration among same-kind remotes.
///
/// A remote that a sibling fully matches, or that an earlier sibling with no
/// full match would take over by identity, is never an identity candidate.
pub(crate) fn find_counterpart<'r>(
    prepared: &PreparedTrigger<'_>,
    remotes: &'r [RemoteTriggerState],
    siblings: &[Sibling<'_>],
    options: &ReconcileOptions,
    function_name: &str,
) -> Result<Counterpart<'r>, CoreError> {
    let full: Vec<&RemoteTriggerState> = remotes
        .iter()
        .filter(|r| prepared.strategy.matches(&prepared.canonical, &r.event_data))
        .collect();
    if let Some(first) = pick(&full, prepared.kind(), options, function_name)? {
        return Ok(Counterpart::Full(first));
    }
    if !prepared.strategy.supports_status_edit() {
        return Ok(Counterpart::None);
    }
    let claimed = claimed_ids(siblings, remotes);
    let identity: Vec<&RemoteTriggerState> = remotes
        .iter()
        .filter(|r| !claimed.contains(&&r.trigger_id))
        .filter(|r| {
            prepared
                .strategy
                .identity_matches(&prepared.canonical, &r.event_data)
        })
        .collect();
    Ok(pick(&identity, prepared.kind(), options, function_name)?
        .map_or(Counterpart::None, Counterpart::Identity))
}

fn claimed_ids<'r>(
    siblings: &[Sibling<'_>],
    remotes: &'r [RemoteTriggerState],
) -> Vec<&'r TriggerId> {
    let mut claimed = Vec::new();
    for sibling in siblings {
        let strategy = sibling.prepared.strategy;
        let canonical = &sibling.prepared.canonical;
        let full: Vec<&TriggerId> = remotes
            .iter()
            .filter(|r| strategy.matches(canonical, &r.event_data))
            .map(|r| &r.trigger_id)
            .collect();
        if !full.is_empty() {
            claimed.extend(full);
        } else if sibling.earlier {
            claimed.extend(
                remotes
                    .iter()
                    .filter(|r| strategy.identity_matches(canonical, &r.event_data))
                    .map(|r| &r.trigger_id),
            );
        }
    }
    claimed
}

fn pick<'r>(
    candidates: &[&'r RemoteTriggerState],
    kind: TriggerKind,
    options: &ReconcileOptions,
    function_name: &str,
) -> Result<Option<&'r RemoteTriggerState>, CoreError> {
    match candidates {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        [first, ..] if options.first_match_wins => {
            warn!(
                "{} {kind} triggers on {function_name} match, using {}",
                candidates.len(),
                first.trigger_id
            );
            Ok(Some(*first))
        }
        _ => Err(CoreError::AmbiguousTrigger {
            resource: function_name.to_owned(),
            kind,
            ids: candidates.iter().map(|t| t.trigger_id.clone()).collect(),
        }),
    }
}

pub(crate) fn remote_call_error(
    phase: Phase,
    resource: &str,
    response: &fgdeploy_remote::ApiResponse,
) -> CoreError {
    CoreError::RemoteCall {
        phase,
        resource: resource.to_owned(),
        status: response.status,
        code: response.error_code.clone(),
        message: response.error_msg.clone(),
    }
}

/// Brings one declared trigger in line with the platform.
pub struct TriggerReconciler<'a> {
    plane: &'a dyn ControlPlane,
    registry: &'a TriggerRegistry,
    project_id: &'a str,
    options: ReconcileOptions,
}

impl<'a> TriggerReconciler<'a> {
    pub fn new(
        plane: &'a dyn ControlPlane,
        registry: &'a TriggerRegistry,
        project_id: &'a str,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            plane,
            registry,
            project_id,
            options,
        }
    }

    /// Reconcile `declared[index]`. The whole declared list is needed so that
    /// same-kind siblings do not take over each other's remote triggers.
    pub fn deploy(
        &self,
        function_name: &str,
        urn: &FunctionUrn,
        declared: &[DesiredTriggerConfig],
        index: usize,
    ) -> Result<TriggerOutcome, CoreError> {
        let desired = declared_at(declared, index, function_name)?;
        let Some(strategy) = self.registry.resolve(&desired.kind) else {
            warn!(
                "trigger kind '{}' on {function_name} is not supported, skipping",
                desired.kind
            );
            return Ok(TriggerOutcome {
                kind: desired.kind.clone(),
                action: TriggerAction::Skipped,
                summary: None,
            });
        };
        let kind = strategy.kind();
        let mut data = normalize_keys(&desired.event_data);
        if api_group::needs_group(kind, &data) {
            let group = api_group::ensure_group(self.plane, urn, function_name)?;
            api_group::attach(&mut data, &group);
        }
        let prepared = prepare(
            strategy,
            function_name,
            urn,
            ordinal_of(declared, index, kind),
            &data,
        )?;
        let siblings = siblings(strategy, function_name, urn, declared, index);
        let remotes = list_triggers(
            self.plane,
            self.project_id,
            urn,
            kind,
            self.options.fail_open_listing,
        )?;
        debug!("{} remote {kind} trigger(s) on {function_name}", remotes.len());

        let outcome = match find_counterpart(
            &prepared,
            &remotes,
            &siblings,
            &self.options,
            function_name,
        )? {
            Counterpart::Full(remote) => {
                if remote.trigger_status != desired.status && prepared.strategy.supports_status_edit()
                {
                    info!(
                        "updating {kind} trigger {} on {function_name}: status {} -> {}",
                        remote.trigger_id, remote.trigger_status, desired.status
                    );
                    let body = prepared.strategy.update_body(desired.status, None);
                    let updated = self.update(urn, kind, remote, &body)?;
                    (TriggerAction::Updated, updated)
                } else {
                    info!("{kind} trigger {} on {function_name} unchanged", remote.trigger_id);
                    (TriggerAction::Unchanged, remote.clone())
                }
            }
            Counterpart::Identity(remote) => {
                info!(
                    "updating {kind} trigger {} on {function_name} in place",
                    remote.trigger_id
                );
                let body = prepared
                    .strategy
                    .update_body(desired.status, Some(&prepared.canonical));
                let updated = self.update(urn, kind, remote, &body)?;
                (TriggerAction::Updated, updated)
            }
            Counterpart::None => {
                info!("creating {kind} trigger on {function_name}");
                let body = CreateTriggerBody {
                    trigger_type_code: kind,
                    trigger_status: desired.status,
                    event_type_code: desired.event_type_code.clone(),
                    event_data: prepared.canonical,
                };
                (TriggerAction::Created, self.create(urn, &body)?)
            }
        };
        Ok(TriggerOutcome {
            kind: kind.code().to_owned(),
            action: outcome.0,
            summary: Some(TriggerSummary::from_remote(&outcome.1)),
        })
    }

    fn create(
        &self,
        urn: &FunctionUrn,
        body: &CreateTriggerBody,
    ) -> Result<RemoteTriggerState, CoreError> {
        let resource = urn.to_string();
        let request = ApiRequest::create_trigger(self.project_id, &resource, body).map_err(
            |source| CoreError::Transport {
                phase: Phase::TriggerCreate,
                resource: resource.clone(),
                source,
            },
        )?;
        let response = self
            .plane
            .call(&request)
            .map_err(|source| CoreError::Transport {
                phase: Phase::TriggerCreate,
                resource: resource.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(remote_call_error(Phase::TriggerCreate, &resource, &response));
        }
        Ok(response.json().unwrap_or_else(|_| RemoteTriggerState {
            trigger_id: Default::default(),
            trigger_type_code: body.trigger_type_code.code().to_owned(),
            trigger_status: body.trigger_status,
            event_type_code: body.event_type_code.clone(),
            event_data: body.event_data.clone(),
            created_time: None,
            last_updated_time: None,
        }))
    }

    fn update(
        &self,
        urn: &FunctionUrn,
        kind: TriggerKind,
        remote: &RemoteTriggerState,
        body: &fgdeploy_remote::model::UpdateTriggerBody,
    ) -> Result<RemoteTriggerState, CoreError> {
        let resource = urn.to_string();
        let transport = |source| CoreError::Transport {
            phase: Phase::TriggerUpdate,
            resource: resource.clone(),
            source,
        };
        let request =
            ApiRequest::update_trigger(self.project_id, &resource, kind, &remote.trigger_id, body)
                .map_err(transport)?;
        let response = self.plane.call(&request).map_err(transport)?;
        if !response.is_success() {
            return Err(remote_call_error(Phase::TriggerUpdate, &resource, &response));
        }
        Ok(response.json().unwrap_or_else(|_| RemoteTriggerState {
            trigger_status: body.trigger_status,
            event_data: body
                .event_data
                .clone()
                .unwrap_or_else(|| remote.event_data.clone()),
            ..remote.clone()
        }))
    }
}
