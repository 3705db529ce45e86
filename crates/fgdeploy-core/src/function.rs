use crate::resolver::ConfigResolver;
use crate::summary::FunctionSummary;
use crate::tags::plan_tags;
use crate::trigger::remote_call_error;
use crate::{CoreError, Phase};
use fgdeploy_remote::model::TagList;
use fgdeploy_remote::{
    classify, ApiRequest, ApiResponse, CodePackager, ControlPlane, Outcome, PackagedCode,
    RemoteError, RemoteFunctionState,
};
use fgdeploy_schema::{CodeSource, DesiredFunctionConfig, FunctionUrn};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionOutcome {
    pub action: FunctionAction,
    pub summary: FunctionSummary,
    /// URN used for trigger reconciliation.
    #[serde(skip)]
    pub urn: FunctionUrn,
    /// The platform reported the uploaded code as identical to what it has.
    pub code_unchanged: bool,
}

/// Probe the remote configuration. `None` when the function does not exist.
pub(crate) fn probe(
    plane: &dyn ControlPlane,
    project_id: &str,
    urn: &FunctionUrn,
) -> Result<Option<RemoteFunctionState>, CoreError> {
    let resource = urn.to_string();
    let response = plane
        .call(&ApiRequest::show_function_config(project_id, &resource))
        .map_err(|source| CoreError::Transport {
            phase: Phase::Probe,
            resource: resource.clone(),
            source,
        })?;
    if !response.is_success() {
        debug!("probe of {resource} returned {}, treating as absent", response.status);
        return Ok(None);
    }
    response
        .json()
        .map(Some)
        .map_err(|e| CoreError::InvalidResponse {
            resource,
            message: e.to_string(),
        })
}

/// Reject declarations the platform would refuse, before any remote call.
pub(crate) fn check_guards(desired: &DesiredFunctionConfig) -> Result<(), CoreError> {
    if desired.network.vpc.is_declared() && desired.xrole.is_none() {
        return Err(CoreError::configuration(
            &desired.name,
            "a VPC or subnet is declared but no xrole; the platform needs an agency to attach the network",
        ));
    }
    if let CodeSource::Obs { code_url: None } = desired.code {
        return Err(CoreError::configuration(
            &desired.name,
            "code_type is obs but no code_url is declared",
        ));
    }
    Ok(())
}

/// Creates or updates one function.
///
/// The probe decides the branch: an absent function is created (plus a
/// follow-up config update for fields the create call ignores), a present
/// one gets a code update then a config update resolved against what the
/// probe returned. Tags are applied on both branches. The first failing call
/// aborts the remaining steps.
pub struct FunctionReconciler<'a> {
    plane: &'a dyn ControlPlane,
    packager: &'a dyn CodePackager,
    project_id: &'a str,
}

impl<'a> FunctionReconciler<'a> {
    pub fn new(
        plane: &'a dyn ControlPlane,
        packager: &'a dyn CodePackager,
        project_id: &'a str,
    ) -> Self {
        Self {
            plane,
            packager,
            project_id,
        }
    }

    pub fn deploy(&self, desired: &DesiredFunctionConfig) -> Result<FunctionOutcome, CoreError> {
        check_guards(desired)?;
        let remote = probe(self.plane, self.project_id, &desired.urn)?;
        let code = self
            .packager
            .package(&desired.code)
            .map_err(|source| CoreError::Packaging {
                resource: desired.name.clone(),
                source,
            })?;
        match remote {
            None => self.create(desired, &code),
            Some(remote) => self.update(desired, &remote, &code),
        }
    }

    fn create(
        &self,
        desired: &DesiredFunctionConfig,
        code: &PackagedCode,
    ) -> Result<FunctionOutcome, CoreError> {
        info!("creating function {}", desired.name);
        let resolver = ConfigResolver::new(desired, None);
        let body = resolver.create_body(code);
        let request = ApiRequest::create_function(self.project_id, &body)
            .map_err(|source| self.transport(Phase::Create, &desired.name, source))?;
        let response = self.send(Phase::Create, &desired.name, &request)?;
        let mut created: RemoteFunctionState = response.json().unwrap_or_default();

        if resolver.needs_followup_update() {
            debug!("{}: applying fields the create call does not accept", desired.name);
            let followup = ConfigResolver::new(desired, Some(&created)).update_config_body();
            let updated = self.update_config(&desired.urn, &followup)?;
            if !updated.func_urn.is_empty() {
                created = updated;
            }
        }

        self.apply_tags(desired)?;
        let summary = self.summarize(desired, &created, code);
        Ok(FunctionOutcome {
            action: FunctionAction::Created,
            summary,
            urn: desired.urn.clone(),
            code_unchanged: false,
        })
    }

    fn update(
        &self,
        desired: &DesiredFunctionConfig,
        remote: &RemoteFunctionState,
        code: &PackagedCode,
    ) -> Result<FunctionOutcome, CoreError> {
        info!("updating function {}", desired.name);
        let resolver = ConfigResolver::new(desired, Some(remote));
        let resource = desired.urn.to_string();

        let code_body = resolver.update_code_body(code);
        let request = ApiRequest::update_function_code(self.project_id, &resource, &code_body)
            .map_err(|source| self.transport(Phase::UpdateCode, &resource, source))?;
        let response = self
            .plane
            .call(&request)
            .map_err(|source| self.transport(Phase::UpdateCode, &resource, source))?;
        let code_unchanged = match classify(&response) {
            Outcome::Success => false,
            Outcome::NoOpConflict => {
                info!("{}: code unchanged", desired.name);
                true
            }
            Outcome::Failure => {
                return Err(remote_call_error(Phase::UpdateCode, &resource, &response))
            }
        };

        let updated = self.update_config(&desired.urn, &resolver.update_config_body())?;
        self.apply_tags(desired)?;

        let observed = if updated.func_urn.is_empty() {
            remote
        } else {
            &updated
        };
        Ok(FunctionOutcome {
            action: FunctionAction::Updated,
            summary: self.summarize(desired, observed, code),
            urn: desired.urn.clone(),
            code_unchanged,
        })
    }

    fn update_config(
        &self,
        urn: &FunctionUrn,
        body: &fgdeploy_remote::model::UpdateFunctionConfigBody,
    ) -> Result<RemoteFunctionState, CoreError> {
        let resource = urn.to_string();
        let request = ApiRequest::update_function_config(self.project_id, &resource, body)
            .map_err(|source| self.transport(Phase::UpdateConfig, &resource, source))?;
        let response = self.send(Phase::UpdateConfig, &resource, &request)?;
        Ok(response.json().unwrap_or_default())
    }

    /// Tags live on the version-less URN.
    fn apply_tags(&self, desired: &DesiredFunctionConfig) -> Result<(), CoreError> {
        if desired.tags.is_none() {
            return Ok(());
        }
        let resource_id = desired.urn.unversioned();
        let listed = self
            .plane
            .call(&ApiRequest::list_tags(self.project_id, &resource_id))
            .map_err(|source| self.transport(Phase::Tags, &resource_id, source))?;
        let remote = match listed.status {
            404 => Default::default(),
            _ if listed.is_success() => listed
                .json::<TagList>()
                .map(TagList::into_map)
                .unwrap_or_default(),
            _ => return Err(remote_call_error(Phase::Tags, &resource_id, &listed)),
        };

        let Some(plan) = plan_tags(desired.tags.as_ref(), &remote, desired.tag_policy) else {
            return Ok(());
        };
        if !plan.delete.is_empty() {
            debug!("{}: deleting {} tag(s)", desired.name, plan.delete.len());
            let request =
                ApiRequest::delete_tags(self.project_id, &resource_id, &TagList::from_map(&plan.delete))
                    .map_err(|source| self.transport(Phase::Tags, &resource_id, source))?;
            self.send(Phase::Tags, &resource_id, &request)?;
        }
        if !plan.create.is_empty() {
            debug!("{}: writing {} tag(s)", desired.name, plan.create.len());
            let request =
                ApiRequest::create_tags(self.project_id, &resource_id, &TagList::from_map(&plan.create))
                    .map_err(|source| self.transport(Phase::Tags, &resource_id, source))?;
            self.send(Phase::Tags, &resource_id, &request)?;
        }
        Ok(())
    }

    /// Response first, then a fresh probe, then the declaration itself.
    fn summarize(
        &self,
        desired: &DesiredFunctionConfig,
        observed: &RemoteFunctionState,
        code: &PackagedCode,
    ) -> FunctionSummary {
        if let Some(summary) = FunctionSummary::from_remote(observed) {
            return summary;
        }
        if let Ok(Some(probed)) = probe(self.plane, self.project_id, &desired.urn) {
            if let Some(summary) = FunctionSummary::from_remote(&probed) {
                return summary;
            }
        }
        let resolver = ConfigResolver::new(desired, None);
        FunctionSummary {
            name: desired.name.clone(),
            urn: desired.urn.to_string(),
            project_name: None,
            runtime: resolver.runtime(),
            handler: resolver.handler(),
            code_size: match code {
                PackagedCode::Inline { size, .. } => Some(*size),
                PackagedCode::Remote { .. } => None,
            },
            timeout: resolver.timeout(),
            description: resolver.description(),
        }
    }

    fn send(&self, phase: Phase, resource: &str, request: &ApiRequest) -> Result<ApiResponse, CoreError> {
        let response = self
            .plane
            .call(request)
            .map_err(|source| self.transport(phase, resource, source))?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(remote_call_error(phase, resource, &response))
        }
    }

    fn transport(&self, phase: Phase, resource: &str, source: RemoteError) -> CoreError {
        CoreError::Transport {
            phase,
            resource: resource.to_owned(),
            source,
        }
    }
}
