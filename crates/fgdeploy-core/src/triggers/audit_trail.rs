use super::{
    generated_name, same_field, same_optional_field, str_field, string_list, TriggerContext,
    TriggerStrategy,
};
use crate::CoreError;
use fgdeploy_schema::{EventData, TriggerKind};
use serde_json::Value;
use std::collections::BTreeSet;

/// Audit-trail (cloud trace) events for selected service operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditTrailTrigger;

/// One `service:resource:action1;action2` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OperationSpec {
    service: String,
    resource: String,
    actions: BTreeSet<String>,
}

impl OperationSpec {
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let mut parts = input.trim().splitn(3, ':');
        let service = parts.next()?.trim();
        let resource = parts.next()?.trim();
        let actions: BTreeSet<String> = parts
            .next()?
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_owned)
            .collect();
        if service.is_empty() || resource.is_empty() || actions.is_empty() {
            return None;
        }
        Some(Self {
            service: service.to_owned(),
            resource: resource.to_owned(),
            actions,
        })
    }

    fn render(&self) -> String {
        let actions: Vec<&str> = self.actions.iter().map(String::as_str).collect();
        format!("{}:{}:{}", self.service, self.resource, actions.join(";"))
    }

    fn contained_in(&self, other: &OperationSpec) -> bool {
        self.service == other.service
            && self.resource == other.resource
            && self.actions.is_subset(&other.actions)
    }
}

fn parse_all(data: &EventData) -> Vec<OperationSpec> {
    string_list(data, "operations")
        .iter()
        .filter_map(|op| OperationSpec::parse(op))
        .collect()
}

impl TriggerStrategy for AuditTrailTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::AuditTrail
    }

    fn canonicalize(
        &self,
        ctx: &TriggerContext<'_>,
        data: &EventData,
    ) -> Result<EventData, CoreError> {
        let mut operations = Vec::new();
        for raw in string_list(data, "operations") {
            let spec = OperationSpec::parse(&raw).ok_or_else(|| {
                CoreError::configuration(
                    ctx.function_name,
                    format!("CTS operation '{raw}' is not of the form service:resource:action[;action]"),
                )
            })?;
            operations.push(Value::String(spec.render()));
        }
        let name = str_field(data, "name")
            .unwrap_or_else(|| {
                generated_name(self.kind().code(), ctx.urn, self.kind(), ctx.ordinal)
            });

        let mut out = data.clone();
        out.insert("name".to_owned(), Value::String(name));
        out.insert("operations".to_owned(), Value::Array(operations));
        Ok(out)
    }

    fn matches(&self, desired: &EventData, remote: &EventData) -> bool {
        if !same_field(desired, remote, "name") || !same_optional_field(desired, remote, "schedule")
        {
            return false;
        }
        let remote_ops = parse_all(remote);
        parse_all(desired)
            .iter()
            .all(|d| remote_ops.iter().any(|r| d.contained_in(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{assert_self_match, data, urn};
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_operation_grammar() {
        let spec = OperationSpec::parse("FunctionGraph:Functions:createFunction; deleteFunction").unwrap();
        assert_eq!(spec.service, "FunctionGraph");
        assert_eq!(spec.resource, "Functions");
        assert_eq!(spec.actions.len(), 2);
        assert_eq!(spec.render(), "FunctionGraph:Functions:createFunction;deleteFunction");
    }

    #[test]
    fn rejects_malformed_operations() {
        assert_eq!(OperationSpec::parse("FunctionGraph:Functions"), None);
        assert_eq!(OperationSpec::parse("FunctionGraph:Functions:;"), None);
        assert_eq!(OperationSpec::parse(":Functions:create"), None);

        let urn = urn();
        let ctx = TriggerContext {
            function_name: "hello",
            urn: &urn,
            ordinal: 0,
        };
        let err = AuditTrailTrigger
            .canonicalize(&ctx, &data(json!({"operations": ["bad"]})))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn desired_actions_must_be_contained_in_remote() {
        let desired = data(json!({"name": "cts", "operations": ["svc:res:a"]}));
        let wider = data(json!({"name": "cts", "operations": ["svc:res:a;b"]}));
        let narrower = data(json!({"name": "cts", "operations": ["svc:other:a"]}));
        assert!(AuditTrailTrigger.matches(&desired, &wider));
        assert!(!AuditTrailTrigger.matches(&wider, &desired));
        assert!(!AuditTrailTrigger.matches(&desired, &narrower));
    }

    #[test]
    fn schedule_must_agree_including_absence() {
        let plain = data(json!({"name": "cts", "operations": ["svc:res:a"]}));
        let scheduled = data(json!({"name": "cts", "operations": ["svc:res:a"], "schedule": "1h"}));
        let blank = data(json!({"name": "cts", "operations": ["svc:res:a"], "schedule": " "}));
        let daily = data(json!({"name": "cts", "operations": ["svc:res:a"], "schedule": "1d"}));
        assert!(AuditTrailTrigger.matches(&plain, &plain.clone()));
        assert!(AuditTrailTrigger.matches(&plain, &blank));
        assert!(!AuditTrailTrigger.matches(&plain, &scheduled));
        assert!(!AuditTrailTrigger.matches(&scheduled, &plain));
        assert!(!AuditTrailTrigger.matches(&scheduled, &daily));
        assert!(AuditTrailTrigger.matches(&scheduled, &scheduled.clone()));
    }

    #[test]
    fn canonical_shape_matches_itself() {
        assert_self_match(
            &AuditTrailTrigger,
            json!({"operations": ["FunctionGraph:Functions:createFunction;deleteFunction"]}),
        );
    }
}
