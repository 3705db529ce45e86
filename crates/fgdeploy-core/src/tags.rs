use fgdeploy_schema::TagPolicy;
use std::collections::BTreeMap;

/// Tag calls needed to bring a function's tags in line with its declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPlan {
    pub delete: BTreeMap<String, String>,
    pub create: BTreeMap<String, String>,
}

impl TagPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty()
    }
}

/// Plan tag changes.
///
/// Undeclared tags mean no tag calls at all. Under [`TagPolicy::Overwrite`]
/// remote keys missing from the declaration are deleted; under
/// [`TagPolicy::Merge`] nothing is deleted. Declared tags are always
/// (re)created, the platform treats create as an upsert.
pub fn plan_tags(
    declared: Option<&BTreeMap<String, String>>,
    remote: &BTreeMap<String, String>,
    policy: TagPolicy,
) -> Option<TagPlan> {
    let declared = declared?;
    let delete = match policy {
        TagPolicy::Overwrite => remote
            .iter()
            .filter(|(key, _)| !declared.contains_key(*key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        TagPolicy::Merge => BTreeMap::new(),
    };
    Some(TagPlan {
        delete,
        create: declared.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn undeclared_tags_plan_nothing() {
        let remote = map(&[("team", "edge")]);
        assert_eq!(plan_tags(None, &remote, TagPolicy::Overwrite), None);
    }

    #[test]
    fn overwrite_deletes_remote_only_keys() {
        let declared = map(&[("team", "core"), ("env", "prod")]);
        let remote = map(&[("team", "edge"), ("owner", "ops")]);
        let plan = plan_tags(Some(&declared), &remote, TagPolicy::Overwrite).unwrap();
        assert_eq!(plan.delete, map(&[("owner", "ops")]));
        assert_eq!(plan.create, declared);
    }

    #[test]
    fn merge_never_deletes() {
        let declared = map(&[("team", "core")]);
        let remote = map(&[("owner", "ops")]);
        let plan = plan_tags(Some(&declared), &remote, TagPolicy::Merge).unwrap();
        assert!(plan.delete.is_empty());
        assert_eq!(plan.create, declared);
    }

    #[test]
    fn empty_declaration_under_overwrite_clears_everything() {
        let declared = BTreeMap::new();
        let remote = map(&[("owner", "ops")]);
        let plan = plan_tags(Some(&declared), &remote, TagPolicy::Overwrite).unwrap();
        assert_eq!(plan.delete.len(), 1);
        assert!(plan.create.is_empty());
        assert!(!plan.is_empty());
    }
}
