use crate::manifest::ManifestError;
use serde::{Deserialize, Serialize};
use std::fmt;

const SCHEME: &str = "urn";
const SERVICE: &str = "fss";
const RESOURCE: &str = "function";

/// Version segment used when a URN or declaration names none.
pub const LATEST: &str = "latest";

/// Unique resource name of a function:
/// `urn:fss:<region>:<project>:function:<package>:<name>:<version>`.
///
/// The version segment is the only part that changes during a function's
/// lifetime; deletion addresses the version-less form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionUrn {
    region: String,
    project_id: String,
    package: String,
    name: String,
    version: String,
}

impl FunctionUrn {
    pub fn new(region: &str, project_id: &str, package: &str, name: &str) -> Self {
        Self {
            region: region.to_owned(),
            project_id: project_id.to_owned(),
            package: package.to_owned(),
            name: name.to_owned(),
            version: LATEST.to_owned(),
        }
    }

    /// Replace the version segment. An empty version falls back to `latest`.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        let version = version.trim();
        self.version = if version.is_empty() {
            LATEST.to_owned()
        } else {
            version.to_owned()
        };
        self
    }

    /// Parse a URN with or without its trailing version segment.
    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let parts: Vec<&str> = input.trim().split(':').collect();
        let valid_prefix =
            parts.len() >= 7 && parts[0] == SCHEME && parts[1] == SERVICE && parts[4] == RESOURCE;
        if !valid_prefix || parts.len() > 8 || parts.iter().take(7).any(|p| p.is_empty()) {
            return Err(ManifestError::InvalidUrn(input.to_owned()));
        }
        let urn = Self::new(parts[2], parts[3], parts[5], parts[6]);
        Ok(match parts.get(7) {
            Some(version) => urn.with_version(version),
            None => urn,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The URN with the version segment stripped, addressing every version.
    pub fn unversioned(&self) -> String {
        format!(
            "{SCHEME}:{SERVICE}:{}:{}:{RESOURCE}:{}:{}",
            self.region, self.project_id, self.package, self.name
        )
    }
}

impl fmt::Display for FunctionUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unversioned(), self.version)
    }
}

impl TryFrom<String> for FunctionUrn {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FunctionUrn> for String {
    fn from(urn: FunctionUrn) -> Self {
        urn.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_canonical_urn_with_latest_version() {
        let urn = FunctionUrn::new("cn-north-4", "proj1", "default", "hello");
        assert_eq!(
            urn.to_string(),
            "urn:fss:cn-north-4:proj1:function:default:hello:latest"
        );
    }

    #[test]
    fn unversioned_strips_only_the_version() {
        let urn = FunctionUrn::new("cn-north-4", "proj1", "pkg", "hello").with_version("v2");
        assert_eq!(
            urn.unversioned(),
            "urn:fss:cn-north-4:proj1:function:pkg:hello"
        );
        assert_eq!(urn.version(), "v2");
    }

    #[test]
    fn parse_defaults_missing_version_to_latest() {
        let urn = FunctionUrn::parse("urn:fss:cn-north-4:proj1:function:default:hello").unwrap();
        assert_eq!(urn.version(), LATEST);
        assert_eq!(urn.name(), "hello");
    }

    #[test]
    fn parse_roundtrips_full_urn() {
        let text = "urn:fss:ap-southeast-1:p9:function:team:worker:3";
        let urn = FunctionUrn::parse(text).unwrap();
        assert_eq!(urn.to_string(), text);
        assert_eq!(urn.region(), "ap-southeast-1");
        assert_eq!(urn.project_id(), "p9");
        assert_eq!(urn.package(), "team");
    }

    #[test]
    fn parse_rejects_foreign_or_short_urns() {
        assert!(FunctionUrn::parse("urn:xyz:r:p:function:pkg:name").is_err());
        assert!(FunctionUrn::parse("urn:fss:r:p:function:pkg").is_err());
        assert!(FunctionUrn::parse("urn:fss:r::function:pkg:name").is_err());
        assert!(FunctionUrn::parse("urn:fss:r:p:function:pkg:name:v:extra").is_err());
    }

    #[test]
    fn empty_version_falls_back_to_latest() {
        let urn = FunctionUrn::new("r", "p", "pkg", "f").with_version("  ");
        assert_eq!(urn.version(), LATEST);
    }

    #[test]
    fn serializes_as_string() {
        let urn = FunctionUrn::new("r", "p", "pkg", "f");
        let json = serde_json::to_string(&urn).unwrap();
        assert_eq!(json, "\"urn:fss:r:p:function:pkg:f:latest\"");
        let back: FunctionUrn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, urn);
    }
}
