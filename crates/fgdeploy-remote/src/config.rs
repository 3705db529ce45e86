use crate::RemoteError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the stored auth token.
pub const AUTH_TOKEN_ENV: &str = "FGDEPLOY_AUTH_TOKEN";

/// Control-plane endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Project used when the manifest declares none.
    #[serde(default)]
    pub project_id: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            auth_token: None,
            project_id: None,
        }
    }

    /// Public endpoint of the function service in `region`.
    pub fn for_region(region: &str) -> Self {
        Self::new(&default_endpoint(region))
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    #[must_use]
    pub fn with_project_id(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_owned());
        self
    }

    /// Load config from `~/.config/fgdeploy/remote.json`, or `None` if the
    /// file does not exist.
    pub fn load_default() -> Result<Option<Self>, RemoteError> {
        let path = default_config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RemoteError::Config(format!("invalid remote config: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply command-line and environment overrides on top of a loaded config.
    #[must_use]
    pub fn with_overrides(mut self, endpoint: Option<&str>, token: Option<String>) -> Self {
        if let Some(endpoint) = endpoint {
            self.url = endpoint.trim_end_matches('/').to_owned();
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.auth_token = Some(token);
        }
        self
    }
}

pub fn default_endpoint(region: &str) -> String {
    format!("https://functiongraph.{region}.myhuaweicloud.com")
}

pub fn default_config_path() -> Result<PathBuf, RemoteError> {
    let home = std::env::var("HOME").map_err(|_| RemoteError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/fgdeploy/remote.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/remote.json");

        let config = RemoteConfig::new("https://fg.example.com/")
            .with_token("secret123")
            .with_project_id("proj1");
        config.save(&path).unwrap();

        let loaded = RemoteConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.url, "https://fg.example.com");
    }

    #[test]
    fn project_id_is_optional_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.json");
        std::fs::write(&path, r#"{"url": "http://127.0.0.1:9000"}"#).unwrap();
        let loaded = RemoteConfig::load(&path).unwrap();
        assert_eq!(loaded.project_id, None);
        assert_eq!(loaded.auth_token, None);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            RemoteConfig::load(&path),
            Err(RemoteError::Config(_))
        ));
    }

    #[test]
    fn region_endpoint() {
        let config = RemoteConfig::for_region("ap-southeast-1");
        assert_eq!(
            config.url,
            "https://functiongraph.ap-southeast-1.myhuaweicloud.com"
        );
    }

    #[test]
    fn overrides_replace_endpoint_and_token() {
        let config = RemoteConfig::new("https://a.example")
            .with_token("old")
            .with_overrides(Some("http://b.example/"), Some("new".to_owned()));
        assert_eq!(config.url, "http://b.example");
        assert_eq!(config.auth_token.as_deref(), Some("new"));

        let kept = RemoteConfig::new("https://a.example")
            .with_token("old")
            .with_overrides(None, Some(String::new()));
        assert_eq!(kept.auth_token.as_deref(), Some("old"));
    }
}
