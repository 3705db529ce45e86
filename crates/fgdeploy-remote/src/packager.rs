use crate::model::FuncCode;
use crate::RemoteError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fgdeploy_schema::CodeSource;
use std::path::{Path, PathBuf};

pub const CODE_TYPE_ZIP: &str = "zip";
pub const CODE_TYPE_OBS: &str = "obs";

/// Code ready to be attached to a create or code-update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagedCode {
    /// Archive bytes, base64-encoded for the `func_code.file` field.
    Inline {
        file: String,
        size: u64,
        filename: Option<String>,
    },
    /// Archive already stored in object storage.
    Remote {
        code_url: String,
        filename: Option<String>,
    },
}

impl PackagedCode {
    pub fn code_type(&self) -> &'static str {
        match self {
            PackagedCode::Inline { .. } => CODE_TYPE_ZIP,
            PackagedCode::Remote { .. } => CODE_TYPE_OBS,
        }
    }

    pub fn func_code(&self) -> Option<FuncCode> {
        match self {
            PackagedCode::Inline { file, .. } => Some(FuncCode { file: file.clone() }),
            PackagedCode::Remote { .. } => None,
        }
    }

    pub fn code_url(&self) -> Option<String> {
        match self {
            PackagedCode::Inline { .. } => None,
            PackagedCode::Remote { code_url, .. } => Some(code_url.clone()),
        }
    }

    pub fn filename(&self) -> Option<String> {
        match self {
            PackagedCode::Inline { filename, .. } | PackagedCode::Remote { filename, .. } => {
                filename.clone()
            }
        }
    }
}

/// Turns a declared code source into request-ready code.
pub trait CodePackager: Send + Sync {
    fn package(&self, code: &CodeSource) -> Result<PackagedCode, RemoteError>;
}

/// Packager for prebuilt archives.
///
/// `code_uri` must name an existing `.zip` file, resolved against the
/// manifest directory. Building the archive is left to the project's own
/// build step.
#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    root: PathBuf,
}

impl ArtifactPackager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_archive(&self, code_uri: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.root.join(code_uri);
        if path.is_dir() {
            return Err(RemoteError::Packaging(format!(
                "'{}' is a directory; code_uri must name a prebuilt .zip archive",
                path.display()
            )));
        }
        std::fs::read(&path).map_err(|e| {
            RemoteError::Packaging(format!("failed to read '{}': {e}", path.display()))
        })
    }
}

impl CodePackager for ArtifactPackager {
    fn package(&self, code: &CodeSource) -> Result<PackagedCode, RemoteError> {
        match code {
            CodeSource::Zip {
                code_uri,
                code_filename,
            } => {
                let bytes = self.read_archive(code_uri)?;
                tracing::debug!("packaged {code_uri} ({} bytes)", bytes.len());
                Ok(PackagedCode::Inline {
                    file: STANDARD.encode(&bytes),
                    size: bytes.len() as u64,
                    filename: code_filename.clone(),
                })
            }
            CodeSource::Obs { code_url } => {
                let code_url = code_url.clone().ok_or_else(|| {
                    RemoteError::Packaging("object-storage code declares no code_url".to_owned())
                })?;
                Ok(PackagedCode::Remote {
                    code_url,
                    filename: None,
                })
            }
        }
    }
}

/// Decoded size of an inline archive, used when reporting code size.
pub fn inline_size(file: &str) -> Option<u64> {
    STANDARD.decode(file).ok().map(|b| b.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_archive_is_base64_encoded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.zip"), b"PK\x03\x04fake").unwrap();
        let packager = ArtifactPackager::new(dir.path());

        let packaged = packager
            .package(&CodeSource::Zip {
                code_uri: "hello.zip".to_owned(),
                code_filename: Some("index.js".to_owned()),
            })
            .unwrap();

        assert_eq!(packaged.code_type(), CODE_TYPE_ZIP);
        let file = packaged.func_code().unwrap().file;
        assert_eq!(STANDARD.decode(&file).unwrap(), b"PK\x03\x04fake");
        assert_eq!(inline_size(&file), Some(8));
        assert_eq!(packaged.filename().as_deref(), Some("index.js"));
        assert_eq!(packaged.code_url(), None);
    }

    #[test]
    fn directories_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let packager = ArtifactPackager::new(dir.path());
        let err = packager
            .package(&CodeSource::Zip {
                code_uri: "src".to_owned(),
                code_filename: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("prebuilt .zip"));
    }

    #[test]
    fn missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let packager = ArtifactPackager::new(dir.path());
        let result = packager.package(&CodeSource::Zip {
            code_uri: "missing.zip".to_owned(),
            code_filename: None,
        });
        assert!(matches!(result, Err(RemoteError::Packaging(_))));
    }

    #[test]
    fn object_storage_code_passes_url_through() {
        let packager = ArtifactPackager::new(".");
        let packaged = packager
            .package(&CodeSource::Obs {
                code_url: Some("https://bucket.obs/code.zip".to_owned()),
            })
            .unwrap();
        assert_eq!(packaged.code_type(), CODE_TYPE_OBS);
        assert_eq!(packaged.code_url().as_deref(), Some("https://bucket.obs/code.zip"));
        assert_eq!(packaged.func_code(), None);

        let missing = packager.package(&CodeSource::Obs { code_url: None });
        assert!(missing.is_err());
    }
}
