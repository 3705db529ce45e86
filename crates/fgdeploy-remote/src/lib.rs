//! Control-plane collaborators for fgdeploy.
//!
//! This crate provides the transport seam the reconciliation engine talks
//! through ([`ControlPlane`]), the catalogue of operations and their routes,
//! the result classifier, wire models, code packaging, endpoint
//! configuration, a blocking HTTP transport, and an in-memory simulated
//! platform for tests and the reference server.

pub mod classify;
pub mod config;
pub mod http;
pub mod model;
pub mod operation;
pub mod packager;
pub mod simulated;

pub use classify::{classify, Outcome, CODE_UNCHANGED};
pub use config::RemoteConfig;
pub use http::HttpTransport;
pub use model::{ApiGroup, InvocationResult, RemoteFunctionState, RemoteTriggerState};
pub use operation::{ApiRequest, ApiResponse, Method, Operation, Target};
pub use packager::{ArtifactPackager, CodePackager, PackagedCode};
pub use simulated::SimulatedPlatform;

/// Protocol version sent as `X-Fgdeploy-Protocol` header on all HTTP requests.
pub const PROTOCOL_VERSION: u32 = 1;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("remote config error: {0}")]
    Config(String),
    #[error("packaging error: {0}")]
    Packaging(String),
}

/// A function control plane.
///
/// `Ok` means the call reached the platform, whatever the status; `Err`
/// means no response was obtained.
pub trait ControlPlane: Send + Sync {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError>;
}

impl<T: ControlPlane + ?Sized> ControlPlane for std::sync::Arc<T> {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        (**self).call(request)
    }
}

impl<T: ControlPlane + ?Sized> ControlPlane for Box<T> {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        (**self).call(request)
    }
}
