//! Reference HTTP server for the fgdeploy control-plane routes.
//!
//! Serves the same `/v2/{project_id}/fgs/...` routes `HttpTransport` calls,
//! backed by an in-memory [`SimulatedPlatform`]. With a data directory the
//! platform state is loaded from and saved to `{data_dir}/platform.json`
//! after every successful mutation.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use fgdeploy_remote::http::{AUTH_HEADER, PROTOCOL_HEADER};
use fgdeploy_remote::simulated::PlatformSnapshot;
use fgdeploy_remote::{
    ApiRequest, ApiResponse, ControlPlane, Method as RouteMethod, SimulatedPlatform,
    PROTOCOL_VERSION,
};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

const SNAPSHOT_FILE: &str = "platform.json";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid platform snapshot {path}: {message}")]
    Snapshot { path: PathBuf, message: String },
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
}

/// The simulated control plane plus the server-side policies around it.
pub struct ControlPlaneServer {
    platform: SimulatedPlatform,
    auth_token: Option<String>,
    data_dir: Option<PathBuf>,
    /// Serializes snapshot writes.
    persist: Mutex<()>,
}

impl ControlPlaneServer {
    pub fn new(region: &str) -> Self {
        Self {
            platform: SimulatedPlatform::new(region),
            auth_token: None,
            data_dir: None,
            persist: Mutex::new(()),
        }
    }

    /// Serve state persisted under `data_dir`, starting empty if there is none.
    pub fn with_data_dir(region: &str, data_dir: &Path) -> Result<Self, ServerError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SNAPSHOT_FILE);
        let snapshot = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str::<PlatformSnapshot>(&content).map_err(|e| {
                ServerError::Snapshot {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?
        } else {
            PlatformSnapshot::default()
        };
        info!(
            "loaded {} function(s) from {}",
            snapshot.functions.len(),
            path.display()
        );
        Ok(Self {
            platform: SimulatedPlatform::from_snapshot(region, snapshot),
            auth_token: None,
            data_dir: Some(data_dir.to_path_buf()),
            persist: Mutex::new(()),
        })
    }

    /// Require this token in the auth header of every control-plane call.
    #[must_use]
    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    pub fn platform(&self) -> &SimulatedPlatform {
        &self.platform
    }

    fn save(&self) -> Result<(), ServerError> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };
        let _guard = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        let content = serde_json::to_string_pretty(&self.platform.snapshot()).map_err(|e| {
            ServerError::Snapshot {
                path: dir.join(SNAPSHOT_FILE),
                message: e.to_string(),
            }
        })?;
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, dir.join(SNAPSHOT_FILE))?;
        Ok(())
    }

    fn authorized(&self, req: &tiny_http::Request) -> bool {
        let Some(expected) = &self.auth_token else {
            return true;
        };
        header_value(req, AUTH_HEADER).is_some_and(|v| v == expected.as_str())
    }

    /// Dispatch one control-plane call. The caller has already read the body.
    pub fn dispatch(&self, method: RouteMethod, path: &str, body: &[u8]) -> ApiResponse {
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            match serde_json::from_slice(body) {
                Ok(value) => Some(value),
                Err(e) => {
                    return ApiResponse::error(400, "FSS.0400", &format!("invalid JSON body: {e}"))
                }
            }
        };
        let Some(request) = ApiRequest::from_route(method, path, body) else {
            return ApiResponse::error(404, "FSS.0404", "no such route");
        };
        let response = match self.platform.call(&request) {
            Ok(response) => response,
            Err(e) => return ApiResponse::error(500, "FSS.0500", &e.to_string()),
        };
        if response.is_success() && request.method() != RouteMethod::Get {
            if let Err(e) = self.save() {
                error!("failed to persist platform state: {e}");
            }
        }
        response
    }
}

fn header_value<'r>(req: &'r tiny_http::Request, name: &'static str) -> Option<&'r str> {
    req.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str())
}

fn route_method(method: &Method) -> Option<RouteMethod> {
    match method {
        Method::Get => Some(RouteMethod::Get),
        Method::Post => Some(RouteMethod::Post),
        Method::Put => Some(RouteMethod::Put),
        Method::Delete => Some(RouteMethod::Delete),
        _ => None,
    }
}

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid header")
}

fn respond(req: tiny_http::Request, response: &ApiResponse) {
    let result = if response.body.is_null() {
        req.respond(Response::empty(StatusCode(response.status)))
    } else {
        req.respond(
            Response::from_string(response.body.to_string())
                .with_status_code(StatusCode(response.status))
                .with_header(json_header()),
        )
    };
    if let Err(e) = result {
        warn!("failed to send response: {e}");
    }
}

fn respond_err(req: tiny_http::Request, status: u16, code: &str, msg: &str) {
    respond(req, &ApiResponse::error(status, code, msg));
}

/// Handle a single HTTP request, dispatching to the control-plane routes.
pub fn handle_request(state: &ControlPlaneServer, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    if url == "/health" && method == Method::Get {
        let _ = req.respond(
            Response::from_string(r#"{"status":"ok"}"#).with_header(json_header()),
        );
        return;
    }
    if !state.authorized(&req) {
        respond_err(req, 401, "FSS.0401", "missing or invalid auth token");
        return;
    }
    let unsupported = header_value(&req, PROTOCOL_HEADER)
        .filter(|v| v.parse::<u32>().ok() != Some(PROTOCOL_VERSION))
        .map(str::to_owned);
    if let Some(version) = unsupported {
        let msg = format!("unsupported protocol version '{version}'");
        respond_err(req, 400, "FSS.0400", &msg);
        return;
    }
    let Some(route_method) = route_method(&method) else {
        respond_err(req, 405, "FSS.0405", "method not allowed");
        return;
    };
    let mut body = Vec::new();
    if let Err(e) = req.as_reader().read_to_end(&mut body) {
        respond_err(req, 500, "FSS.0500", &format!("read error: {e}"));
        return;
    }

    let response = state.dispatch(route_method, &url, &body);
    info!("{method} {url} -> {}", response.status);
    respond(req, &response);
}

/// Start the server loop, blocking the current thread.
pub fn run_server(state: &Arc<ControlPlaneServer>, addr: &str) -> Result<(), ServerError> {
    let server = Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        message: e.to_string(),
    })?;
    for request in server.incoming_requests() {
        handle_request(state, request);
    }
    Ok(())
}

/// A test helper that starts an fgdeploy-server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}`. Drop the `TestServer` to stop
/// the server (via `Server::unblock`).
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub state: Arc<ControlPlaneServer>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server over an empty in-memory platform.
    pub fn start() -> Self {
        Self::start_with(ControlPlaneServer::new("cn-north-4"))
    }

    /// Start a test server over a prepared control plane.
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start_with(state: ControlPlaneServer) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let state = Arc::new(state);
        let srv = Arc::clone(&server);
        let shared = Arc::clone(&state);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&shared, request);
            }
        });

        Self {
            url,
            port,
            state,
            server,
            _handle: handle,
        }
    }

    pub fn platform(&self) -> &SimulatedPlatform {
        self.state.platform()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgdeploy_remote::{Operation, RemoteFunctionState};

    const URN: &str = "urn:fss:cn-north-4:p1:function:default:hello:latest";

    fn seed(state: &ControlPlaneServer) {
        state
            .platform()
            .insert_function(RemoteFunctionState {
                func_name: "hello".to_owned(),
                func_urn: URN.to_owned(),
                ..RemoteFunctionState::default()
            })
            .unwrap();
    }

    #[test]
    fn dispatch_routes_to_platform() {
        let state = ControlPlaneServer::new("cn-north-4");
        seed(&state);
        let response = state.dispatch(
            RouteMethod::Get,
            &format!("/v2/p1/fgs/functions/{URN}/config"),
            b"",
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.body["func_name"], "hello");
        assert_eq!(state.platform().calls_of(Operation::ShowFunctionConfig).len(), 1);
    }

    #[test]
    fn unknown_route_is_404() {
        let state = ControlPlaneServer::new("cn-north-4");
        let response = state.dispatch(RouteMethod::Get, "/v2/p1/other", b"");
        assert_eq!(response.status, 404);
        assert_eq!(response.error_code.as_deref(), Some("FSS.0404"));
    }

    #[test]
    fn malformed_body_is_400() {
        let state = ControlPlaneServer::new("cn-north-4");
        let response = state.dispatch(RouteMethod::Post, "/v2/p1/fgs/functions", b"{not json");
        assert_eq!(response.status, 400);
        assert!(state.platform().calls().is_empty());
    }

    #[test]
    fn mutations_persist_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        {
            let state = ControlPlaneServer::with_data_dir("cn-north-4", dir.path()).unwrap();
            seed(&state);
            let response = state.dispatch(
                RouteMethod::Post,
                &format!("/v2/p1/fgs/resources/{}/tags/create", "urn:fss:cn-north-4:p1:function:default:hello"),
                br#"{"tags":[{"key":"team","value":"core"}]}"#,
            );
            assert!(response.is_success());
        }
        assert!(dir.path().join(SNAPSHOT_FILE).exists());

        let reloaded = ControlPlaneServer::with_data_dir("cn-north-4", dir.path()).unwrap();
        assert_eq!(reloaded.platform().snapshot().functions.len(), 1);
        assert_eq!(
            reloaded
                .platform()
                .tags("urn:fss:cn-north-4:p1:function:default:hello")
                .get("team")
                .map(String::as_str),
            Some("core")
        );
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE), "not json").unwrap();
        let err = ControlPlaneServer::with_data_dir("cn-north-4", dir.path())
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Snapshot { .. }));
    }

    #[test]
    fn reads_do_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let state = ControlPlaneServer::with_data_dir("cn-north-4", dir.path()).unwrap();
        state.dispatch(
            RouteMethod::Get,
            &format!("/v2/p1/fgs/functions/{URN}/config"),
            b"",
        );
        assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    }
}
