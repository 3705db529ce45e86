use crate::operation::{ApiRequest, ApiResponse, Method};
use crate::{ControlPlane, RemoteConfig, RemoteError};
use std::io::Read;

pub const PROTOCOL_HEADER: &str = "X-Fgdeploy-Protocol";
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Blocking HTTP transport for the control-plane routes.
///
/// Every request goes to `{url}/v2/{project_id}/fgs/...` with a JSON body.
/// Non-2xx statuses are returned as [`ApiResponse`]s, not errors; only
/// failures that produce no response (DNS, connect, I/O) become
/// [`RemoteError::Http`].
pub struct HttpTransport {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: RemoteConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        Self { config, agent }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.config.url, request.path())
    }

    fn decorate<B>(&self, req: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let req = req
            .header("Content-Type", "application/json")
            .header(PROTOCOL_HEADER, &crate::PROTOCOL_VERSION.to_string());
        match self.config.auth_token {
            Some(ref token) => req.header(AUTH_HEADER, token),
            None => req,
        }
    }
}

impl ControlPlane for HttpTransport {
    fn call(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        let url = self.url(request);
        let body = request
            .body()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        tracing::debug!(
            "{} {url} ({} bytes)",
            request.method(),
            body.as_ref().map_or(0, Vec::len)
        );

        let result = match (request.method(), body) {
            (Method::Get, _) => self.decorate(self.agent.get(url.as_str())).call(),
            (Method::Delete, None) => self.decorate(self.agent.delete(url.as_str())).call(),
            (Method::Delete, Some(body)) => self
                .decorate(self.agent.delete(url.as_str()))
                .force_send_body()
                .send(body.as_slice()),
            (Method::Post, body) => self
                .decorate(self.agent.post(url.as_str()))
                .send(body.unwrap_or_default().as_slice()),
            (Method::Put, body) => self
                .decorate(self.agent.put(url.as_str()))
                .send(body.unwrap_or_default().as_slice()),
        };
        let resp = result.map_err(|e| RemoteError::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        let mut reader = resp.into_body().into_reader();
        let mut raw = Vec::new();
        reader
            .read_to_end(&mut raw)
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        tracing::debug!("{} {url} -> {status}", request.method());
        Ok(ApiResponse::from_parts(status, parse_body(&raw)))
    }
}

fn parse_body(raw: &[u8]) -> serde_json::Value {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(raw).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(raw).into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    const URN: &str = "urn:fss:cn-north-4:p1:function:default:hello:latest";

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    /// Serves one canned response to every request and records what it saw.
    struct MockServer {
        addr: String,
        _handle: std::thread::JoinHandle<()>,
        requests: Arc<Mutex<Vec<CapturedRequest>>>,
    }

    impl MockServer {
        fn start(status: u16, reply: &str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));
            let reply = reply.to_owned();

            let requests_clone = Arc::clone(&requests);
            let handle = std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let mut reader = BufReader::new(stream.try_clone().unwrap());
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).is_err() {
                        continue;
                    }
                    let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
                    if parts.len() < 2 {
                        continue;
                    }

                    let mut content_length: usize = 0;
                    let mut headers = HashMap::new();
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                            break;
                        }
                        if let Some((k, v)) = line.trim().split_once(": ") {
                            headers.insert(k.to_lowercase(), v.to_owned());
                        }
                        let lower = line.to_lowercase();
                        if let Some(val) = lower.strip_prefix("content-length: ") {
                            content_length = val.trim().parse().unwrap_or(0);
                        }
                    }
                    let mut body = vec![0u8; content_length];
                    if content_length > 0 {
                        let _ = reader.read_exact(&mut body);
                    }

                    requests_clone.lock().unwrap().push(CapturedRequest {
                        method: parts[0].to_owned(),
                        path: parts[1].to_owned(),
                        headers,
                        body,
                    });

                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                        reply.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                    let _ = stream.flush();
                }
            });

            MockServer {
                addr,
                _handle: handle,
                requests,
            }
        }

        fn captured_requests(&self) -> Vec<CapturedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn transport(url: &str, token: Option<&str>) -> HttpTransport {
        HttpTransport::new(RemoteConfig {
            url: url.to_owned(),
            auth_token: token.map(str::to_owned),
            project_id: None,
        })
    }

    #[test]
    fn get_returns_parsed_json() {
        let server = MockServer::start(200, r#"{"func_name":"hello","memory_size":256}"#);
        let response = transport(&server.addr, None)
            .call(&ApiRequest::show_function_config("p1", URN))
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.body["memory_size"], 256);

        let reqs = server.captured_requests();
        assert_eq!(reqs[0].method, "GET");
        assert_eq!(reqs[0].path, format!("/v2/p1/fgs/functions/{URN}/config"));
    }

    #[test]
    fn error_status_is_a_response_not_an_error() {
        let server = MockServer::start(
            409,
            r#"{"error_code":"FSS.0409","error_msg":"code not changed"}"#,
        );
        let request =
            ApiRequest::update_function_code("p1", URN, &serde_json::json!({"code_type": "zip"}))
                .unwrap();
        let response = transport(&server.addr, None).call(&request).unwrap();
        assert_eq!(response.status, 409);
        assert_eq!(response.error_code.as_deref(), Some("FSS.0409"));

        let reqs = server.captured_requests();
        assert_eq!(reqs[0].method, "PUT");
        let sent: serde_json::Value = serde_json::from_slice(&reqs[0].body).unwrap();
        assert_eq!(sent["code_type"], "zip");
    }

    #[test]
    fn requests_carry_protocol_and_auth_headers() {
        let server = MockServer::start(200, "[]");
        transport(&server.addr, Some("secret-token-42"))
            .call(&ApiRequest::list_triggers("p1", URN))
            .unwrap();

        let reqs = server.captured_requests();
        assert_eq!(
            reqs[0].headers.get("x-fgdeploy-protocol"),
            Some(&crate::PROTOCOL_VERSION.to_string())
        );
        assert_eq!(
            reqs[0].headers.get("x-auth-token"),
            Some(&"secret-token-42".to_owned())
        );
    }

    #[test]
    fn no_auth_header_without_token() {
        let server = MockServer::start(200, "[]");
        transport(&server.addr, None)
            .call(&ApiRequest::list_triggers("p1", URN))
            .unwrap();
        let reqs = server.captured_requests();
        assert!(!reqs[0].headers.contains_key("x-auth-token"));
    }

    #[test]
    fn delete_with_body_sends_body() {
        let server = MockServer::start(204, "");
        let request = ApiRequest::delete_tags(
            "p1",
            "res-1",
            &serde_json::json!({"tags": [{"key": "team", "value": ""}]}),
        )
        .unwrap();
        let response = transport(&server.addr, None).call(&request).unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.body, serde_json::Value::Null);

        let reqs = server.captured_requests();
        assert_eq!(reqs[0].method, "DELETE");
        assert_eq!(reqs[0].path, "/v2/p1/fgs/resources/res-1/tags/delete");
        assert!(!reqs[0].body.is_empty());
    }

    #[test]
    fn connection_refused_returns_error() {
        let result =
            transport("http://127.0.0.1:1", None).call(&ApiRequest::show_function_config("p1", URN));
        assert!(matches!(result, Err(RemoteError::Http(_))));
    }

    #[test]
    fn non_json_bodies_are_kept_as_text() {
        assert_eq!(parse_body(b"  \n"), serde_json::Value::Null);
        assert_eq!(
            parse_body(b"gateway timeout"),
            serde_json::Value::String("gateway timeout".to_owned())
        );
    }
}
