use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ProxyError;
use crate::stream::BufferedStream;
use crate::target::Target;

const HEADER_CAP: usize = 4096;

/// Configuration for an HTTP CONNECT listener. When `credentials` is set, a
/// matching `Proxy-Authorization: Basic ...` header is required.
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    pub credentials: Option<(String, String)>,
}

pub struct HttpHandler {
    config: HttpConfig,
}

struct HttpRequest {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
}

impl HttpRequest {
    fn parse(data: &[u8]) -> Result<Self, ProxyError> {
        let text = String::from_utf8_lossy(data);
        let mut lines = text.split("\r\n");
        let request_line = lines.next().ok_or_else(|| ProxyError::Protocol("empty request".into()))?;

        let mut parts = request_line.split(' ');
        let method = parts.next().ok_or_else(|| ProxyError::Protocol("missing method".into()))?.to_string();
        let target = parts.next().ok_or_else(|| ProxyError::Protocol("missing request target".into()))?.to_string();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        Ok(HttpRequest { method, target, headers })
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

struct BasicAuth {
    login: String,
    password: String,
}

impl BasicAuth {
    fn decode(auth_header: &str) -> Result<Self, ProxyError> {
        let (scheme, encoded) = auth_header
            .split_once(' ')
            .ok_or_else(|| ProxyError::Protocol("could not parse authorization header".into()))?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(ProxyError::Protocol(format!("unknown authorization method {scheme}")));
        }
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| ProxyError::Protocol("invalid base64 encoding".into()))?;
        let decoded = String::from_utf8(decoded).map_err(|_| ProxyError::Protocol("invalid credentials".into()))?;
        let (login, password) = decoded
            .split_once(':')
            .ok_or_else(|| ProxyError::Protocol("invalid credentials".into()))?;
        Ok(BasicAuth {
            login: login.to_string(),
            password: password.to_string(),
        })
    }
}

impl HttpHandler {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    pub async fn connect_to_remote(&self, client: &mut BufferedStream) -> Result<BufferedStream, ProxyError> {
        let target = self.negotiate(client).await?;

        match target.connect().await {
            Ok(remote_socket) => {
                respond(client, 200, "Connection established").await.map_err(crate::error::classify_io_error)?;
                Ok(BufferedStream::new(remote_socket))
            }
            Err(source) => {
                let _ = respond(client, 502, "Bad Gateway").await;
                Err(ProxyError::RemoteConnect {
                    host: target.to_string(),
                    port: target.port(),
                    source,
                })
            }
        }
    }

    async fn negotiate(&self, client: &mut BufferedStream) -> Result<Target, ProxyError> {
        let data = client
            .receive_until_delim(b"\r\n\r\n", HEADER_CAP)
            .await
            .map_err(crate::error::classify_io_error)?;

        let request = match HttpRequest::parse(&data) {
            Ok(req) => req,
            Err(_) => {
                let _ = respond(client, 400, "Bad Request").await;
                return Err(ProxyError::Protocol("malformed request line".into()));
            }
        };

        if !request.method.eq_ignore_ascii_case("connect") {
            let _ = respond(client, 400, "Bad Request").await;
            return Err(ProxyError::Protocol(format!("unsupported method {}", request.method)));
        }

        if let Some((expected_user, expected_pass)) = &self.config.credentials {
            let Some(auth_header) = request.header("proxy-authorization") else {
                let _ = respond(client, 401, "Unauthorized").await;
                return Err(ProxyError::AuthFailed);
            };
            let auth = match BasicAuth::decode(auth_header) {
                Ok(auth) => auth,
                Err(_) => {
                    let _ = respond(client, 401, "Unauthorized").await;
                    return Err(ProxyError::AuthFailed);
                }
            };
            if &auth.login != expected_user || &auth.password != expected_pass {
                let _ = respond(client, 401, "Unauthorized").await;
                return Err(ProxyError::AuthFailed);
            }
        }

        let Some((host, port_str)) = request.target.rsplit_once(':') else {
            let _ = respond(client, 400, "Bad Request").await;
            return Err(ProxyError::Protocol("missing port in request target".into()));
        };
        let Ok(port) = port_str.parse::<u16>() else {
            let _ = respond(client, 400, "Bad Request").await;
            return Err(ProxyError::Protocol("non-numeric port in request target".into()));
        };

        Ok(Target::Domain(host.to_string(), port))
    }
}

async fn respond(client: &mut BufferedStream, code: u16, message: &str) -> std::io::Result<()> {
    let line = format!("HTTP/1.1 {code} {message}\r\n\r\n");
    client.send(line.as_bytes()).await
}
