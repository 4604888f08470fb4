// REST client implementation
//
// One request/response cycle per call: JSON or form body in, JSON document out.
// Any status >= 300 is an error; redirects are not followed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::AuthTokenProvider;
use crate::errors::{Error, Result};

const MIME_JSON: &str = "application/json";
const HTTPS_DEFAULT_PORT: u16 = 443;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Request body and its encoding
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Sent as `application/json`
    Json(Value),
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// Host and port a base URL resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub secure: bool,
    pub host: String,
    pub port: u16,
}

/// Build the value of a Basic `Authorization` header
pub fn basic_auth_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

/// Resolve scheme, host and port of a base URL.
///
/// `https` defaults to port 443. Plain `http` must carry an explicit port.
pub fn resolve_endpoint(base_url: &str) -> Result<Endpoint> {
    let url = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("invalid URL {base_url}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("no host in URL {base_url}")))?
        .to_string();

    let (secure, port) = match url.scheme() {
        "https" => (true, url.port().unwrap_or(HTTPS_DEFAULT_PORT)),
        "http" => {
            // the url crate drops ports equal to the scheme default, so look at the raw text
            let port = url
                .port()
                .or_else(|| has_explicit_port(base_url).then(|| url.port_or_known_default()).flatten())
                .ok_or_else(|| Error::Config(format!("missing port in non-https URL {base_url}")))?;
            (false, port)
        }
        other => {
            return Err(Error::Config(format!(
                "unsupported URL scheme {other} in {base_url}"
            )))
        }
    };

    Ok(Endpoint { secure, host, port })
}

fn has_explicit_port(raw: &str) -> bool {
    let rest = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority
        .rsplit_once('@')
        .map(|(_, host_port)| host_port)
        .unwrap_or(authority);
    match host_port.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Only GET and POST responses are parsed as JSON documents
fn expects_body(method: &Method) -> bool {
    *method == Method::GET || *method == Method::POST
}

/// Shared builder: modern TLS only, no redirects
pub(crate) fn build_http_client(verify_tls: bool) -> Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
    if !verify_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }
    Ok(builder.build()?)
}

/// REST API client bound to one base URL
pub struct RestClient {
    base_url: String,
    endpoint: Endpoint,
    client: Client,
    /// Default headers, keyed by lowercase name
    headers: BTreeMap<String, String>,
    bearer: Option<Arc<AuthTokenProvider>>,
}

impl RestClient {
    /// Create a client for `base_url`; `verify_tls = false` accepts any server certificate
    pub fn new(base_url: &str, verify_tls: bool) -> Result<Self> {
        let endpoint = resolve_endpoint(base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint,
            client: build_http_client(verify_tls)?,
            headers: BTreeMap::new(),
            bearer: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Add a header sent with every subsequent call
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
    }

    /// Authenticate subsequent calls with Basic auth
    pub fn set_basic(&mut self, user: &str, password: &str) {
        self.bearer = None;
        self.add_header(AUTHORIZATION.as_str(), &basic_auth_header(user, password));
    }

    /// Use a JWT-bearer token provider; takes effect with `set_default_scope`
    pub fn set_bearer(&mut self, provider: Arc<AuthTokenProvider>) {
        self.bearer = Some(provider);
    }

    /// Issue a bearer token for `scope` and install it as the default `Authorization` header.
    ///
    /// A fresh token is requested on every call; nothing is cached.
    pub async fn set_default_scope(&mut self, scope: Option<&str>) -> Result<()> {
        let provider = self
            .bearer
            .clone()
            .ok_or_else(|| Error::Config("bearer authentication is not configured".to_string()))?;
        let token = provider.issue_token(scope).await?;
        self.add_header(AUTHORIZATION.as_str(), token.as_str());
        Ok(())
    }

    fn endpoint_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn header_map(&self, extra: &[(&str, &str)]) -> Result<HeaderMap> {
        let mut merged = self.headers.clone();
        for (name, value) in extra {
            merged.insert(name.to_ascii_lowercase(), value.to_string());
        }

        let mut map = HeaderMap::new();
        for (name, value) in merged {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {name}: {e}")))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|e| Error::Config(format!("invalid value for header {name}: {e}")))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    /// Execute one request and return the parsed JSON response.
    ///
    /// Returns `None` for methods other than GET/POST, and for empty bodies.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Body>,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Option<Value>> {
        let url = self.endpoint_url(path);
        let wants_body = expects_body(&method);
        debug!(method = %method, url = %url, "Sending HTTP request");

        let mut request = self.client.request(method, &url);
        if wants_body {
            request = request.header(ACCEPT, MIME_JSON);
        }
        request = request.headers(self.header_map(headers)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        request = match body {
            Some(Body::Json(value)) => request.json(value),
            Some(Body::Form(fields)) => request.form(fields),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "HTTP request failed");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        if !wants_body {
            return Ok(None);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// CRUD: Create
    pub async fn create(&self, path: &str, value: &Value) -> Result<Value> {
        let body = Body::Json(value.clone());
        Ok(self
            .send(Method::POST, path, Some(&body), &[], &[])
            .await?
            .unwrap_or(Value::Null))
    }

    /// CRUD: Read
    pub async fn read(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        Ok(self
            .send(Method::GET, path, None, query, &[])
            .await?
            .unwrap_or(Value::Null))
    }

    /// CRUD: Update
    pub async fn update(&self, path: &str, value: &Value) -> Result<()> {
        let body = Body::Json(value.clone());
        self.send(Method::PUT, path, Some(&body), &[], &[]).await?;
        Ok(())
    }

    /// CRUD: Delete
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, None, &[], &[]).await?;
        Ok(())
    }
}
