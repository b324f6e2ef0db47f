//! Shared HTTP plumbing for the adapters: connection settings, auth,
//! URL building and status → [`DataError`] mapping.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crudkit_data::{BackendError, DataError, ListResult, Operation, Pagination, Record, RecordId, ResourceMap};

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Credentials attached to every request.
///
/// ```yaml
/// auth: { type: bearer, token: "${API_TOKEN}" }
/// auth: { type: api_key, header: X-Api-Key, value: "${API_KEY}" }
/// auth: { type: basic, username: admin, password: "${API_PASSWORD}" }
/// ```
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    Bearer {
        token: String,
    },
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header: String,
        value: String,
    },
    Basic {
        username: String,
        #[serde(default)]
        password: Option<String>,
    },
}

impl Auth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer { token: token.into() }
    }

    pub fn api_key(header: impl Into<String>, value: impl Into<String>) -> Self {
        Auth::ApiKey {
            header: header.into(),
            value: value.into(),
        }
    }

    pub fn basic(username: impl Into<String>, password: Option<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password,
        }
    }

    fn validate(&self, provider: &str) -> Result<(), DataError> {
        let missing = match self {
            Auth::Bearer { token } if token.is_empty() => Some("auth.token"),
            Auth::ApiKey { header, .. } if HeaderName::try_from(header.as_str()).is_err() => {
                Some("auth.header")
            }
            Auth::ApiKey { value, .. } if value.is_empty() => Some("auth.value"),
            Auth::Basic { username, .. } if username.is_empty() => Some("auth.username"),
            _ => None,
        };
        match missing {
            Some(field) => Err(DataError::InvalidConfig(format!(
                "{provider}: {field} is empty or invalid"
            ))),
            None => Ok(()),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Bearer { .. } => f.write_str("Bearer(***)"),
            Auth::ApiKey { header, .. } => write!(f, "ApiKey({header}: ***)"),
            Auth::Basic { username, .. } => write!(f, "Basic({username}:***)"),
        }
    }
}

/// Connection settings shared by every HTTP adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub base_url: String,
    #[serde(default)]
    pub auth: Option<Auth>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub resources: ResourceMap,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            headers: HashMap::new(),
            timeout_ms: default_timeout_ms(),
            resources: ResourceMap::default(),
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_resources(mut self, resources: ResourceMap) -> Self {
        self.resources = resources;
        self
    }

    pub fn validate(&self, provider: &str) -> Result<(), DataError> {
        parse_base_url(provider, &self.base_url)?;
        header_map(provider, &self.headers)?;
        if self.timeout_ms == 0 {
            return Err(DataError::InvalidConfig(format!(
                "{provider}: timeout_ms must be positive"
            )));
        }
        if let Some(auth) = &self.auth {
            auth.validate(provider)?;
        }
        Ok(())
    }
}

fn parse_base_url(provider: &str, raw: &str) -> Result<Url, DataError> {
    let url = Url::parse(raw)
        .map_err(|e| DataError::InvalidConfig(format!("{provider}: invalid base_url '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(DataError::InvalidConfig(format!(
            "{provider}: base_url '{raw}' must be an http(s) URL"
        )));
    }
    Ok(url)
}

fn header_map(provider: &str, headers: &HashMap<String, String>) -> Result<HeaderMap, DataError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|_| DataError::InvalidConfig(format!("{provider}: invalid header name '{name}'")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|_| DataError::InvalidConfig(format!("{provider}: invalid value for header '{name}'")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Context of one outbound call, used for logging and error reporting.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub operation: Operation,
    pub resource: &'a str,
    pub id: Option<&'a RecordId>,
}

impl<'a> Call<'a> {
    pub fn new(operation: Operation, resource: &'a str) -> Self {
        Self {
            operation,
            resource,
            id: None,
        }
    }

    pub fn with_id(mut self, id: &'a RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn error(&self, provider: &'static str, message: impl Into<String>) -> BackendError {
        BackendError::new(provider, self.operation, self.resource, message).with_id(self.id.cloned())
    }
}

/// A decoded response. An empty body decodes to `Value::Null`.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// `reqwest::Client` bound to one backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    provider: &'static str,
    client: reqwest::Client,
    base_url: Url,
    auth: Option<Auth>,
    headers: HeaderMap,
    resources: ResourceMap,
}

impl HttpClient {
    pub fn new(provider: &'static str, config: &HttpConfig) -> Result<Self, DataError> {
        config.validate(provider)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DataError::InvalidConfig(format!("{provider}: cannot build HTTP client: {e}")))?;
        Ok(Self {
            provider,
            client,
            base_url: parse_base_url(provider, &config.base_url)?,
            auth: config.auth.clone(),
            headers: header_map(provider, &config.headers)?,
            resources: config.resources.clone(),
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Backend name of a logical resource, usable as a path segment.
    pub fn resolve<'a>(&'a self, resource: &'a str) -> Result<&'a str, DataError> {
        self.resources.resolve_path_segment(self.provider, resource)
    }

    /// Append `path` to the base URL, then `id` as one percent-encoded segment.
    ///
    /// Each path part may hold several `/`-separated segments, so a resource
    /// mapped to `crm/contacts` addresses a nested endpoint.
    pub fn endpoint(&self, path: &[&str], id: Option<&RecordId>) -> Result<Url, DataError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                DataError::InvalidConfig(format!("{}: base_url cannot have a path", self.provider))
            })?;
            segments.pop_if_empty();
            segments.extend(path.iter().flat_map(|part| part.split('/')).filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        Ok(url)
    }

    /// Start a request carrying the configured headers and credentials.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url).headers(self.headers.clone());
        match &self.auth {
            Some(Auth::Bearer { token }) => builder.bearer_auth(token),
            Some(Auth::ApiKey { header, value }) => builder.header(header.as_str(), value.as_str()),
            Some(Auth::Basic { username, password }) => builder.basic_auth(username, password.as_ref()),
            None => builder,
        }
    }

    /// Send `request` and decode the JSON body.
    ///
    /// A 404 on a call that targets a record is [`DataError::NotFound`];
    /// every other non-2xx status is a [`BackendError`] carrying the status
    /// and the backend's message.
    pub async fn send(&self, call: Call<'_>, request: RequestBuilder) -> Result<HttpResponse, DataError> {
        let request = request
            .build()
            .map_err(|e| DataError::InvalidParams(format!("{}: cannot build request: {e}", self.provider)))?;
        debug!(
            provider = self.provider,
            resource = call.resource,
            operation = %call.operation,
            method = %request.method(),
            "sending request"
        );
        trace!(provider = self.provider, url = %request.url(), "request url");

        let response = self.client.execute(request).await.map_err(|e| {
            let message = format!("request failed: {e}");
            DataError::from(call.error(self.provider, message).with_source(e))
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| {
            let message = format!("failed to read response body: {e}");
            DataError::from(call.error(self.provider, message).with_source(e))
        })?;

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = call.id {
                return Err(DataError::not_found(call.resource, id.clone()));
            }
        }
        if !status.is_success() {
            let message = error_message(&bytes)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(call.error(self.provider, message).with_status(status.as_u16()).into());
        }

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                let message = format!("response is not valid JSON: {e}");
                DataError::from(
                    call.error(self.provider, message)
                        .with_status(status.as_u16())
                        .with_source(e),
                )
            })?
        };
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Best-effort extraction of a backend's error message.
fn error_message(bytes: &[u8]) -> Option<String> {
    if let Ok(body) = serde_json::from_slice::<Value>(bytes) {
        let candidates = [
            body.pointer("/error/message"),
            body.pointer("/message"),
            body.pointer("/error"),
            body.pointer("/errors/0/message"),
        ];
        if let Some(text) = candidates.into_iter().flatten().find_map(Value::as_str) {
            return Some(text.to_string());
        }
    }
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(200).collect())
    }
}

/// Query-string form of a scalar filter value.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decode a JSON object from a response into a record.
pub(crate) fn expect_record(provider: &'static str, call: Call<'_>, value: Value) -> Result<Record, DataError> {
    match value {
        Value::Object(map) => Ok(Record::from_map(map)),
        other => Err(call
            .error(provider, format!("expected a JSON object, got {}", kind_of(&other)))
            .into()),
    }
}

/// Like [`expect_record`], for records that must come back with an `id`.
pub(crate) fn expect_identified(
    provider: &'static str,
    call: Call<'_>,
    value: Value,
) -> Result<Record, DataError> {
    let record = expect_record(provider, call, value)?;
    match record.id() {
        Some(_) => Ok(record),
        None => Err(call.error(provider, "response has no id").into()),
    }
}

/// Page result for a backend that reports no total.
///
/// A full page suggests more rows follow, so the estimate doubles what came
/// back; a short page is taken as the end of the collection.
pub(crate) fn estimate_page(data: Vec<Record>, page: Pagination) -> ListResult {
    let returned = data.len() as u64;
    let ahead = if returned >= page.per_page { returned } else { 0 };
    let total = page.offset().saturating_add(returned).saturating_add(ahead);
    ListResult::estimated(data, total)
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let client = HttpClient::new("rest", &HttpConfig::new("http://localhost:3000/api/")).unwrap();
        let url = client.endpoint(&["crm/orders"], Some(&RecordId::from("a/b"))).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/crm/orders/a%2Fb");
    }

    #[test]
    fn config_validation() {
        assert!(HttpConfig::new("ftp://host").validate("rest").is_err());
        assert!(HttpConfig::new("not a url").validate("rest").is_err());
        assert!(HttpConfig::new("http://host")
            .with_auth(Auth::bearer(""))
            .validate("rest")
            .is_err());
        assert!(HttpConfig::new("http://host")
            .with_header("bad header", "x")
            .validate("rest")
            .is_err());
        assert!(HttpConfig::new("https://host")
            .with_auth(Auth::api_key("X-Key", "secret"))
            .validate("rest")
            .is_ok());
    }

    #[test]
    fn auth_from_yaml_shape_and_redacted_debug() {
        let auth: Auth = serde_json::from_value(json!({ "type": "api_key", "value": "s3cret" })).unwrap();
        assert_eq!(format!("{auth:?}"), "ApiKey(X-API-Key: ***)");
        let auth: Auth = serde_json::from_value(json!({ "type": "bearer", "token": "abc123" })).unwrap();
        assert_eq!(format!("{auth:?}"), "Bearer(***)");
    }

    #[test]
    fn error_messages_are_extracted() {
        assert_eq!(
            error_message(br#"{"error":{"status":400,"message":"name is required"}}"#).as_deref(),
            Some("name is required")
        );
        assert_eq!(error_message(br#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message(br#"{"errors":[{"message":"bad"}]}"#).as_deref(), Some("bad"));
        assert_eq!(error_message(b"plain failure").as_deref(), Some("plain failure"));
        assert_eq!(error_message(b""), None);
    }
}
