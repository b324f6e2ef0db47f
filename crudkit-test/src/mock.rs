use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// A request received by a [`MockBackend`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string, still percent-encoded.
    pub query: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Decoded query pairs, in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// First decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Every decoded value of a repeated query parameter.
    pub fn query_params(&self, name: &str) -> Vec<String> {
        self.query_pairs()
            .into_iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl MockResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, axum::Json(body)).into_response(),
            None => self.status.into_response(),
        };
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), VecDeque<MockResponse>>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process HTTP backend for adapter tests.
///
/// Binds an `axum` server to `127.0.0.1:0`, records every request and
/// replies with responses scripted per `(method, path)`. Responses queued for
/// a route are served in order; the last one keeps being served. Unscripted
/// routes get a `404` with a JSON error body.
///
/// The server stops when the `MockBackend` is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: Shared,
    shutdown: CancellationToken,
}

impl MockBackend {
    pub async fn start() -> std::io::Result<Self> {
        let state: Shared = Arc::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = Router::new().fallback(handle).with_state(state.clone());
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await;
            if let Err(err) = served {
                tracing::warn!(error = %err, "mock backend stopped");
            }
        });
        Ok(Self {
            addr,
            state,
            shutdown,
        })
    }

    /// Base URL, without trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a response for `method path` (path without query string).
    pub fn respond(&self, method: &str, path: &str, response: MockResponse) -> &Self {
        let method = Method::from_bytes(method.as_bytes()).unwrap_or(Method::GET);
        lock(&self.state)
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.state).requests.last().cloned()
    }

    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.routes.clear();
        state.requests.clear();
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };
    let path = uri.path().to_string();
    let mut state = lock(&state);
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        headers,
        body,
    });
    let scripted = state.routes.get_mut(&(method.clone(), path.clone())).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });
    match scripted {
        Some(response) => response.into_response(),
        None => MockResponse::json(serde_json::json!({
            "error": format!("no scripted response for {method} {path}")
        }))
        .with_status(404)
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn serves_scripted_responses_in_order() {
        let backend = MockBackend::start().await.unwrap();
        backend
            .respond("GET", "/posts", MockResponse::json(json!([1])))
            .respond(
                "GET",
                "/posts",
                MockResponse::json(json!([2])).with_header("X-Total-Count", 9),
            );

        let client = reqwest::Client::new();
        let url = format!("{}/posts?_page=1&tag=a&tag=b", backend.url());
        let first: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        let second = client.get(&url).send().await.unwrap();
        assert_eq!(second.headers()["x-total-count"], "9");
        let second: Value = second.json().await.unwrap();
        let third: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!((first, second, third), (json!([1]), json!([2]), json!([2])));

        let request = backend.last_request().unwrap();
        assert_eq!(request.query_param("_page").as_deref(), Some("1"));
        assert_eq!(request.query_params("tag"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unscripted_route_is_404_and_recorded() {
        let backend = MockBackend::start().await.unwrap();
        let response = reqwest::Client::new()
            .post(format!("{}/nothing", backend.url()))
            .json(&json!({"a": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        let request = backend.last_request().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"a": 1})));
    }
}
