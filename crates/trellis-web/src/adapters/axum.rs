use crate::compiler::{TrellisEngine, content_type_for};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use trellis_core::{Node, Store};

/// What a request handler supplies per page request: the tree to render and
/// the data to render it against. Both are request-scoped and dropped with
/// the response.
pub struct ServeContext {
    pub root: Node,
    pub store: Store,
}

#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

pub type RequestHandler =
    Arc<dyn Fn(&PageRequest) -> Result<ServeContext, String> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct AxumTrellisAdapter {
    engine: Arc<Mutex<TrellisEngine>>,
    handler: Option<RequestHandler>,
}

impl AxumTrellisAdapter {
    pub fn new(engine: Arc<Mutex<TrellisEngine>>) -> Self {
        Self {
            engine,
            handler: None,
        }
    }

    pub fn with_request_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PageRequest) -> Result<ServeContext, String> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Renders the page route. Without a handler there is nothing to
    /// render; handler and compile failures abort the request visibly.
    pub fn render_request(&self, method: &str, path: &str, headers: &HeaderMap) -> Response {
        let Some(handler) = &self.handler else {
            return (StatusCode::NOT_FOUND, "not found").into_response();
        };

        let request = PageRequest {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            headers: headers_to_map(headers),
        };

        let context = match handler(&request) {
            Ok(v) => v,
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("request handler failed: {e}"),
                )
                    .into_response();
            }
        };

        let mut engine = match self.engine.lock() {
            Ok(v) => v,
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to lock trellis engine",
                )
                    .into_response();
            }
        };

        match engine.compile(&context.root, &context.store) {
            Ok(html) => Html(html).into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("page compile failed: {e}"),
            )
                .into_response(),
        }
    }

    /// Serves a generated bundle exactly once. A miss (expired, consumed,
    /// or never stored) is a plain 404.
    pub fn serve_asset(&self, key: &str) -> Response {
        let mut engine = match self.engine.lock() {
            Ok(v) => v,
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to lock trellis engine",
                )
                    .into_response();
            }
        };

        match engine.serve_content(key) {
            Some(body) => {
                let mut response = body.into_response();
                if let Ok(value) = HeaderValue::from_str(content_type_for(key)) {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                response
            }
            None => (StatusCode::NOT_FOUND, "not found").into_response(),
        }
    }
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            out.insert(name.as_str().to_string(), v.to_string());
        }
    }
    out
}
