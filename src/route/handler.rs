//! Request/response contexts and the invocable shapes bound to routes.
//!
//! ```text
//! Handler    = Static(StaticResponse) | Func(RequestContext → ResponseContext)
//! Middleware = (RequestContext, Next) → ResponseContext
//! Endpoint   = Direct(Handler) | Layered { middleware, handler }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Method, Params};
use crate::utils::mime::{self, types};

// =============================================================================
// Contexts
// =============================================================================

/// What a handler sees of an incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Percent-decoded path without query string.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub params: Params,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            params: Params::default(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// What a handler produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseContext {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("Content-Type", types::PLAIN)
            .with_body(body.into().into_bytes())
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("Content-Type", types::HTML)
            .with_body(body.into().into_bytes())
    }

    /// Serialize `value` as JSON. Serialization failures become a 500.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(200)
                .with_header("Content-Type", types::JSON)
                .with_body(body),
            Err(e) => Self::text(format!("failed to encode response: {e}")).with_status(500),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set a header, replacing an existing one with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

// =============================================================================
// Static responses
// =============================================================================

/// A response declared in a route module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticResponse {
    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Serve this file instead of `body`. Relative paths resolve against
    /// the instance's view directory when the route is bound.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_status() -> u16 {
    200
}

impl StaticResponse {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: None,
            headers: BTreeMap::new(),
            file: None,
        }
    }

    pub fn has_valid_status(&self) -> bool {
        (100..=599).contains(&self.status)
    }

    /// Copy with `file` made absolute against `views`.
    pub fn resolved(&self, views: Option<&Path>) -> Self {
        let mut resolved = self.clone();
        if let (Some(file), Some(views)) = (&self.file, views)
            && file.is_relative()
        {
            resolved.file = Some(views.join(file));
        }
        resolved
    }

    pub fn render(&self) -> ResponseContext {
        let (body, guessed) = match &self.file {
            Some(file) => match std::fs::read(file) {
                Ok(bytes) => (bytes, mime::from_path(file)),
                Err(e) => {
                    crate::log!("serve"; "cannot read view {}: {}", file.display(), e);
                    return ResponseContext::text("500 Internal Server Error").with_status(500);
                }
            },
            None => (self.body.clone().into_bytes(), types::PLAIN),
        };

        let mut response = ResponseContext::new(self.status)
            .with_header("Content-Type", self.content_type.as_deref().unwrap_or(guessed))
            .with_body(body);
        for (name, value) in &self.headers {
            response = response.with_header(name.as_str(), value.as_str());
        }
        response
    }
}

// =============================================================================
// Invocables
// =============================================================================

pub type HandlerFn = dyn Fn(&RequestContext) -> ResponseContext + Send + Sync;
pub type MiddlewareFn = dyn Fn(&RequestContext, Next<'_>) -> ResponseContext + Send + Sync;

/// Terminal request handler.
#[derive(Clone)]
pub enum Handler {
    Static(Arc<StaticResponse>),
    Func(Arc<HandlerFn>),
}

impl Handler {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> ResponseContext + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    /// Static `200 text/plain` response.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Static(Arc::new(StaticResponse::text(body)))
    }

    pub fn call(&self, request: &RequestContext) -> ResponseContext {
        match self {
            Self::Static(response) => response.render(),
            Self::Func(f) => f(request),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(response) => f.debug_tuple("Static").field(&response.status).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Wraps the rest of the chain; call [`Next::run`] to continue.
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareFn>);

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, Next<'_>) -> ResponseContext + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware(..)")
    }
}

/// The remainder of a middleware chain.
pub struct Next<'a> {
    rest: &'a [Middleware],
    handler: &'a Handler,
}

impl Next<'_> {
    pub fn run(self, request: &RequestContext) -> ResponseContext {
        match self.rest.split_first() {
            Some((middleware, rest)) => (middleware.0)(
                request,
                Next {
                    rest,
                    handler: self.handler,
                },
            ),
            None => self.handler.call(request),
        }
    }
}

/// A handler in its bound form.
#[derive(Clone)]
pub enum Endpoint {
    Direct(Handler),
    Layered {
        middleware: Vec<Middleware>,
        handler: Handler,
    },
}

impl Endpoint {
    pub fn new(handler: Handler, middleware: Vec<Middleware>) -> Self {
        if middleware.is_empty() {
            Self::Direct(handler)
        } else {
            Self::Layered {
                middleware,
                handler,
            }
        }
    }

    pub fn call(&self, request: &RequestContext) -> ResponseContext {
        match self {
            Self::Direct(handler) => handler.call(request),
            Self::Layered {
                middleware,
                handler,
            } => Next {
                rest: middleware,
                handler,
            }
            .run(request),
        }
    }

    pub fn middleware_count(&self) -> usize {
        match self {
            Self::Direct(_) => 0,
            Self::Layered { middleware, .. } => middleware.len(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(handler) => f.debug_tuple("Direct").field(handler).finish(),
            Self::Layered {
                middleware,
                handler,
            } => f
                .debug_struct("Layered")
                .field("middleware", &middleware.len())
                .field("handler", handler)
                .finish(),
        }
    }
}
