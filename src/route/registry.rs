//! Host-registered native handlers and middleware, looked up by name.
//!
//! Route modules can only describe static responses; anything that needs
//! real code is registered here by the host and referenced from the module.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::handler::{Handler, Middleware, RequestContext, ResponseContext};
use super::Method;

/// Shared name → invocable table. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<FxHashMap<String, Handler>>>,
    middleware: Arc<RwLock<FxHashMap<String, Middleware>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `cors`, `no-cache` and `log` middleware.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_middleware("cors", Middleware::new(cors));
        registry.register_middleware("no-cache", Middleware::new(no_cache));
        registry.register_middleware("log", Middleware::new(log_request));
        registry
    }

    /// Register (or replace) a handler. Returns `true` if the name was new.
    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) -> bool {
        self.handlers.write().insert(name.into(), handler).is_none()
    }

    /// Register (or replace) a middleware. Returns `true` if the name was new.
    pub fn register_middleware(&self, name: impl Into<String>, middleware: Middleware) -> bool {
        self.middleware
            .write()
            .insert(name.into(), middleware)
            .is_none()
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.read().get(name).cloned()
    }

    pub fn middleware(&self, name: &str) -> Option<Middleware> {
        self.middleware.read().get(name).cloned()
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn has_middleware(&self, name: &str) -> bool {
        self.middleware.read().contains_key(name)
    }
}

// =============================================================================
// Built-in middleware
// =============================================================================

fn cors(request: &RequestContext, next: super::Next<'_>) -> ResponseContext {
    if request.method == Method::Options {
        return ResponseContext::new(204)
            .with_header("Access-Control-Allow-Origin", "*")
            .with_header(
                "Access-Control-Allow-Methods",
                "GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS",
            )
            .with_header(
                "Access-Control-Allow-Headers",
                request
                    .header("Access-Control-Request-Headers")
                    .unwrap_or("*"),
            );
    }
    next.run(request)
        .with_header("Access-Control-Allow-Origin", "*")
}

fn no_cache(request: &RequestContext, next: super::Next<'_>) -> ResponseContext {
    next.run(request)
        .with_header("Cache-Control", "no-cache, no-store, must-revalidate")
}

fn log_request(request: &RequestContext, next: super::Next<'_>) -> ResponseContext {
    let response = next.run(request);
    crate::log!("serve"; "{} {} -> {}", request.method, request.path, response.status);
    response
}
