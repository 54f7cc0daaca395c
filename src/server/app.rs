//! The per-instance request handler.
//!
//! An [`Application`] owns the instance's route table behind an
//! [`ArcSwap`]. Requests load the current table once and keep it for their
//! whole lifetime; reloads and `add_route` publish a new table without
//! blocking in-flight requests.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use percent_encoding::percent_decode_str;
use tiny_http::Request;

use super::response::{
    respond, respond_file, respond_method_not_allowed, respond_not_found, respond_unavailable,
};
use super::static_files;
use crate::log;
use crate::route::{BoundRoute, Method, RequestContext, ResponseContext, RouteTable};

pub struct Application {
    routes: ArcSwap<RouteTable>,
    views: Option<PathBuf>,
    public: Vec<PathBuf>,
}

impl Application {
    pub fn new(table: RouteTable, views: Option<PathBuf>, public: Vec<PathBuf>) -> Self {
        Self {
            routes: ArcSwap::from_pointee(table),
            views,
            public,
        }
    }

    /// Snapshot of the current table.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    /// Swap in new source routes, keeping routes added at runtime.
    pub fn replace_source(&self, source: Vec<BoundRoute>) {
        self.routes.rcu(|table| table.replace_source(source.clone()));
    }

    pub fn push(&self, route: BoundRoute) {
        self.routes.rcu(|table| table.with_added(route.clone()));
    }

    pub fn views(&self) -> Option<&Path> {
        self.views.as_deref()
    }

    pub fn public(&self) -> &[PathBuf] {
        &self.public
    }

    /// Serve one request: routes first, then static directories.
    pub fn handle(&self, mut request: Request) -> io::Result<()> {
        // Early exit if shutdown requested
        if crate::core::is_shutdown() {
            return respond_unavailable(request);
        }

        let Some(method) = Method::from_http(request.method()) else {
            return respond_method_not_allowed(request);
        };

        let url = request.url().to_string();
        let (raw_path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (url.as_str(), None),
        };

        let table = self.routes();
        if let Some((route, params)) = table.dispatch(method, raw_path) {
            let mut body = Vec::new();
            request.as_reader().read_to_end(&mut body)?;

            let ctx = RequestContext {
                method,
                path: percent_decode_str(raw_path).decode_utf8_lossy().into_owned(),
                query,
                params,
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect(),
                body,
            };

            let response = invoke(route, &ctx);
            return respond(request, response);
        }

        if matches!(method, Method::Get | Method::Head) {
            for dir in &self.public {
                if let Some(file) = static_files::resolve(raw_path, dir) {
                    return respond_file(request, &file);
                }
            }
        }

        respond_not_found(request)
    }
}

/// Run a route's endpoint, turning a panic into a 500.
fn invoke(route: &BoundRoute, ctx: &RequestContext) -> ResponseContext {
    panic::catch_unwind(AssertUnwindSafe(|| route.endpoint.call(ctx))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log!("error"; "{} {} handler panicked: {}", ctx.method, ctx.path, reason);
        ResponseContext::text("500 Internal Server Error").with_status(500)
    })
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("routes", &self.routes.load().len())
            .field("views", &self.views)
            .field("public", &self.public)
            .finish()
    }
}
