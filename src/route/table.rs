//! Immutable route tables.
//!
//! A table is never mutated in place: every change builds a new table that
//! the application swaps in, so a request keeps the table it started with.

use serde::Serialize;

use super::handler::Endpoint;
use super::{Method, Params, RoutePattern};

/// Where a bound route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteOrigin {
    /// The instance's route source (inline list or route file).
    Source,
    /// `add_route` on a live instance.
    Added,
}

#[derive(Debug, Clone)]
pub struct BoundRoute {
    pub method: Method,
    pub pattern: RoutePattern,
    pub endpoint: Endpoint,
    pub origin: RouteOrigin,
}

/// Serializable view of one bound route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
    pub origin: RouteOrigin,
    pub middleware: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<BoundRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<BoundRoute>) -> Self {
        Self { routes }
    }

    /// New table with the source routes replaced. Added routes are kept,
    /// after the new source routes.
    pub fn replace_source(&self, source: Vec<BoundRoute>) -> Self {
        let added = self
            .routes
            .iter()
            .filter(|r| r.origin == RouteOrigin::Added)
            .cloned();
        Self {
            routes: source.into_iter().chain(added).collect(),
        }
    }

    /// New table with `route` appended.
    pub fn with_added(&self, route: BoundRoute) -> Self {
        let mut routes = self.routes.clone();
        routes.push(route);
        Self { routes }
    }

    /// First route in table order that serves `method` at `path`.
    pub fn dispatch(&self, method: Method, path: &str) -> Option<(&BoundRoute, Params)> {
        self.routes
            .iter()
            .filter(|route| route.method.matches(method))
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }

    pub fn info(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|r| RouteInfo {
                method: r.method,
                path: r.pattern.as_str().to_string(),
                origin: r.origin,
                middleware: r.endpoint.middleware_count(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
