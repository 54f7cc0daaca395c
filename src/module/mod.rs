//! Route modules: the reloadable unit of route definitions.
//!
//! A module is always loaded fresh from disk. Imports that the reload
//! engine already tracks are taken from its current artifact; anything else
//! is loaded recursively.

mod load;
mod schema;

pub use load::{LoadContext, load};
pub use schema::{ExportSpec, Imports, ModuleFile, RouteSpec};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::route::StaticResponse;

/// A validated, immutable route module.
#[derive(Debug, Clone)]
pub struct RouteModule {
    pub path: PathBuf,
    /// Content fingerprint of the source text.
    pub fingerprint: String,
    /// Resolved imports, in declaration order.
    pub imports: Vec<PathBuf>,
    /// Handlers visible to this module: imports first, own definitions on top.
    pub handlers: FxHashMap<String, Arc<StaticResponse>>,
    pub routes: Vec<RouteSpec>,
    pub exports: BTreeMap<String, Vec<RouteSpec>>,
}

impl RouteModule {
    /// Routes of the default export, or of the named one.
    pub fn routes_for(&self, launch: Option<&str>) -> Option<&[RouteSpec]> {
        match launch {
            None => Some(&self.routes),
            Some(name) => self.exports.get(name).map(Vec::as_slice),
        }
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<StaticResponse>> {
        self.handlers.get(name)
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    /// Default and named exports together.
    pub(crate) fn all_routes(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter().chain(self.exports.values().flatten())
    }
}
