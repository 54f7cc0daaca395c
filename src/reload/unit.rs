//! Versioned artifact slot for one tracked module.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::module::RouteModule;

/// A module the reload engine keeps fresh.
///
/// Holds the current artifact and the one it replaced. The version starts
/// at 1 on first load and increments on every successful reload.
#[derive(Debug, Clone)]
pub struct TrackedUnit {
    pub path: PathBuf,
    current: Arc<RouteModule>,
    previous: Option<Arc<RouteModule>>,
    version: u64,
    /// File modification time observed at the last successful load.
    pub modified: Option<SystemTime>,
    /// Direct dependencies at the last successful load.
    pub dependencies: Vec<PathBuf>,
}

impl TrackedUnit {
    pub fn new(module: RouteModule, modified: Option<SystemTime>) -> Self {
        Self {
            path: module.path.clone(),
            dependencies: module.imports.clone(),
            current: Arc::new(module),
            previous: None,
            version: 1,
            modified,
        }
    }

    /// Replace the current artifact, shifting it into `previous`.
    pub fn publish(&mut self, module: RouteModule, modified: Option<SystemTime>) -> Arc<RouteModule> {
        let next = Arc::new(module);
        self.dependencies = next.imports.clone();
        self.previous = Some(std::mem::replace(&mut self.current, next.clone()));
        self.version += 1;
        self.modified = modified;
        next
    }

    pub fn current(&self) -> &Arc<RouteModule> {
        &self.current
    }

    pub fn previous(&self) -> Option<&Arc<RouteModule>> {
        self.previous.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
