//! Reload engine.
//!
//! Owns every tracked route module and the dependency graph between them.
//!
//! ```text
//! change(path) → refresh graph → affected set → topological order
//!              → reload each (publish on success, keep last good on failure)
//!              → deliver new artifact to subscribers
//! ```
//!
//! # Modules
//!
//! - `unit` - versioned artifact slot per module
//! - `order` - dependency-first ordering of an affected set
//! - `slot` - per-path in-flight coalescing used by the watcher

mod order;
mod slot;
mod unit;


pub use order::reload_order;
pub use slot::{Admission, Completion, ReloadSlots};
pub use unit::TrackedUnit;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::config::ReloadConfig;
use crate::deps::{DependencyGraph, DependencyTracker};
use crate::error::{ServeError, chain};
use crate::module::{self, LoadContext, RouteModule};
use crate::route::HandlerRegistry;
use crate::utils::normalize_path;
use crate::{debug, log, logger};

/// Receives the new artifact after a successful reload.
pub type ReloadCallback = Arc<dyn Fn(&Arc<RouteModule>) -> Result<(), ServeError> + Send + Sync>;

/// Receives every reload or callback failure.
pub type ErrorCallback = Arc<dyn Fn(&Path, &ServeError) + Send + Sync>;

/// Default error sink: the watch status block.
pub fn log_errors() -> ErrorCallback {
    Arc::new(|path, err| {
        logger::status_error(&format!("reload failed: {}", path.display()), &chain(err));
    })
}

struct Subscriber {
    owner: String,
    callback: ReloadCallback,
}

/// Outcome of one change propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub changed: PathBuf,
    /// Modules in the order they were reloaded.
    pub order: Vec<PathBuf>,
    pub reloaded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl ReloadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Shared handle; clones refer to the same engine.
#[derive(Clone)]
pub struct ReloadEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: ReloadConfig,
    tracker: DependencyTracker,
    registry: HandlerRegistry,
    units: RwLock<FxHashMap<PathBuf, TrackedUnit>>,
    graph: RwLock<DependencyGraph>,
    subscribers: Mutex<FxHashMap<PathBuf, Vec<Subscriber>>>,
    on_error: ErrorCallback,
}

impl ReloadEngine {
    pub fn new(config: ReloadConfig, registry: HandlerRegistry, on_error: ErrorCallback) -> Self {
        Self {
            inner: Arc::new(Inner {
                tracker: DependencyTracker::new(&config),
                config,
                registry,
                units: RwLock::new(FxHashMap::default()),
                graph: RwLock::new(DependencyGraph::new()),
                subscribers: Mutex::new(FxHashMap::default()),
                on_error,
            }),
        }
    }

    pub fn config(&self) -> &ReloadConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// First load of a module: validates the path, loads it and seeds the
    /// dependency graph.
    ///
    /// An already tracked module is re-read; a changed fingerprint is
    /// published as a new version.
    pub fn preload(&self, path: &Path) -> Result<Arc<RouteModule>, ServeError> {
        let path = normalize_path(path);
        if !path.is_file() {
            return Err(ServeError::file_not_found(&path));
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !self.inner.config.accepts_extension(ext) {
            return Err(ServeError::Validation(format!(
                "`{}` is not a route module (expected .{})",
                path.display(),
                self.inner.config.extensions.join(", .")
            )));
        }

        let module = self.execute(&path)?;
        let modified = modified_time(&path);
        let current = {
            let mut units = self.inner.units.write();
            match units.get_mut(&path) {
                Some(unit) if unit.current().fingerprint == module.fingerprint => {
                    unit.current().clone()
                }
                Some(unit) => unit.publish(module, modified),
                None => {
                    let unit = TrackedUnit::new(module, modified);
                    let current = unit.current().clone();
                    units.insert(path.clone(), unit);
                    current
                }
            }
        };

        self.refresh_graph(&path);
        debug!("reload"; "preloaded {} ({})", path.display(), current.fingerprint);
        Ok(current)
    }

    /// Re-execute a module from disk.
    ///
    /// Success publishes the new artifact. Failure leaves the unit untouched
    /// and is reported through the error callback once.
    pub fn reload(&self, path: &Path) -> Result<Arc<RouteModule>, ServeError> {
        let path = normalize_path(path);
        let module = match self.execute(&path) {
            Ok(module) => module,
            Err(err) => {
                (self.inner.on_error)(&path, &err);
                return Err(err);
            }
        };

        let modified = modified_time(&path);
        let mut units = self.inner.units.write();
        let published = match units.get_mut(&path) {
            Some(unit) => unit.publish(module, modified),
            None => {
                let unit = TrackedUnit::new(module, modified);
                let current = unit.current().clone();
                units.insert(path, unit);
                current
            }
        };
        Ok(published)
    }

    fn execute(&self, path: &Path) -> Result<RouteModule, ServeError> {
        let tracked = |p: &Path| self.current(p);
        let cx = LoadContext {
            resolver: self.inner.tracker.resolver(),
            registry: &self.inner.registry,
            tracked: &tracked,
        };
        module::load(path, &cx).map_err(|source| ServeError::Load {
            path: path.to_path_buf(),
            source,
        })
    }

    // -------------------------------------------------------------------------
    // Graph
    // -------------------------------------------------------------------------

    /// Re-scan `path` and its imports down to `max_depth` and record the edges.
    pub fn refresh_graph(&self, path: &Path) {
        let entries = self.inner.tracker.collect(path, &mut |file, err| {
            let err = ServeError::Scan {
                path: file.to_path_buf(),
                source: err,
            };
            log!("deps"; "{}", chain(&err));
        });

        let mut graph = self.inner.graph.write();
        for (module, deps) in entries {
            graph.record(&module, &deps);
        }
    }

    /// `path` plus every module that transitively imports it.
    pub fn find_affected(&self, path: &Path) -> Vec<PathBuf> {
        self.inner.graph.read().affected(&normalize_path(path))
    }

    pub fn reload_order(&self, affected: &[PathBuf]) -> Vec<PathBuf> {
        reload_order(&self.inner.graph.read(), affected)
    }

    /// Every module `path` reaches through imports, as far as the graph knows.
    pub fn dependency_closure(&self, path: &Path) -> Vec<PathBuf> {
        self.inner.graph.read().closure(&normalize_path(path))
    }

    /// Direct imports recorded for `path`.
    pub fn dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.inner.graph.read().uses(&normalize_path(path)).to_vec()
    }

    // -------------------------------------------------------------------------
    // Propagation
    // -------------------------------------------------------------------------

    /// Handle a change of `path`: reload everything it affects, dependencies
    /// first, and deliver each new artifact to its subscribers.
    ///
    /// A module that fails is reported once. Its importers are marked failed
    /// without being reloaded and keep their last good version.
    pub fn propagate(&self, path: &Path) -> ReloadReport {
        let path = normalize_path(path);
        self.refresh_graph(&path);

        let affected = self.find_affected(&path);
        let order = self.reload_order(&affected);
        debug!("reload"; "{} affected: {:?}", path.display(), order);

        let mut report = ReloadReport {
            changed: path.clone(),
            order: order.clone(),
            ..ReloadReport::default()
        };

        for unit in order {
            // An importer of a failed module would only fail again on it.
            let closure = self.dependency_closure(&unit);
            if let Some(broken) = closure.iter().find(|dep| report.failed.contains(dep)) {
                debug!("reload"; "skipped {}: {} failed", unit.display(), broken.display());
                report.failed.push(unit);
                continue;
            }

            match self.reload(&unit) {
                Ok(module) => {
                    self.notify(&unit, &module);
                    report.reloaded.push(unit);
                }
                Err(_) => report.failed.push(unit),
            }
        }

        if report.is_success() {
            let name = path.file_name().map_or_else(
                || path.display().to_string(),
                |n| n.to_string_lossy().into_owned(),
            );
            logger::status_success(&format!(
                "reloaded {} ({} module(s))",
                name,
                report.reloaded.len()
            ));
        }
        report
    }

    fn notify(&self, path: &Path, module: &Arc<RouteModule>) {
        // Clone out so no lock is held while user code runs.
        let callbacks: Vec<(String, ReloadCallback)> = self
            .inner
            .subscribers
            .lock()
            .get(path)
            .map(|subs| {
                subs.iter()
                    .map(|s| (s.owner.clone(), s.callback.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for (owner, callback) in callbacks {
            if let Err(err) = callback(module) {
                debug!("reload"; "callback of `{}` failed", owner);
                (self.inner.on_error)(path, &err);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Subscribers
    // -------------------------------------------------------------------------

    /// Register `callback` for `path` under `owner`, replacing that owner's
    /// previous callback.
    pub fn subscribe(&self, path: &Path, owner: &str, callback: ReloadCallback) {
        let path = normalize_path(path);
        let mut subscribers = self.inner.subscribers.lock();
        let subs = subscribers.entry(path).or_default();
        match subs.iter_mut().find(|s| s.owner == owner) {
            Some(existing) => existing.callback = callback,
            None => subs.push(Subscriber {
                owner: owner.to_string(),
                callback,
            }),
        }
    }

    /// Remove `owner`'s callback for `path`. Returns how many remain.
    pub fn unsubscribe(&self, path: &Path, owner: &str) -> usize {
        let path = normalize_path(path);
        let mut subscribers = self.inner.subscribers.lock();
        let Some(subs) = subscribers.get_mut(&path) else {
            return 0;
        };
        subs.retain(|s| s.owner != owner);
        let remaining = subs.len();
        if remaining == 0 {
            subscribers.remove(&path);
        }
        remaining
    }

    pub fn subscriber_count(&self, path: &Path) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(&normalize_path(path))
            .map_or(0, Vec::len)
    }

    pub fn clear_subscribers(&self, path: &Path) {
        self.inner.subscribers.lock().remove(&normalize_path(path));
    }

    pub fn clear_all_subscribers(&self) {
        self.inner.subscribers.lock().clear();
    }

    // -------------------------------------------------------------------------
    // Units
    // -------------------------------------------------------------------------

    /// Forget a module entirely: artifacts, graph edges and subscribers.
    pub fn untrack(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        let removed = self.inner.units.write().remove(&path).is_some();
        self.inner.graph.write().remove(&path);
        self.clear_subscribers(&path);
        removed
    }

    pub fn current(&self, path: &Path) -> Option<Arc<RouteModule>> {
        self.inner
            .units
            .read()
            .get(&normalize_path(path))
            .map(|unit| unit.current().clone())
    }

    pub fn previous(&self, path: &Path) -> Option<Arc<RouteModule>> {
        self.inner
            .units
            .read()
            .get(&normalize_path(path))
            .and_then(|unit| unit.previous().cloned())
    }

    pub fn version(&self, path: &Path) -> Option<u64> {
        self.inner
            .units
            .read()
            .get(&normalize_path(path))
            .map(TrackedUnit::version)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.inner.units.read().contains_key(&normalize_path(path))
    }

    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.units.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl std::fmt::Debug for ReloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadEngine")
            .field("tracked", &self.inner.units.read().len())
            .field("graph", &self.inner.graph.read().len())
            .finish()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
