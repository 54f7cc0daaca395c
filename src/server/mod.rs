//! Multi-instance HTTP hosting with hot-reloaded routes.
//!
//! # Modules
//!
//! - `app` - per-instance request dispatch over a swappable route table
//! - `port` - port negotiation
//! - `listener` - accept loop feeding the shared worker pool
//! - `instance` - instance state and summaries
//! - `registry` - name-keyed lifecycle slots
//! - `response` / `static_files` - response writers and static directories
//!
//! # Lifecycle
//!
//! ```text
//! create_instance ─► claim ─► routes ─► port ─► listener ─► watch ─► publish
//!                                                                    │
//! stop_instance ◄─ finish_stop ◄─ close listener ◄─ unwatch ◄─ begin_stop
//! ```

mod app;
mod instance;
mod listener;
mod port;
mod registry;
mod response;
mod static_files;

#[cfg(test)]
mod tests;

pub use app::Application;
pub use instance::{InstanceOptions, InstanceState, InstanceSummary, RouteSource, ServerInstance};
pub use port::bind_with_retry;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::ThreadPool;
use rayon::prelude::*;

use crate::config::{Config, ReloadConfig, ServeConfig};
use crate::error::{ServeError, chain};
use crate::module::RouteModule;
use crate::reload::{ErrorCallback, ReloadCallback, ReloadEngine, log_errors};
use crate::route::{BoundRoute, HandlerRegistry, RouteDescriptor, RouteOrigin, RouteTable, binder};
use crate::watch::WatchEngine;
use crate::{debug, log};
use instance::SharedStatus;
use listener::Listener;
use registry::{Claim, InstanceRegistry};

/// Result of [`Orchestrator::cleanup`].
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub stopped: Vec<String>,
    pub failed: Vec<(String, ServeError)>,
}

/// Owns every instance, the reload engine and the file watcher.
pub struct Orchestrator {
    serve: ServeConfig,
    engine: ReloadEngine,
    /// Started on the first watched instance.
    watcher: Mutex<Option<Arc<WatchEngine>>>,
    instances: InstanceRegistry,
    pool: Arc<ThreadPool>,
}

#[derive(Default)]
pub struct OrchestratorBuilder {
    reload: ReloadConfig,
    serve: ServeConfig,
    handlers: Option<HandlerRegistry>,
    on_error: Option<ErrorCallback>,
}

impl OrchestratorBuilder {
    pub fn reload(mut self, reload: ReloadConfig) -> Self {
        self.reload = reload;
        self
    }

    pub fn serve(mut self, serve: ServeConfig) -> Self {
        self.serve = serve;
        self
    }

    /// Native handlers and middleware. Defaults to the built-ins.
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Receives hot-reload failures. Defaults to a logged watch status.
    pub fn on_error(mut self, on_error: ErrorCallback) -> Self {
        self.on_error = Some(on_error);
        self
    }

    pub fn build(self) -> Result<Orchestrator, ServeError> {
        if self.serve.max_port_attempts == 0 {
            return Err(ServeError::Validation(
                "max_port_attempts must be at least 1".into(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.serve.workers.max(1))
            .thread_name(|i| format!("hotserve-worker-{i}"))
            .build()
            .map_err(io::Error::other)?;

        let handlers = self.handlers.unwrap_or_else(HandlerRegistry::with_builtins);
        let on_error = self.on_error.unwrap_or_else(log_errors);

        Ok(Orchestrator {
            serve: self.serve,
            engine: ReloadEngine::new(self.reload, handlers, on_error),
            watcher: Mutex::new(None),
            instances: InstanceRegistry::default(),
            pool: Arc::new(pool),
        })
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Builder seeded with the `[reload]` and `[serve]` sections.
    pub fn from_config(config: &Config) -> OrchestratorBuilder {
        Self::builder()
            .reload(config.reload.clone())
            .serve(config.serve.clone())
    }

    pub fn engine(&self) -> &ReloadEngine {
        &self.engine
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        self.engine.registry()
    }

    /// Start an instance and return its `http://ip:port` address.
    ///
    /// Idempotent per name: an instance that is already running is returned
    /// as is, whatever the arguments.
    pub fn create_instance(
        &self,
        name: &str,
        source: RouteSource,
        port: u16,
        options: InstanceOptions,
    ) -> Result<String, ServeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServeError::Validation("instance name must not be empty".into()));
        }

        let reservation = match self.instances.claim(name) {
            Claim::Existing(instance) => {
                debug!("serve"; "instance {} already running at {}", name, instance.url());
                return Ok(instance.url());
            }
            Claim::Vacant(reservation) => reservation,
        };

        let options = self.with_defaults(options);
        let routes = self.initial_routes(&source, &options)?;

        for dir in options.views.iter().chain(&options.public) {
            fs::create_dir_all(dir)?;
        }

        let (server, addr) =
            port::bind_with_retry(self.serve.interface, port, self.serve.max_port_attempts)?;

        let app = Arc::new(Application::new(
            RouteTable::new(routes),
            options.views.clone(),
            options.public.clone(),
        ));
        let listener = Listener::spawn(name, server, Arc::clone(&app), Arc::clone(&self.pool))?;
        let instance = Arc::new(ServerInstance::new(
            name.to_string(),
            addr,
            port,
            source,
            options,
            app,
            listener,
        ));

        if instance.options.watch
            && let Some(file) = instance.source.file()
        {
            self.attach_watch(&instance, file)?;
        }

        let url = instance.url();
        log!("serve"; "{} listening on {}", name, url);
        reservation.publish(instance);
        Ok(url)
    }

    /// Stop an instance and release its port.
    pub fn stop_instance(&self, name: &str) -> Result<(), ServeError> {
        let instance = self
            .instances
            .begin_stop(name)
            .ok_or_else(|| ServeError::instance_not_found(name))?;

        if let Some(file) = instance.source.file() {
            self.detach_watch(name, file);
        }
        instance.close();

        self.instances.finish_stop(name);
        log!("serve"; "{} stopped", name);
        Ok(())
    }

    /// Stop and re-create from the original arguments.
    ///
    /// Routes added at runtime are not carried over.
    pub fn reset_instance(&self, name: &str) -> Result<String, ServeError> {
        let instance = self
            .instances
            .get(name)
            .ok_or_else(|| ServeError::instance_not_found(name))?;
        let (source, port, options) = (
            instance.source.clone(),
            instance.requested_port,
            instance.options.clone(),
        );
        drop(instance);

        self.stop_instance(name)?;
        self.create_instance(name, source, port, options)
    }

    /// Bind one more route onto a live instance.
    pub fn add_route(&self, name: &str, descriptor: RouteDescriptor) -> Result<(), ServeError> {
        let instance = self
            .instances
            .get(name)
            .ok_or_else(|| ServeError::instance_not_found(name))?;
        binder::add(&instance.app, descriptor)?;
        instance.touch();
        Ok(())
    }

    /// Summaries of every running instance, sorted by name.
    pub fn list_instances(&self) -> Vec<InstanceSummary> {
        self.instances
            .running()
            .iter()
            .map(|instance| self.summarize(instance))
            .collect()
    }

    pub fn get_instance(&self, name: &str) -> Option<InstanceSummary> {
        self.instances
            .get(name)
            .map(|instance| self.summarize(&instance))
    }

    /// Stop everything. Never fails; safe to call repeatedly.
    pub fn cleanup(&self) -> CleanupReport {
        let results: Vec<_> = self
            .instances
            .names()
            .into_par_iter()
            .map(|name| {
                let result = self.stop_instance(&name);
                (name, result)
            })
            .collect();

        let mut report = CleanupReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.stopped.push(name),
                Err(ServeError::NotFound { .. }) => {}
                Err(e) => {
                    log!("error"; "failed to stop {}: {}", name, chain(&e));
                    report.failed.push((name, e));
                }
            }
        }

        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            watcher.unwatch_all();
        }
        self.engine.clear_all_subscribers();

        if !report.stopped.is_empty() {
            debug!("serve"; "cleanup stopped {} instance(s)", report.stopped.len());
        }
        report
    }

    fn with_defaults(&self, mut options: InstanceOptions) -> InstanceOptions {
        if options.views.is_none() {
            options.views = self.serve.views.clone();
        }
        if options.public.is_empty() {
            options.public = self.serve.public.clone();
        }
        options
    }

    /// Validate and bind the routes an instance starts with.
    fn initial_routes(
        &self,
        source: &RouteSource,
        options: &InstanceOptions,
    ) -> Result<Vec<BoundRoute>, ServeError> {
        let descs = match source {
            RouteSource::Inline(descs) => descs.clone(),
            RouteSource::File(path) => {
                let module = self.engine.preload(path)?;
                binder::describe(
                    &module,
                    options.launch.as_deref(),
                    self.handlers(),
                    options.views.as_deref(),
                )?
            }
        };
        binder::bind_all(descs, RouteOrigin::Source)
    }

    fn watcher(&self) -> Result<Arc<WatchEngine>, ServeError> {
        let mut slot = self.watcher.lock();
        if let Some(watcher) = slot.as_ref() {
            return Ok(Arc::clone(watcher));
        }
        let watcher = Arc::new(WatchEngine::start(self.engine.clone())?);
        *slot = Some(Arc::clone(&watcher));
        Ok(watcher)
    }

    fn attach_watch(&self, instance: &ServerInstance, file: &Path) -> Result<(), ServeError> {
        let watcher = self.watcher()?;
        self.engine
            .subscribe(file, &instance.name, self.reload_callback(instance));
        watcher.watch(file);
        Ok(())
    }

    /// Drop this instance's callback; unwatch the file once nobody is left.
    fn detach_watch(&self, name: &str, file: &Path) {
        if self.engine.unsubscribe(file, name) > 0 {
            return;
        }
        let watcher = self.watcher.lock().clone();
        if let Some(watcher) = watcher {
            watcher.unwatch(file);
        }
    }

    /// Rebinds the instance's source routes from a freshly reloaded module.
    fn reload_callback(&self, instance: &ServerInstance) -> ReloadCallback {
        let name = instance.name.clone();
        let app = Arc::clone(&instance.app);
        let status: SharedStatus = Arc::clone(&instance.status);
        let launch = instance.options.launch.clone();
        let views = instance.options.views.clone();
        let handlers = self.handlers().clone();

        Arc::new(move |module: &Arc<RouteModule>| {
            status.lock().set(InstanceState::Reloading);
            let result = binder::describe(module, launch.as_deref(), &handlers, views.as_deref())
                .and_then(|descs| binder::install(&app, descs));
            settle(&status);

            let count = result?;
            log!("reload"; "{}: {} route(s) from {}", name, count, module.path.display());
            Ok(())
        })
    }

    fn summarize(&self, instance: &ServerInstance) -> InstanceSummary {
        let version = instance
            .source
            .file()
            .and_then(|file| self.engine.version(file));
        instance.summary(version)
    }
}

/// Back to `Listening`, unless the instance was stopped meanwhile.
fn settle(status: &SharedStatus) {
    let mut status = status.lock();
    if status.state == InstanceState::Reloading {
        status.set(InstanceState::Listening);
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("serve", &self.serve)
            .field("instances", &self.instances.names())
            .finish_non_exhaustive()
    }
}
