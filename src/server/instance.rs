//! A named, listening server instance and its lifecycle state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;

use super::Application;
use super::listener::Listener;
use crate::route::{RouteDescriptor, RouteInfo};

/// Where an instance's routes come from.
#[derive(Debug, Clone)]
pub enum RouteSource {
    /// Routes built by the host program.
    Inline(Vec<RouteDescriptor>),
    /// A route module on disk, optionally hot reloaded.
    File(PathBuf),
}

impl RouteSource {
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Self::File(path) => Some(path),
            Self::Inline(_) => None,
        }
    }
}

/// Per-instance settings beyond name, routes and port.
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    /// Base directory for `file` bodies of static handlers.
    pub views: Option<PathBuf>,
    /// Directories served for unmatched `GET`/`HEAD` requests.
    pub public: Vec<PathBuf>,
    /// Reload routes when the route file or its imports change.
    pub watch: bool,
    /// Named export to serve instead of the top-level routes.
    pub launch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Listening,
    Reloading,
    Stopped,
}

#[derive(Debug)]
pub(crate) struct Status {
    pub state: InstanceState,
    pub updated_at: SystemTime,
}

impl Status {
    pub fn set(&mut self, state: InstanceState) {
        self.state = state;
        self.updated_at = SystemTime::now();
    }
}

pub(crate) type SharedStatus = Arc<Mutex<Status>>;

/// A live instance. Owned by the orchestrator's registry.
#[derive(Debug)]
pub struct ServerInstance {
    pub name: String,
    pub addr: SocketAddr,
    pub requested_port: u16,
    pub source: RouteSource,
    pub options: InstanceOptions,
    pub(crate) app: Arc<Application>,
    pub(crate) listener: Mutex<Option<Listener>>,
    pub(crate) status: SharedStatus,
    created_at: SystemTime,
}

impl ServerInstance {
    pub(crate) fn new(
        name: String,
        addr: SocketAddr,
        requested_port: u16,
        source: RouteSource,
        options: InstanceOptions,
        app: Arc<Application>,
        listener: Listener,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            name,
            addr,
            requested_port,
            source,
            options,
            app,
            listener: Mutex::new(Some(listener)),
            status: Arc::new(Mutex::new(Status {
                state: InstanceState::Listening,
                updated_at: now,
            })),
            created_at: now,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> InstanceState {
        self.status.lock().state
    }

    /// Record a change that did not alter the lifecycle state.
    pub(crate) fn touch(&self) {
        self.status.lock().updated_at = SystemTime::now();
    }

    /// Stop accepting connections. Idempotent.
    pub(crate) fn close(&self) {
        // Take the listener out first so the accept thread is joined
        // without holding the lock.
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.close();
        }
        self.status.lock().set(InstanceState::Stopped);
    }

    pub(crate) fn summary(&self, version: Option<u64>) -> InstanceSummary {
        let status = self.status.lock();
        InstanceSummary {
            name: self.name.clone(),
            port: self.addr.port(),
            requested_port: self.requested_port,
            address: self.addr.to_string(),
            url: self.url(),
            state: status.state,
            created_at_ms: millis(self.created_at),
            updated_at_ms: millis(status.updated_at),
            hot_reload: self.options.watch && self.source.file().is_some(),
            route_file: self.source.file().cloned(),
            version,
            launch: self.options.launch.clone(),
            routes: self.app.routes().info(),
        }
    }
}

/// Serializable snapshot of an instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    pub name: String,
    pub port: u16,
    pub requested_port: u16,
    pub address: String,
    pub url: String,
    pub state: InstanceState,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub hot_reload: bool,
    pub route_file: Option<PathBuf>,
    /// Version of the route module currently served, for file sources.
    pub version: Option<u64>,
    pub launch: Option<String>,
    pub routes: Vec<RouteInfo>,
}

fn millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
