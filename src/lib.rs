//! hotserve - host several HTTP server instances whose routes live in TOML
//! route modules and hot reload, imports included, when those files change.
//!
//! # Architecture
//!
//! ```text
//!  file change ─► watch (notify + debounce) ─► reload engine
//!                                                  │ affected set, topological order
//!                                                  ▼
//!                 route modules ─► subscribers ─► orchestrator ─► Application (arc-swap)
//!                                                                      ▲
//!                                           tiny_http listener ─► rayon pool
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hotserve::{Handler, InstanceOptions, Orchestrator, RouteDescriptor, RouteSource};
//!
//! let orchestrator = Orchestrator::builder().build()?;
//! let url = orchestrator.create_instance(
//!     "api",
//!     RouteSource::Inline(vec![RouteDescriptor::get("/", Handler::text("hello"))]),
//!     3000,
//!     InstanceOptions::default(),
//! )?;
//! println!("{url}");
//! # Ok::<(), hotserve::ServeError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod deps;
pub mod error;
pub mod logger;
pub mod module;
pub mod reload;
pub mod route;
pub mod server;
pub mod utils;
pub mod watch;

pub use config::{Config, InstanceConfig, ReloadConfig, ServeConfig};
pub use error::{BindErrorKind, LoadError, ScanError, ServeError};
pub use module::RouteModule;
pub use reload::{ReloadEngine, ReloadReport};
pub use route::{
    Handler, HandlerRegistry, Middleware, Next, RequestContext, ResponseContext, RouteDescriptor,
};
pub use server::{
    CleanupReport, InstanceOptions, InstanceState, InstanceSummary, Orchestrator, RouteSource,
};
pub use watch::WatchEngine;
