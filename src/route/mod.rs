//! Routes: descriptors, the handlers they point at, and the tables an
//! application dispatches through.
//!
//! # Modules
//!
//! - `method` / `pattern` - validated method and path
//! - `handler` - request/response contexts, handlers, middleware, endpoints
//! - `registry` - host-registered native handlers and middleware
//! - `table` - immutable route tables
//! - `binder` - validation and installation onto a live application

pub mod binder;
mod descriptor;
mod handler;
mod method;
mod pattern;
mod registry;
mod table;

pub use descriptor::RouteDescriptor;
pub use handler::{
    Endpoint, Handler, HandlerFn, Middleware, MiddlewareFn, Next, RequestContext,
    ResponseContext, StaticResponse,
};
pub use method::Method;
pub use pattern::{Params, RoutePattern};
pub use registry::HandlerRegistry;
pub use table::{BoundRoute, RouteInfo, RouteOrigin, RouteTable};
