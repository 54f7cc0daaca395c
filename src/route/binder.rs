//! Route binding: descriptor validation and installation onto a live
//! application.
//!
//! Binding is all-or-nothing: every descriptor of a batch is validated
//! before the application's table is swapped, so a bad route never leaves
//! an instance half-updated.

use std::path::Path;
use std::sync::Arc;

use super::{
    BoundRoute, Endpoint, Handler, HandlerRegistry, Method, RouteDescriptor, RouteOrigin,
    RoutePattern,
};
use crate::error::ServeError;
use crate::module::RouteModule;
use crate::server::Application;

/// Check a descriptor without binding it.
pub fn validate(desc: &RouteDescriptor) -> Result<(Method, RoutePattern), ServeError> {
    let reject = |reason: String| ServeError::invalid_route(&desc.method, &desc.path, reason);

    let method = desc.method.parse::<Method>().map_err(reject)?;
    let pattern = RoutePattern::parse(&desc.path).map_err(reject)?;

    if let Handler::Static(response) = &desc.handler
        && !response.has_valid_status()
    {
        return Err(reject(format!(
            "status {} is outside 100-599",
            response.status
        )));
    }

    Ok((method, pattern))
}

pub fn bind(desc: RouteDescriptor, origin: RouteOrigin) -> Result<BoundRoute, ServeError> {
    let (method, pattern) = validate(&desc)?;
    Ok(BoundRoute {
        method,
        pattern,
        endpoint: Endpoint::new(desc.handler, desc.middleware),
        origin,
    })
}

pub fn bind_all(
    descs: Vec<RouteDescriptor>,
    origin: RouteOrigin,
) -> Result<Vec<BoundRoute>, ServeError> {
    descs.into_iter().map(|desc| bind(desc, origin)).collect()
}

/// Turn the selected export of a module into descriptors.
///
/// Handler names resolve to the module's visible handlers first, then to
/// host handlers. Static `file` bodies resolve against `views`.
pub fn describe(
    module: &RouteModule,
    launch: Option<&str>,
    registry: &HandlerRegistry,
    views: Option<&Path>,
) -> Result<Vec<RouteDescriptor>, ServeError> {
    let specs = module.routes_for(launch).ok_or_else(|| {
        let available: Vec<_> = module.export_names().collect();
        ServeError::Validation(format!(
            "`{}` has no export `{}` (available: {})",
            module.path.display(),
            launch.unwrap_or_default(),
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        ))
    })?;

    specs
        .iter()
        .map(|spec| {
            let handler = match module.handler(&spec.handler) {
                Some(response) => Handler::Static(Arc::new(response.resolved(views))),
                None => registry.handler(&spec.handler).ok_or_else(|| {
                    ServeError::invalid_route(
                        &spec.method,
                        &spec.path,
                        format!("unknown handler `{}`", spec.handler),
                    )
                })?,
            };

            let middleware = spec
                .middleware
                .iter()
                .map(|name| {
                    registry.middleware(name).ok_or_else(|| {
                        ServeError::invalid_route(
                            &spec.method,
                            &spec.path,
                            format!("unknown middleware `{name}`"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(RouteDescriptor {
                method: spec.method.clone(),
                path: spec.path.clone(),
                handler,
                middleware,
            })
        })
        .collect()
}

/// Replace the application's source routes. Added routes are kept.
pub fn install(app: &Application, descs: Vec<RouteDescriptor>) -> Result<usize, ServeError> {
    let routes = bind_all(descs, RouteOrigin::Source)?;
    let count = routes.len();
    app.replace_source(routes);
    Ok(count)
}

/// Append one route to a live application.
pub fn add(app: &Application, desc: RouteDescriptor) -> Result<(), ServeError> {
    let route = bind(desc, RouteOrigin::Added)?;
    app.push(route);
    Ok(())
}
