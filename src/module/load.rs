use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{ModuleFile, RouteModule, RouteSpec};
use crate::deps::Resolver;
use crate::error::LoadError;
use crate::route::{HandlerRegistry, Method, RoutePattern, StaticResponse};
use crate::utils::hash;

/// What a load may consult besides the file itself.
pub struct LoadContext<'a> {
    pub resolver: &'a Resolver,
    pub registry: &'a HandlerRegistry,
    /// Current artifact of an already tracked module.
    pub tracked: &'a dyn Fn(&Path) -> Option<Arc<RouteModule>>,
}

/// Read, parse and validate the module at `path`.
pub fn load(path: &Path, cx: &LoadContext<'_>) -> Result<RouteModule, LoadError> {
    let mut visiting = FxHashSet::default();
    load_module(path, cx, &mut visiting)
}

fn load_module(
    path: &Path,
    cx: &LoadContext<'_>,
    visiting: &mut FxHashSet<PathBuf>,
) -> Result<RouteModule, LoadError> {
    visiting.insert(path.to_path_buf());

    let text = fs::read_to_string(path)?;
    let source: ModuleFile = toml::from_str(&text)?;
    let dir = path.parent().unwrap_or(Path::new("/"));

    let mut handlers: FxHashMap<String, Arc<StaticResponse>> = FxHashMap::default();
    let mut imports = Vec::new();

    for reference in source.imports.iter() {
        if !Resolver::is_relative(reference) {
            continue;
        }
        let Some(dep) = cx.resolver.resolve(dir, reference) else {
            return Err(LoadError::Import {
                path: dir.join(reference),
                source: Box::new(LoadError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no route module at this location",
                ))),
            });
        };
        if dep == path || imports.contains(&dep) {
            continue;
        }

        // An import cycle contributes nothing further down the stack.
        if !visiting.contains(&dep) {
            let visible = match (cx.tracked)(&dep) {
                Some(module) => module.handlers.clone(),
                None => {
                    load_module(&dep, cx, visiting)
                        .map_err(|e| LoadError::Import {
                            path: dep.clone(),
                            source: Box::new(e),
                        })?
                        .handlers
                }
            };
            handlers.extend(visible);
        }
        imports.push(dep);
    }

    for (name, response) in source.handlers {
        if !response.has_valid_status() {
            return Err(LoadError::InvalidStatus {
                handler: name,
                status: response.status,
            });
        }
        handlers.insert(name, Arc::new(response));
    }

    let module = RouteModule {
        path: path.to_path_buf(),
        fingerprint: hash::fingerprint(&text),
        imports,
        handlers,
        routes: source.routes,
        exports: source
            .exports
            .into_iter()
            .map(|(name, export)| (name, export.routes))
            .collect(),
    };

    for spec in module.all_routes() {
        check_route(spec, &module, cx.registry)?;
    }

    visiting.remove(path);
    Ok(module)
}

fn check_route(
    spec: &RouteSpec,
    module: &RouteModule,
    registry: &HandlerRegistry,
) -> Result<(), LoadError> {
    let invalid = |reason: String| LoadError::InvalidRoute {
        route: spec.label(),
        reason,
    };

    spec.method.parse::<Method>().map_err(invalid)?;
    RoutePattern::parse(&spec.path).map_err(invalid)?;

    if module.handler(&spec.handler).is_none() && !registry.has_handler(&spec.handler) {
        return Err(LoadError::UnknownHandler {
            route: spec.label(),
            handler: spec.handler.clone(),
        });
    }

    if let Some(missing) = spec.middleware.iter().find(|m| !registry.has_middleware(m)) {
        return Err(LoadError::UnknownMiddleware {
            route: spec.label(),
            middleware: missing.clone(),
        });
    }

    Ok(())
}
