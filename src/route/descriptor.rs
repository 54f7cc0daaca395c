use super::handler::{Handler, Middleware};

/// An unvalidated route: method and path are kept as strings until binding.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub method: String,
    pub path: String,
    pub handler: Handler,
    pub middleware: Vec<Middleware>,
}

impl RouteDescriptor {
    pub fn new(method: impl Into<String>, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            handler,
            middleware: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>, handler: Handler) -> Self {
        Self::new("GET", path, handler)
    }

    pub fn post(path: impl Into<String>, handler: Handler) -> Self {
        Self::new("POST", path, handler)
    }

    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }
}
