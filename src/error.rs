//! Error taxonomy.
//!
//! | Error                         | Raised by                                   |
//! |-------------------------------|---------------------------------------------|
//! | `ServeError::Validation`      | route files, exports, instance options      |
//! | `ServeError::InvalidRoute`    | route descriptor validation                 |
//! | `ServeError::NotFound`        | unknown instance, missing route file        |
//! | `ServeError::PortExhausted`   | port negotiation                            |
//! | `ServeError::Load`            | parsing or validating a route module        |
//! | `ServeError::Bind`            | socket failures other than "in use"         |
//! | `ServeError::Scan`            | dependency collection (reported only)       |
//! | `ScanError`                   | lexical import scanning (never fatal)       |

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the orchestrator and the reload engine.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid route `{method} {path}`: {reason}")]
    InvalidRoute {
        method: String,
        path: String,
        reason: String,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("no free port in {first}-{last} ({attempts} attempts)")]
    PortExhausted { first: u16, last: u16, attempts: u16 },

    #[error("invalid port {0}: must be within 1-65535")]
    InvalidPort(u16),

    #[error("failed to load `{}`", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("failed to bind {addr} ({kind})")]
    Bind {
        addr: SocketAddr,
        kind: BindErrorKind,
        #[source]
        source: io::Error,
    },

    #[error("cannot scan imports of `{}`", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: ScanError,
    },

    #[error("file watcher error")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServeError {
    pub(crate) fn instance_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "instance",
            name: name.to_string(),
        }
    }

    pub(crate) fn file_not_found(path: &std::path::Path) -> Self {
        Self::NotFound {
            kind: "file",
            name: path.display().to_string(),
        }
    }

    pub(crate) fn invalid_route(method: &str, path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            method: method.to_string(),
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error rejected user input rather than failing at runtime.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidRoute { .. })
    }
}

/// Render an error and its source chain on one line: `outer: inner: root`.
pub fn chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Why a socket could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindErrorKind {
    InUse,
    PermissionDenied,
    AddrNotAvailable,
    Other,
}

impl BindErrorKind {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse => Self::InUse,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::AddrNotAvailable => Self::AddrNotAvailable,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for BindErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InUse => "address in use",
            Self::PermissionDenied => "permission denied",
            Self::AddrNotAvailable => "address not available",
            Self::Other => "socket error",
        })
    }
}

/// Why a route module failed to load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read file")]
    Io(#[from] io::Error),

    #[error("invalid route module: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("route `{route}` references unknown handler `{handler}`")]
    UnknownHandler { route: String, handler: String },

    #[error("route `{route}` references unknown middleware `{middleware}`")]
    UnknownMiddleware { route: String, middleware: String },

    #[error("route `{route}`: {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("handler `{handler}` has invalid status {status}")]
    InvalidStatus { handler: String, status: u16 },

    #[error("import `{}` failed", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },
}

/// Lexical import scan failure. Reported, never fatal.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("unterminated `use` list starting at line {line}")]
    Unterminated { line: usize },

    #[error("malformed `use` declaration at line {line}")]
    Malformed { line: usize },
}
