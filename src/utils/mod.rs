//! Utility modules.
//!
//! - [`path`]: Filesystem path normalization (`normalize_path`, `resolve_path`)
//! - [`hash`]: Content fingerprints for loaded route modules
//! - [`mime`]: Content-Type detection for static files

pub mod hash;
pub mod mime;
pub mod path;

pub use path::{normalize_path, resolve_path};
