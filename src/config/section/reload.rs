//! `[reload]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [reload]
//! max_depth = 3                          # import levels tracked per unit
//! settle_ms = 100                        # quiet period before reacting
//! extensions = ["toml"]                  # appended when resolving imports
//! index_files = ["index.toml", "mod.toml"]
//! trailing_reload = true                 # rerun once after a coalesced change
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hot reload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Import levels recorded in the dependency graph (1 = direct only).
    pub max_depth: usize,

    /// Settle delay after the last change event for a file.
    pub settle_ms: u64,

    /// Extensions tried when an import omits one; also the accepted
    /// extensions for route files.
    pub extensions: Vec<String>,

    /// Index files tried when an import names a directory.
    pub index_files: Vec<String>,

    /// Run one more reload when a change arrived mid-reload.
    pub trailing_reload: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            settle_ms: 100,
            extensions: vec!["toml".into()],
            index_files: vec!["index.toml".into(), "mod.toml".into()],
            trailing_reload: true,
        }
    }
}

impl ReloadConfig {
    /// Depth clamped to at least one level.
    pub fn depth(&self) -> usize {
        self.max_depth.max(1)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Whether `ext` is an accepted route file extension.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}
