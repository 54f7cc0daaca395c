//! `[[instance]]` entries launched by `hotserve serve`.
//!
//! # Example
//!
//! ```toml
//! [[instance]]
//! name = "api"
//! routes = "routes/api.toml"
//! port = 3000
//! watch = true
//! launch = "v2"               # named export, default: top-level routes
//! views = "views"
//! public = ["public", "assets"]
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One server instance declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,

    /// Route module path, relative to the config file.
    pub routes: PathBuf,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub watch: bool,

    #[serde(default)]
    pub launch: Option<String>,

    #[serde(default)]
    pub views: Option<PathBuf>,

    #[serde(default)]
    pub public: Vec<PathBuf>,
}

fn default_port() -> u16 {
    3000
}
