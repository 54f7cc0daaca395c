//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface for every instance
//! max_port_attempts = 10      # Ports probed upward from the requested one
//! workers = 4                 # Request handler threads shared by instances
//! views = "views"             # Default view directory
//! public = ["public"]         # Default static directories
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Server settings shared by all instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces
    pub interface: IpAddr,

    /// Number of consecutive ports probed, starting at the requested one.
    pub max_port_attempts: u16,

    /// Threads in the shared request pool.
    pub workers: usize,

    /// View directory used when an instance does not set one.
    pub views: Option<PathBuf>,

    /// Static directories used when an instance does not set any.
    pub public: Vec<PathBuf>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            max_port_attempts: 10,
            workers: 4,
            views: None,
            public: Vec::new(),
        }
    }
}
