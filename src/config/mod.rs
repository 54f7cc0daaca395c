//! Configuration management for `hotserve.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [reload], [serve], [[instance]]
//! ├── error.rs       # ConfigError
//! └── mod.rs         # Config (this file)
//! ```
//!
//! Library users build [`ReloadConfig`] and [`ServeConfig`] directly; the
//! file format exists for the `hotserve` binary.

mod error;
mod section;

pub use error::ConfigError;
pub use section::{InstanceConfig, ReloadConfig, ServeConfig};

use crate::log;
use crate::utils::path::{expand_home, normalize_path, resolve_path};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "hotserve.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing hotserve.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory containing the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub reload: ReloadConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceConfig>,
}

impl Config {
    /// Locate and load the config file.
    ///
    /// Searches upward from cwd; relative paths inside the file resolve
    /// against the directory that contains it.
    pub fn load(config_name: &Path) -> Result<Self, ConfigError> {
        let config_path = find_config_file(config_name)
            .ok_or_else(|| ConfigError::NotFound(config_name.to_path_buf()))?;
        let config_path = normalize_path(&config_path);

        let content = fs::read_to_string(&config_path)
            .map_err(|err| ConfigError::Io(config_path.clone(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, &config_path);
        }

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.normalize_paths(&root);
        config.root = root;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML string (paths left as written).
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Make every configured path absolute relative to `root`.
    fn normalize_paths(&mut self, root: &Path) {
        let fix = |p: &Path| resolve_path(&expand_home(p), root);

        self.serve.views = self.serve.views.as_deref().map(fix);
        self.serve.public = self.serve.public.iter().map(|p| fix(p)).collect();

        for instance in &mut self.instances {
            instance.routes = fix(&instance.routes);
            instance.views = instance.views.as_deref().map(fix);
            instance.public = instance.public.iter().map(|p| fix(p)).collect();
        }
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = FxHashSet::default();
        for instance in &self.instances {
            if instance.name.trim().is_empty() {
                return Err(ConfigError::Validation("instance name must not be empty".into()));
            }
            if !names.insert(instance.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate instance `{}`",
                    instance.name
                )));
            }
            if instance.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "instance `{}`: port must be within 1-65535",
                    instance.name
                )));
            }
        }
        if self.reload.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "reload.extensions must list at least one extension".into(),
            ));
        }
        if self.serve.max_port_attempts == 0 {
            return Err(ConfigError::Validation(
                "serve.max_port_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Find config file by searching upward from current directory
///
/// ```text
/// /home/user/app/routes/      ← cwd
/// /home/user/app/hotserve.toml ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> Config {
    let (parsed, ignored) = Config::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
