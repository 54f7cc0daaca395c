//! Import reference resolution.

use std::path::{Path, PathBuf};

use crate::config::ReloadConfig;
use crate::utils::normalize_path;

/// Turns `use` references into absolute module paths.
#[derive(Debug, Clone)]
pub struct Resolver {
    extensions: Vec<String>,
    index_files: Vec<String>,
}

impl Resolver {
    pub fn new(config: &ReloadConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            index_files: config.index_files.clone(),
        }
    }

    /// `./x`, `../x` and `/x` point at files; anything else is external.
    pub fn is_relative(reference: &str) -> bool {
        reference.starts_with("./") || reference.starts_with("../") || reference.starts_with('/')
    }

    /// Resolve `reference` as written in a module located in `from_dir`.
    ///
    /// Candidates, first existing file wins:
    /// 1. the literal path
    /// 2. the path with each configured extension appended
    /// 3. each configured index file inside the path as a directory
    pub fn resolve(&self, from_dir: &Path, reference: &str) -> Option<PathBuf> {
        if !Self::is_relative(reference) {
            return None;
        }

        let base = from_dir.join(reference);
        self.candidates(&base)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map(|found| normalize_path(&found))
    }

    fn candidates(&self, base: &Path) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(1 + self.extensions.len() + self.index_files.len());
        out.push(base.to_path_buf());

        for ext in &self.extensions {
            let mut with_ext = base.as_os_str().to_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            out.push(PathBuf::from(with_ext));
        }

        out.extend(self.index_files.iter().map(|index| base.join(index)));
        out
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(&ReloadConfig::default())
    }
}
