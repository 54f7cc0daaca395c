//! Dependency tracking between route modules.
//!
//! - `scan`: lexical `use` scanning
//! - `resolve`: reference → absolute path
//! - `graph`: forward/reverse edge store
//!
//! [`DependencyTracker`] ties them together: it reads files from disk and
//! produces the edges the reload engine records in its graph.

mod graph;
mod resolve;
mod scan;

pub use graph::DependencyGraph;
pub use resolve::Resolver;
pub use scan::scan_imports;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::config::ReloadConfig;
use crate::error::ScanError;
use crate::utils::normalize_path;

/// One module and its direct dependencies.
pub type DepEntry = (PathBuf, Vec<PathBuf>);

#[derive(Debug, Clone)]
pub struct DependencyTracker {
    resolver: Resolver,
    max_depth: usize,
}

impl DependencyTracker {
    pub fn new(config: &ReloadConfig) -> Self {
        Self {
            resolver: Resolver::new(config),
            max_depth: config.depth(),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolved direct imports of `path`. Unresolvable references are skipped.
    pub fn direct(&self, path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let text = fs::read_to_string(path).map_err(|e| ScanError::Io(path.to_path_buf(), e))?;
        let dir = path.parent().unwrap_or(Path::new("/"));

        let mut deps = Vec::new();
        for reference in scan_imports(&text)? {
            if let Some(dep) = self.resolver.resolve(dir, &reference)
                && dep != path
                && !deps.contains(&dep)
            {
                deps.push(dep);
            }
        }
        Ok(deps)
    }

    /// Walk imports breadth-first from `root`, `max_depth` levels deep.
    ///
    /// Every visited module above the depth limit yields one entry. A file
    /// that cannot be read or scanned is reported and recorded with no
    /// dependencies.
    pub fn collect(
        &self,
        root: &Path,
        on_error: &mut dyn FnMut(&Path, ScanError),
    ) -> Vec<DepEntry> {
        let root = normalize_path(root);
        let mut entries = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(root.clone());
        let mut queue = VecDeque::from([(root, 0usize)]);

        while let Some((path, level)) = queue.pop_front() {
            if level >= self.max_depth {
                continue;
            }

            let deps = self.direct(&path).unwrap_or_else(|err| {
                on_error(&path, err);
                Vec::new()
            });

            for dep in &deps {
                if seen.insert(dep.clone()) {
                    queue.push_back((dep.clone(), level + 1));
                }
            }
            entries.push((path, deps));
        }

        crate::debug!("deps"; "collected {} module(s) below depth {}", entries.len(), self.max_depth);
        entries
    }
}
