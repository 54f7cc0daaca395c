//! Bidirectional dependency graph between route modules.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::utils::path::normalize_path;

type PathList = Vec<PathBuf>;
type PathListMap = FxHashMap<PathBuf, PathList>;

/// Forward (module → imports) and reverse (import → importers) mappings.
///
/// # Invariants
/// - Forward and reverse mappings are always consistent
/// - Paths are normalized for reliable matching
/// - Self-references are excluded
/// - Lists keep first-recorded order, so traversals are deterministic
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    forward: PathListMap,
    reverse: PathListMap,
}

impl DependencyGraph {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dependencies of `module`, replacing any previous record.
    pub fn record(&mut self, module: &Path, deps: &[PathBuf]) {
        let module = normalize_path(module);
        self.remove(&module);

        let mut list = PathList::with_capacity(deps.len());
        for dep in deps {
            let dep = normalize_path(dep);
            if dep != module && !list.contains(&dep) {
                list.push(dep);
            }
        }

        for dep in &list {
            let importers = self.reverse.entry(dep.clone()).or_default();
            if !importers.contains(&module) {
                importers.push(module.clone());
            }
        }

        self.forward.insert(module, list);
    }

    /// Modules that import `file` directly.
    #[inline]
    pub fn used_by(&self, file: &Path) -> &[PathBuf] {
        self.reverse.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    /// Direct imports of `module`.
    #[inline]
    pub fn uses(&self, module: &Path) -> &[PathBuf] {
        self.forward.get(module).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, module: &Path) -> bool {
        self.forward.contains_key(module)
    }

    /// `file` followed by every module that (transitively) imports it,
    /// in breadth-first discovery order. Cycles are visited once.
    pub fn affected(&self, file: &Path) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([file.to_path_buf()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(
                self.used_by(&current)
                    .iter()
                    .filter(|p| !seen.contains(*p))
                    .cloned(),
            );
            order.push(current);
        }
        order
    }

    /// Every module reachable from `module` along forward edges, excluding
    /// `module` itself.
    pub fn closure(&self, module: &Path) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        seen.insert(module.to_path_buf());
        let mut order = Vec::new();
        let mut queue: VecDeque<PathBuf> = self.uses(module).iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(self.uses(&current).iter().cloned());
            order.push(current);
        }
        order
    }

    /// Drop `module`'s forward record and the reverse edges it owned.
    pub fn remove(&mut self, module: &Path) {
        let Some(old_deps) = self.forward.remove(module) else {
            return;
        };

        for dep in old_deps {
            if let Some(importers) = self.reverse.get_mut(&dep) {
                importers.retain(|p| p != module);
                if importers.is_empty() {
                    self.reverse.remove(&dep);
                }
            }
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_record_and_query() {
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/b.toml"), p("/c.toml"), p("/b.toml")]);

        assert_eq!(graph.uses(&p("/a.toml")), &[p("/b.toml"), p("/c.toml")]);
        assert_eq!(graph.used_by(&p("/b.toml")), &[p("/a.toml")]);
        assert!(graph.used_by(&p("/a.toml")).is_empty());
    }

    #[test]
    fn test_self_reference_excluded() {
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/a.toml"), p("/b.toml")]);
        assert_eq!(graph.uses(&p("/a.toml")), &[p("/b.toml")]);
        assert!(graph.used_by(&p("/a.toml")).is_empty());
    }

    #[test]
    fn test_rerecord_replaces_reverse_edges() {
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/b.toml")]);
        graph.record(&p("/a.toml"), &[p("/c.toml")]);

        assert!(graph.used_by(&p("/b.toml")).is_empty());
        assert_eq!(graph.used_by(&p("/c.toml")), &[p("/a.toml")]);
    }

    #[test]
    fn test_affected_chain() {
        // a -> b -> c
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/b.toml")]);
        graph.record(&p("/b.toml"), &[p("/c.toml")]);
        graph.record(&p("/c.toml"), &[]);

        assert_eq!(
            graph.affected(&p("/c.toml")),
            vec![p("/c.toml"), p("/b.toml"), p("/a.toml")]
        );
        assert_eq!(graph.affected(&p("/b.toml")), vec![p("/b.toml"), p("/a.toml")]);
        assert_eq!(graph.affected(&p("/a.toml")), vec![p("/a.toml")]);
    }

    #[test]
    fn test_affected_cycle_terminates() {
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/b.toml")]);
        graph.record(&p("/b.toml"), &[p("/a.toml")]);

        assert_eq!(graph.affected(&p("/a.toml")), vec![p("/a.toml"), p("/b.toml")]);
    }

    #[test]
    fn test_closure() {
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/b.toml"), p("/c.toml")]);
        graph.record(&p("/b.toml"), &[p("/d.toml")]);
        graph.record(&p("/c.toml"), &[p("/d.toml"), p("/a.toml")]);

        assert_eq!(
            graph.closure(&p("/a.toml")),
            vec![p("/b.toml"), p("/c.toml"), p("/d.toml")]
        );
    }

    #[test]
    fn test_remove() {
        let mut graph = DependencyGraph::new();
        graph.record(&p("/a.toml"), &[p("/b.toml")]);
        graph.remove(&p("/a.toml"));
        assert!(graph.is_empty());
        assert!(graph.used_by(&p("/b.toml")).is_empty());
    }
}
