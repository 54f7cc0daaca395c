//! Reload ordering.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::deps::DependencyGraph;

/// Order `affected` so every module comes after the modules it imports.
///
/// Only edges between members of `affected` count. Ties keep their position
/// in `affected`; members of a cycle are appended in that order too, so the
/// result is always a permutation of the input.
pub fn reload_order(graph: &DependencyGraph, affected: &[PathBuf]) -> Vec<PathBuf> {
    let index: FxHashMap<&PathBuf, usize> =
        affected.iter().enumerate().map(|(i, p)| (p, i)).collect();

    // pending[i]: unresolved imports of affected[i] inside the set
    let mut pending = vec![0usize; affected.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); affected.len()];
    for (i, module) in affected.iter().enumerate() {
        for dep in graph.uses(module) {
            if let Some(&j) = index.get(dep)
                && j != i
            {
                pending[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut done = vec![false; affected.len()];
    let mut order = Vec::with_capacity(affected.len());

    // Always pick the earliest ready entry.
    while let Some(next) = (0..affected.len()).find(|&i| !done[i] && pending[i] == 0) {
        done[next] = true;
        order.push(affected[next].clone());
        for &d in &dependents[next] {
            pending[d] -= 1;
        }
    }

    // Cycle remainder.
    order.extend(
        affected
            .iter()
            .zip(&done)
            .filter(|(_, done)| !**done)
            .map(|(p, _)| p.clone()),
    );
    order
}
