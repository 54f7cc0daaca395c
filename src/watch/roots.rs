use std::path::{Path, PathBuf};

use notify::{RecursiveMode, Watcher};
use rustc_hash::{FxHashMap, FxHashSet};

/// Watched files and the directory handles that observe them.
///
/// Files are observed through their parent directory (non-recursive), so
/// saves that replace the file by rename keep being seen.
///
/// Responsibility:
/// - Track which root asked for which file
/// - Attach parent directories, detach unused ones
/// - Re-attach directories that were removed and recreated
#[derive(Debug, Default)]
pub(super) struct WatchSet {
    /// File → roots that require it. A root always requires itself.
    files: FxHashMap<PathBuf, FxHashSet<PathBuf>>,
    attached: FxHashSet<PathBuf>,
}

impl WatchSet {
    pub(super) fn is_root(&self, path: &Path) -> bool {
        self.files.get(path).is_some_and(|roots| roots.contains(path))
    }

    pub(super) fn contains(&self, file: &Path) -> bool {
        self.files.contains_key(file)
    }

    pub(super) fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<_> = self
            .files
            .iter()
            .filter(|(file, roots)| roots.contains(*file))
            .map(|(file, _)| file.clone())
            .collect();
        roots.sort();
        roots
    }

    pub(super) fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.files.keys().cloned().collect();
        files.sort();
        files
    }

    /// Record that `root` requires `file`. Returns `true` if the file is new.
    pub(super) fn add(&mut self, root: &Path, file: PathBuf) -> bool {
        let is_new = !self.files.contains_key(&file);
        self.files.entry(file).or_default().insert(root.to_path_buf());
        is_new
    }

    /// Drop `root`; files no other root requires go with it.
    pub(super) fn remove_root(&mut self, root: &Path) -> bool {
        let was_root = self.is_root(root);
        self.files.retain(|_, roots| {
            roots.remove(root);
            !roots.is_empty()
        });
        was_root
    }

    pub(super) fn clear(&mut self) {
        self.files.clear();
    }

    fn desired_dirs(&self) -> FxHashSet<PathBuf> {
        self.files
            .keys()
            .filter_map(|file| file.parent().map(Path::to_path_buf))
            .collect()
    }

    /// Bring directory handles in line with the file set.
    pub(super) fn sync(&mut self, watcher: &mut impl Watcher) {
        let desired = self.desired_dirs();

        // Detach directories nobody needs and forget handles of vanished ones.
        self.attached.retain(|dir| {
            let keep = desired.contains(dir) && dir.exists();
            if !keep {
                watcher.unwatch(dir).ok();
            }
            keep
        });

        for dir in desired {
            if self.attached.contains(&dir) || !dir.exists() {
                continue;
            }
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    crate::debug!("watch"; "attached: {}", dir.display());
                    self.attached.insert(dir);
                }
                Err(e) => crate::log!("watch"; "cannot watch {}: {}", dir.display(), e),
            }
        }
    }

    pub(super) fn attached_dirs(&self) -> usize {
        self.attached.len()
    }
}
