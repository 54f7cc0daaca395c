use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::types::ChangeKind;
use crate::utils::path::normalize_path;

/// How long the loop sleeps when nothing is pending.
pub(super) const IDLE_TICK: Duration = Duration::from_secs(1);

/// Pure debouncer: per-path settle timing and event deduplication.
/// No reload logic, no global state access.
pub(super) struct Debouncer {
    settle: Duration,
    /// Path → (kind, last event time)
    pub(super) changes: FxHashMap<PathBuf, (ChangeKind, Instant)>,
}

impl Debouncer {
    pub(super) fn new(settle: Duration) -> Self {
        Self {
            settle,
            changes: FxHashMap::default(),
        }
    }

    /// Add a notify event for every path `accept` wants, applying dedup rules:
    /// - Removed + Created/Modified → Modified (file was replaced)
    /// - Modified + Removed → Removed (file was deleted)
    /// - Created + Removed → dropped (appeared then vanished)
    /// - otherwise the first kind wins
    ///
    /// Every accepted event restarts that path's settle timer.
    pub(super) fn add_event(&mut self, event: &notify::Event, accept: impl Fn(&Path) -> bool) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes (mtime/atime/chmod) are noise.
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }

            let path = normalize_path(path);
            if !accept(&path) {
                continue;
            }

            let now = Instant::now();
            let next = match self.changes.get(&path).map(|(existing, _)| *existing) {
                None => kind,
                Some(ChangeKind::Removed) if kind != ChangeKind::Removed => {
                    crate::debug!("watch"; "replaced: {}", path.display());
                    ChangeKind::Modified
                }
                Some(ChangeKind::Modified) if kind == ChangeKind::Removed => ChangeKind::Removed,
                Some(ChangeKind::Created) if kind == ChangeKind::Removed => {
                    crate::debug!("watch"; "discard created+removed: {}", path.display());
                    self.changes.remove(&path);
                    continue;
                }
                Some(existing) => existing,
            };

            crate::debug!("watch"; "event {}: {}", next.label(), path.display());
            self.changes.insert(path, (next, now));
        }
    }

    /// Take every change whose path has been quiet for the settle delay.
    pub(super) fn take_ready(&mut self) -> Vec<(PathBuf, ChangeKind)> {
        let settle = self.settle;
        let ready: Vec<PathBuf> = self
            .changes
            .iter()
            .filter(|(_, (_, at))| at.elapsed() >= settle)
            .map(|(path, _)| path.clone())
            .collect();

        let mut out: Vec<_> = ready
            .into_iter()
            .filter_map(|path| self.changes.remove(&path).map(|(kind, _)| (path, kind)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Sleep until the earliest pending path settles.
    pub(super) fn sleep_duration(&self) -> Duration {
        self.changes
            .values()
            .map(|(_, at)| self.settle.saturating_sub(at.elapsed()))
            .min()
            .map_or(IDLE_TICK, |d| d.max(Duration::from_millis(1)))
    }

    pub(super) fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.starts_with('#')
}
