//! Per-path in-flight tracking with latest-wins coalescing.
//!
//! ```text
//! idle ──try_begin──► running ──finish──► idle
//!                      │   ▲
//!           try_begin  │   │ finish (trailing reload)
//!                      ▼   │
//!                  running + pending
//! ```

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Nothing was running for the path; the caller runs the reload.
    Started,
    /// A reload is already running; the change is folded into its pending mark.
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The slot is free again.
    Idle,
    /// Changes arrived while running; the caller runs exactly one more reload.
    Rerun,
}

/// Capacity-1 slot per path. The value is the pending mark.
#[derive(Debug, Default)]
pub struct ReloadSlots {
    slots: DashMap<PathBuf, bool>,
    trailing: bool,
}

impl ReloadSlots {
    pub fn new(trailing: bool) -> Self {
        Self {
            slots: DashMap::new(),
            trailing,
        }
    }

    pub fn try_begin(&self, path: &Path) -> Admission {
        match self.slots.entry(path.to_path_buf()) {
            Entry::Occupied(mut running) => {
                *running.get_mut() = true;
                Admission::Coalesced
            }
            Entry::Vacant(idle) => {
                idle.insert(false);
                Admission::Started
            }
        }
    }

    /// Mark the running reload of `path` as finished.
    ///
    /// With trailing reloads enabled a pending mark keeps the slot occupied
    /// and asks for one more run; otherwise the mark is dropped.
    pub fn finish(&self, path: &Path) -> Completion {
        match self.slots.entry(path.to_path_buf()) {
            Entry::Occupied(mut running) => {
                if *running.get() && self.trailing {
                    *running.get_mut() = false;
                    Completion::Rerun
                } else {
                    running.remove();
                    Completion::Idle
                }
            }
            Entry::Vacant(_) => Completion::Idle,
        }
    }

    pub fn in_flight(&self, path: &Path) -> bool {
        self.slots.contains_key(path)
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.slots.get(path).is_some_and(|pending| *pending)
    }
}
