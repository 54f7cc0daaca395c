//! File watch engine.
//!
//! Watches tracked route modules and turns settled changes into reload
//! propagations.
//!
//! ```text
//! notify → Debouncer (per-path settle) → ReloadSlots (coalesce) → propagate
//!                                                   ▲                  │
//!                                                   └──── done ────────┘
//! ```
//!
//! The loop runs on its own thread with a current-thread tokio runtime;
//! propagations run on the blocking pool, so different files reload
//! concurrently while one file never reloads twice at the same time.

mod debouncer;
mod roots;
mod types;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::RecommendedWatcher;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ServeError;
use crate::reload::{Admission, Completion, ReloadEngine, ReloadReport, ReloadSlots};
use crate::utils::normalize_path;
use crate::{debug, log};

use debouncer::Debouncer;
use roots::WatchSet;
use types::{ChangeKind, Command};

/// How long shutdown waits for running reloads.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

struct Shared {
    set: WatchSet,
    watcher: RecommendedWatcher,
}

/// Handle to the watch thread. Dropping it stops the thread.
pub struct WatchEngine {
    engine: ReloadEngine,
    shared: Arc<Mutex<Shared>>,
    slots: Arc<ReloadSlots>,
    commands: mpsc::UnboundedSender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WatchEngine {
    /// Create the watcher and start the watch thread.
    ///
    /// The watcher exists before this returns, so files watched right after
    /// never miss an event.
    pub fn start(engine: ReloadEngine) -> Result<Self, ServeError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let shared = Arc::new(Mutex::new(Shared {
            set: WatchSet::default(),
            watcher,
        }));
        let slots = Arc::new(ReloadSlots::new(engine.config().trailing_reload));
        let (commands, command_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            engine: engine.clone(),
            shared: shared.clone(),
            slots: slots.clone(),
            debouncer: Debouncer::new(engine.config().settle()),
        };
        let thread = std::thread::Builder::new()
            .name("hotserve-watch".into())
            .spawn(move || {
                runtime.block_on(worker.run(event_rx, command_rx));
                runtime.shutdown_timeout(SHUTDOWN_GRACE);
            })?;

        Ok(Self {
            engine,
            shared,
            slots,
            commands,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Start watching `path` as a root. Returns `false` if it already is one.
    ///
    /// With `max_depth > 1` every module in its dependency closure is
    /// watched on its behalf too.
    pub fn watch(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        let mut shared = self.shared.lock();
        if shared.set.is_root(&path) {
            return false;
        }

        shared.set.add(&path, path.clone());
        if self.engine.config().depth() > 1 {
            for dep in self.engine.dependency_closure(&path) {
                shared.set.add(&path, dep);
            }
        }

        let Shared { set, watcher } = &mut *shared;
        set.sync(watcher);
        debug!("watch"; "watching {} ({} file(s))", path.display(), set.files().len());
        true
    }

    /// Stop watching `path` and cancel every callback registered for it.
    ///
    /// A reload already running for it finishes without callbacks.
    pub fn unwatch(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        let removed = {
            let mut shared = self.shared.lock();
            let Shared { set, watcher } = &mut *shared;
            let removed = set.remove_root(&path);
            set.sync(watcher);
            removed
        };
        self.engine.clear_subscribers(&path);
        removed
    }

    /// Stop watching everything and cancel every callback.
    pub fn unwatch_all(&self) {
        {
            let mut shared = self.shared.lock();
            let Shared { set, watcher } = &mut *shared;
            set.clear();
            set.sync(watcher);
        }
        self.engine.clear_all_subscribers();
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.shared.lock().set.is_root(&normalize_path(path))
    }

    /// Every file observed, roots and their dependencies.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.shared.lock().set.files()
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.shared.lock().set.roots()
    }

    pub fn in_flight(&self, path: &Path) -> bool {
        self.slots.in_flight(&normalize_path(path))
    }

    /// Re-attach directories that reappeared without waiting for a tick.
    pub fn maintain(&self) {
        let _ = self.commands.send(Command::Maintain);
    }

    fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.lock().take()
            && thread.join().is_err()
        {
            log!("watch"; "watch thread panicked");
        }
    }
}

impl Drop for WatchEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchEngine")
            .field("roots", &self.roots())
            .finish()
    }
}

// =============================================================================
// Watch thread
// =============================================================================

struct Worker {
    engine: ReloadEngine,
    shared: Arc<Mutex<Shared>>,
    slots: Arc<ReloadSlots>,
    debouncer: Debouncer,
}

impl Worker {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(PathBuf, Option<ReloadReport>)>();

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Maintain) => self.maintain(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = events.recv() => match event {
                    Ok(event) => {
                        let shared = self.shared.lock();
                        self.debouncer.add_event(&event, |p| shared.set.contains(p));
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                },
                Some((path, report)) = done_rx.recv() => self.finish(path, report, &done_tx),
                _ = tokio::time::sleep(self.debouncer.sleep_duration()) => {
                    if self.debouncer.is_empty() {
                        self.maintain();
                    }
                    for (path, kind) in self.debouncer.take_ready() {
                        self.dispatch(path, kind, &done_tx);
                    }
                }
            }
        }

        debug!("watch"; "watch loop stopped");
    }

    fn maintain(&self) {
        let mut shared = self.shared.lock();
        let Shared { set, watcher } = &mut *shared;
        set.sync(watcher);
    }

    fn dispatch(
        &self,
        path: PathBuf,
        kind: ChangeKind,
        done: &mpsc::UnboundedSender<(PathBuf, Option<ReloadReport>)>,
    ) {
        if kind == ChangeKind::Removed {
            log!("watch"; "{} removed, keeping last good version", path.display());
            return;
        }

        match self.slots.try_begin(&path) {
            Admission::Started => {
                debug!("watch"; "{}: {}", kind.label(), path.display());
                spawn_propagate(self.engine.clone(), path, done.clone());
            }
            Admission::Coalesced => {
                debug!("watch"; "reload of {} in flight, coalesced", path.display());
            }
        }
    }

    fn finish(
        &self,
        path: PathBuf,
        report: Option<ReloadReport>,
        done: &mpsc::UnboundedSender<(PathBuf, Option<ReloadReport>)>,
    ) {
        if report.is_none() {
            log!("watch"; "reload task for {} panicked", path.display());
        }

        // Imports may have changed: follow new dependencies of every root.
        if self.engine.config().depth() > 1 {
            let mut shared = self.shared.lock();
            let Shared { set, watcher } = &mut *shared;
            let mut grew = false;
            for root in set.roots() {
                for dep in self.engine.dependency_closure(&root) {
                    grew |= set.add(&root, dep);
                }
            }
            if grew {
                set.sync(watcher);
            }
        }

        if self.slots.finish(&path) == Completion::Rerun {
            debug!("watch"; "trailing reload: {}", path.display());
            spawn_propagate(self.engine.clone(), path, done.clone());
        }
    }
}

fn spawn_propagate(
    engine: ReloadEngine,
    path: PathBuf,
    done: mpsc::UnboundedSender<(PathBuf, Option<ReloadReport>)>,
) {
    tokio::spawn(async move {
        let target = path.clone();
        let report = tokio::task::spawn_blocking(move || engine.propagate(&target))
            .await
            .ok();
        let _ = done.send((path, report));
    });
}
