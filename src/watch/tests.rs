use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;

use super::debouncer::{Debouncer, is_temp_file};
use super::roots::WatchSet;
use super::types::ChangeKind;
use super::WatchEngine;
use crate::config::ReloadConfig;
use crate::reload::ReloadEngine;
use crate::route::HandlerRegistry;
use crate::utils::normalize_path;

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn accept_all(_: &Path) -> bool {
    true
}

// =============================================================================
// Debouncer
// =============================================================================

#[test]
fn test_debouncer_empty() {
    let debouncer = Debouncer::new(Duration::from_millis(50));
    assert!(debouncer.is_empty());
    assert_eq!(debouncer.sleep_duration(), super::debouncer::IDLE_TICK);
}

#[test]
fn test_debouncer_dedup_rules() {
    let mut debouncer = Debouncer::new(Duration::ZERO);

    // remove then recreate collapses to a change
    debouncer.add_event(&make_event(vec!["/w/a.toml"], remove_kind()), accept_all);
    debouncer.add_event(&make_event(vec!["/w/a.toml"], create_kind()), accept_all);
    // modify then remove is a removal
    debouncer.add_event(&make_event(vec!["/w/b.toml"], modify_kind()), accept_all);
    debouncer.add_event(&make_event(vec!["/w/b.toml"], remove_kind()), accept_all);
    // created then removed is nothing
    debouncer.add_event(&make_event(vec!["/w/c.toml"], create_kind()), accept_all);
    debouncer.add_event(&make_event(vec!["/w/c.toml"], remove_kind()), accept_all);
    // bursts of modifications stay one entry
    for _ in 0..3 {
        debouncer.add_event(&make_event(vec!["/w/d.toml"], modify_kind()), accept_all);
    }

    let ready = debouncer.take_ready();
    assert_eq!(
        ready,
        vec![
            (PathBuf::from("/w/a.toml"), ChangeKind::Modified),
            (PathBuf::from("/w/b.toml"), ChangeKind::Removed),
            (PathBuf::from("/w/d.toml"), ChangeKind::Modified),
        ]
    );
    assert!(debouncer.is_empty());
}

#[test]
fn test_debouncer_ignores_noise() {
    let mut debouncer = Debouncer::new(Duration::ZERO);
    debouncer.add_event(&make_event(vec!["/w/a.toml"], metadata_kind()), accept_all);
    debouncer.add_event(
        &make_event(vec!["/w/.a.toml.swp", "/w/a.toml~", "/w/a.bak"], modify_kind()),
        accept_all,
    );
    debouncer.add_event(&make_event(vec!["/w/other.toml"], modify_kind()), |p| {
        p.ends_with("a.toml")
    });
    assert!(debouncer.is_empty());
}

#[test]
fn test_debouncer_waits_for_settle() {
    let mut debouncer = Debouncer::new(Duration::from_secs(60));
    debouncer.add_event(&make_event(vec!["/w/a.toml"], modify_kind()), accept_all);

    assert!(debouncer.take_ready().is_empty());
    assert!(!debouncer.is_empty());
    assert!(debouncer.sleep_duration() > Duration::from_secs(50));
}

#[test]
fn test_temp_files() {
    assert!(is_temp_file(Path::new("/w/.routes.toml.swp")));
    assert!(is_temp_file(Path::new("/w/routes.toml~")));
    assert!(is_temp_file(Path::new("/w/#routes.toml#")));
    assert!(is_temp_file(Path::new("/w/routes.tmp")));
    assert!(!is_temp_file(Path::new("/w/routes.toml")));
}

// =============================================================================
// WatchSet
// =============================================================================

#[test]
fn test_watch_set_roots_and_shared_files() {
    let mut set = WatchSet::default();
    let a = PathBuf::from("/w/a.toml");
    let b = PathBuf::from("/w/b.toml");
    let shared = PathBuf::from("/w/shared.toml");

    assert!(set.add(&a, a.clone()));
    assert!(set.add(&a, shared.clone()));
    assert!(set.add(&b, b.clone()));
    assert!(!set.add(&b, shared.clone()));

    assert!(set.is_root(&a));
    assert!(!set.is_root(&shared));
    assert_eq!(set.roots(), vec![a.clone(), b.clone()]);

    assert!(set.remove_root(&a));
    assert!(!set.contains(&a));
    assert!(set.contains(&shared));

    assert!(set.remove_root(&b));
    assert!(set.files().is_empty());
    assert!(!set.remove_root(&b));
}

// =============================================================================
// Engine
// =============================================================================

fn engine(temp: &TempDir, depth: usize) -> (PathBuf, ReloadEngine) {
    let root = normalize_path(temp.path());
    let engine = ReloadEngine::new(
        ReloadConfig {
            max_depth: depth,
            settle_ms: 20,
            ..ReloadConfig::default()
        },
        HandlerRegistry::new(),
        crate::reload::log_errors(),
    );
    (root, engine)
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    done()
}

#[test]
fn test_watch_is_idempotent_and_follows_dependencies() {
    let temp = TempDir::new().unwrap();
    let (root, reload) = engine(&temp, 3);
    fs::write(root.join("shared.toml"), "[handlers.h]\n").unwrap();
    fs::write(root.join("api.toml"), "use = \"./shared\"\n").unwrap();
    let api = root.join("api.toml");
    reload.preload(&api).unwrap();

    let watcher = WatchEngine::start(reload).unwrap();
    assert!(watcher.watch(&api));
    assert!(!watcher.watch(&api));
    assert!(watcher.is_watching(&api));
    assert_eq!(
        watcher.watched_files(),
        vec![api.clone(), root.join("shared.toml")]
    );

    assert!(watcher.unwatch(&api));
    assert!(!watcher.is_watching(&api));
    assert!(watcher.watched_files().is_empty());
}

#[test]
fn test_depth_one_watches_root_only() {
    let temp = TempDir::new().unwrap();
    let (root, reload) = engine(&temp, 1);
    fs::write(root.join("shared.toml"), "").unwrap();
    fs::write(root.join("api.toml"), "use = \"./shared\"\n").unwrap();
    let api = root.join("api.toml");
    reload.preload(&api).unwrap();

    let watcher = WatchEngine::start(reload).unwrap();
    watcher.watch(&api);
    assert_eq!(watcher.watched_files(), vec![api]);
}

#[test]
fn test_change_triggers_callback() {
    let temp = TempDir::new().unwrap();
    let (root, reload) = engine(&temp, 3);
    let api = root.join("api.toml");
    fs::write(&api, "[handlers.msg]\nbody = \"h1\"\n").unwrap();
    reload.preload(&api).unwrap();

    let bodies = Arc::new(Mutex::new(Vec::new()));
    let sink = bodies.clone();
    reload.subscribe(
        &api,
        "api",
        Arc::new(move |module| {
            sink.lock().push(module.handler("msg").unwrap().body.clone());
            Ok(())
        }),
    );

    let watcher = WatchEngine::start(reload.clone()).unwrap();
    watcher.watch(&api);
    fs::write(&api, "[handlers.msg]\nbody = \"h2\"\n").unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        bodies.lock().last().is_some_and(|b| b == "h2")
    }));
    assert!(reload.version(&api).unwrap() >= 2);
}

#[test]
fn test_dependency_change_reaches_root() {
    let temp = TempDir::new().unwrap();
    let (root, reload) = engine(&temp, 3);
    let shared = root.join("shared.toml");
    let api = root.join("api.toml");
    fs::write(&shared, "[handlers.msg]\nbody = \"v1\"\n").unwrap();
    fs::write(&api, "use = \"./shared\"\n").unwrap();
    reload.preload(&api).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    reload.subscribe(
        &api,
        "api",
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    let watcher = WatchEngine::start(reload.clone()).unwrap();
    watcher.watch(&api);
    fs::write(&shared, "[handlers.msg]\nbody = \"v2\"\n").unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        reload
            .current(&api)
            .is_some_and(|m| m.handler("msg").is_some_and(|h| h.body == "v2"))
    }));
    assert!(calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_unwatch_cancels_callbacks() {
    let temp = TempDir::new().unwrap();
    let (root, reload) = engine(&temp, 3);
    let api = root.join("api.toml");
    fs::write(&api, "").unwrap();
    reload.preload(&api).unwrap();
    reload.subscribe(&api, "api", Arc::new(|_| Ok(())));

    let watcher = WatchEngine::start(reload.clone()).unwrap();
    watcher.watch(&api);
    watcher.unwatch(&api);
    assert_eq!(reload.subscriber_count(&api), 0);

    reload.subscribe(&api, "again", Arc::new(|_| Ok(())));
    watcher.watch(&api);
    watcher.unwatch_all();
    assert_eq!(reload.subscriber_count(&api), 0);
    assert!(watcher.roots().is_empty());
}

#[test]
fn test_drop_stops_thread() {
    let temp = TempDir::new().unwrap();
    let (_, reload) = engine(&temp, 3);
    let watcher = WatchEngine::start(reload).unwrap();
    drop(watcher);
}
