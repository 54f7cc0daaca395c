//! Name-keyed instance registry.
//!
//! Each name moves through `Starting → Running → Stopping → (gone)`.
//! Transitional states park other callers on a condition variable, so a
//! create for a name that is being stopped waits for the stop to finish.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use super::ServerInstance;

enum Slot {
    Starting,
    Running(Arc<ServerInstance>),
    Stopping,
}

#[derive(Default)]
pub(crate) struct InstanceRegistry {
    slots: Mutex<FxHashMap<String, Slot>>,
    changed: Condvar,
}

pub(crate) enum Claim<'a> {
    Existing(Arc<ServerInstance>),
    Vacant(Reservation<'a>),
}

/// Exclusive right to start an instance under a name.
///
/// Dropped without [`Reservation::publish`], the name is released again.
pub(crate) struct Reservation<'a> {
    registry: &'a InstanceRegistry,
    name: String,
    published: bool,
}

impl Reservation<'_> {
    pub fn publish(mut self, instance: Arc<ServerInstance>) {
        self.registry
            .slots
            .lock()
            .insert(self.name.clone(), Slot::Running(instance));
        self.published = true;
        self.registry.changed.notify_all();
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.registry.slots.lock().remove(&self.name);
            self.registry.changed.notify_all();
        }
    }
}

impl InstanceRegistry {
    /// Return the running instance, or reserve the name.
    pub fn claim(&self, name: &str) -> Claim<'_> {
        let mut slots = self.slots.lock();
        loop {
            match slots.get(name) {
                Some(Slot::Running(instance)) => return Claim::Existing(Arc::clone(instance)),
                Some(_) => self.changed.wait(&mut slots),
                None => {
                    slots.insert(name.to_string(), Slot::Starting);
                    return Claim::Vacant(Reservation {
                        registry: self,
                        name: name.to_string(),
                        published: false,
                    });
                }
            }
        }
    }

    /// Mark a running instance as stopping and hand it out.
    ///
    /// `None` if there is no such instance, including when a concurrent
    /// stop got there first.
    pub fn begin_stop(&self, name: &str) -> Option<Arc<ServerInstance>> {
        let mut slots = self.slots.lock();
        loop {
            match slots.get(name) {
                Some(Slot::Running(_)) => {
                    return match slots.insert(name.to_string(), Slot::Stopping) {
                        Some(Slot::Running(instance)) => Some(instance),
                        _ => None,
                    };
                }
                Some(_) => self.changed.wait(&mut slots),
                None => return None,
            }
        }
    }

    pub fn finish_stop(&self, name: &str) {
        self.slots.lock().remove(name);
        self.changed.notify_all();
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServerInstance>> {
        match self.slots.lock().get(name) {
            Some(Slot::Running(instance)) => Some(Arc::clone(instance)),
            _ => None,
        }
    }

    /// Running instances, sorted by name.
    pub fn running(&self) -> Vec<Arc<ServerInstance>> {
        let mut instances: Vec<_> = self
            .slots
            .lock()
            .values()
            .filter_map(|slot| match slot {
                Slot::Running(instance) => Some(Arc::clone(instance)),
                _ => None,
            })
            .collect();
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        instances
    }

    /// Every name with a slot, running or in transition.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.slots.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
