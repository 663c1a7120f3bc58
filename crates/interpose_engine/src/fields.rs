//! Identity-keyed auxiliary storage attached to managed objects.
//!
//! The [`AdditionalFieldStore`] lets hooks stash per-instance state (flags,
//! captured originals, counters) on objects they do not own, and read it back
//! from a later phase or from an unrelated hook on the same object.
//!
//! # Lifetime
//!
//! Slots are keyed by [`ObjectId`] and hold only a weak reference to their
//! object, so the store never keeps an object alive. Once the last strong
//! handle is dropped, the object's fields can no longer be reached (every
//! lookup requires a live handle). Their memory is reclaimed by
//! [`purge`](AdditionalFieldStore::purge), which also runs automatically every
//! `purge_interval` writes.
//!
//! Because a weak reference pins the allocation, an object's address cannot be
//! reused while its slot exists, so identity keys never collide.
//!
//! Values stored here are strong references. Storing an object inside its own
//! fields keeps it alive until the field is removed.
//!
//! # Concurrency
//!
//! The outer map is read-mostly; each object slot carries its own lock, so
//! writes to different objects do not contend beyond slot creation. Concurrent
//! writes to the same key are last-write-wins.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::value::{ObjectId, ObjectRef, Value, WeakObjectRef};

/// Default number of writes between automatic purges.
pub const DEFAULT_PURGE_INTERVAL: usize = 256;

struct FieldSlot {
    owner: WeakObjectRef,
    fields: RwLock<HashMap<String, Value>>,
}

/// Weakly-keyed `(object, key) -> value` storage.
pub struct AdditionalFieldStore {
    slots: RwLock<HashMap<ObjectId, Arc<FieldSlot>>>,
    writes: AtomicUsize,
    purge_interval: usize,
}

impl Default for AdditionalFieldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AdditionalFieldStore {
    /// Creates an empty store with the default purge interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }

    /// Creates an empty store that purges dead slots every `interval` writes.
    ///
    /// An interval of `0` disables automatic purging.
    #[must_use]
    pub fn with_purge_interval(interval: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            purge_interval: interval,
        }
    }

    /// Returns the value stored under `key` for `object`.
    ///
    /// Unset keys return `None`, never a default.
    #[must_use]
    pub fn get(&self, object: &ObjectRef, key: &str) -> Option<Value> {
        let slot = self.slot(object)?;
        let fields = slot.fields.read();
        fields.get(key).cloned()
    }

    /// Stores `value` under `key` for `object`, returning the previous value.
    pub fn set(&self, object: &ObjectRef, key: &str, value: impl Into<Value>) -> Option<Value> {
        let slot = self.slot_or_insert(object);
        let previous = slot.fields.write().insert(key.to_owned(), value.into());
        drop(slot);
        self.record_write();
        previous
    }

    /// Removes `key` for `object`, returning the removed value.
    pub fn remove(&self, object: &ObjectRef, key: &str) -> Option<Value> {
        let slot = self.slot(object)?;
        slot.fields.write().remove(key)
    }

    /// Removes every field of `object`.
    pub fn clear(&self, object: &ObjectRef) {
        self.slots.write().remove(&object.id());
    }

    /// Returns `true` if `object` has a value under `key`.
    #[must_use]
    pub fn contains(&self, object: &ObjectRef, key: &str) -> bool {
        self.slot(object)
            .is_some_and(|slot| slot.fields.read().contains_key(key))
    }

    /// Drops the slots of objects that are no longer alive.
    ///
    /// Returns the number of slots removed.
    pub fn purge(&self) -> usize {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| slot.owner.is_alive());
        let removed = before - slots.len();
        if removed > 0 {
            tracing::trace!(target: "interpose", removed, "purged dead field slots");
        }
        removed
    }

    /// Returns the number of live objects with at least one slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.owner.is_alive())
            .count()
    }

    /// Returns `true` if no live object has fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, object: &ObjectRef) -> Option<Arc<FieldSlot>> {
        self.slots.read().get(&object.id()).cloned()
    }

    fn slot_or_insert(&self, object: &ObjectRef) -> Arc<FieldSlot> {
        if let Some(slot) = self.slot(object) {
            return slot;
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(object.id()).or_insert_with(|| {
            Arc::new(FieldSlot {
                owner: object.downgrade(),
                fields: RwLock::new(HashMap::new()),
            })
        }))
    }

    fn record_write(&self) {
        if self.purge_interval == 0 {
            return;
        }
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.purge_interval == 0 {
            self.purge();
        }
    }
}

impl core::fmt::Debug for AdditionalFieldStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdditionalFieldStore")
            .field("slots", &self.slots.read().len())
            .field("purge_interval", &self.purge_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TypeRef;
    use crate::value::ManagedObject;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug)]
    struct Thing;

    impl ManagedObject for Thing {
        fn runtime_type(&self) -> TypeRef {
            TypeRef::named("test.Thing")
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = AdditionalFieldStore::new();
        let obj = ObjectRef::new(Thing);

        assert_eq!(store.set(&obj, "k", 7), None);
        assert_eq!(store.get(&obj, "k"), Some(Value::Int(7)));
        assert_eq!(store.set(&obj, "k", 8), Some(Value::Int(7)));
        assert_eq!(store.get(&obj, "k"), Some(Value::Int(8)));
    }

    #[test]
    fn unset_key_is_absent() {
        let store = AdditionalFieldStore::new();
        let obj = ObjectRef::new(Thing);

        assert_eq!(store.get(&obj, "missing"), None);
        store.set(&obj, "present", true);
        assert_eq!(store.get(&obj, "missing"), None);
        assert!(!store.contains(&obj, "missing"));
        assert!(store.contains(&obj, "present"));
    }

    #[test]
    fn fields_are_per_object_identity() {
        let store = AdditionalFieldStore::new();
        let a = ObjectRef::new(Thing);
        let b = ObjectRef::new(Thing);

        store.set(&a, "k", "a");
        assert_eq!(store.get(&b, "k"), None);
        assert_eq!(store.get(&a.clone(), "k"), Some(Value::from("a")));
    }

    #[test]
    fn remove_and_clear() {
        let store = AdditionalFieldStore::new();
        let obj = ObjectRef::new(Thing);
        store.set(&obj, "a", 1);
        store.set(&obj, "b", 2);

        assert_eq!(store.remove(&obj, "a"), Some(Value::Int(1)));
        assert_eq!(store.get(&obj, "a"), None);

        store.clear(&obj);
        assert_eq!(store.get(&obj, "b"), None);
    }

    #[test]
    fn store_does_not_keep_objects_alive() {
        let store = AdditionalFieldStore::with_purge_interval(0);
        let obj = ObjectRef::new(Thing);
        let weak = obj.downgrade();
        store.set(&obj, "k", 1);
        assert_eq!(store.len(), 1);

        drop(obj);
        assert!(!weak.is_alive());
        assert_eq!(store.len(), 0);
        assert_eq!(store.purge(), 1);
        assert_eq!(store.purge(), 0);
    }

    #[test]
    fn automatic_purge_runs_on_interval() {
        let store = AdditionalFieldStore::with_purge_interval(2);
        let dead = ObjectRef::new(Thing);
        store.set(&dead, "k", 1);
        drop(dead);

        let live = ObjectRef::new(Thing);
        // Second write triggers a purge of the dead slot.
        store.set(&live, "k", 1);

        assert_eq!(store.slots.read().len(), 1);
        assert_eq!(store.get(&live, "k"), Some(Value::Int(1)));
    }

    #[test]
    fn distinct_keys_written_concurrently_all_survive() {
        let store = Arc::new(AdditionalFieldStore::new());
        let obj = ObjectRef::new(Thing);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let obj = obj.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for n in 0..50 {
                        store.set(&obj, &format!("t{i}"), i64::from(n));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        for i in 0..8 {
            assert_eq!(store.get(&obj, &format!("t{i}")), Some(Value::Int(49)));
        }
    }
}
