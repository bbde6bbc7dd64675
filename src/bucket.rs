//! Per-device binding buckets
//!
//! Every client handle to a device lives in exactly one partition: focused
//! (its client owns the device's focus) or unfocused. Bindings sit in one
//! insertion-ordered arena tagged with their partition, with a secondary
//! index by client, so moving one client's bindings costs O(k) in that
//! client's binding count.

use crate::object::{ClientId, ObjectRef};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Unfocused,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Slot(u64);

#[derive(Debug, Clone)]
struct Entry {
    object: ObjectRef,
    partition: Partition,
}

#[derive(Debug, Default, Clone)]
pub struct ResourceBucket {
    next_slot: u64,
    entries: BTreeMap<Slot, Entry>,
    by_object: HashMap<ObjectRef, Slot>,
    by_client: HashMap<ClientId, BTreeSet<Slot>>,
    focused: BTreeSet<Slot>,
}

impl ResourceBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding. Returns false if the object is already tracked.
    pub fn insert(&mut self, object: ObjectRef, partition: Partition) -> bool {
        if self.by_object.contains_key(&object) {
            return false;
        }

        self.next_slot += 1;
        let slot = Slot(self.next_slot);
        self.entries.insert(slot, Entry { object, partition });
        self.by_object.insert(object, slot);
        self.by_client.entry(object.client).or_default().insert(slot);
        if partition == Partition::Focused {
            self.focused.insert(slot);
        }
        true
    }

    pub fn remove(&mut self, object: ObjectRef) -> Option<Partition> {
        let slot = self.by_object.remove(&object)?;
        let entry = self.entries.remove(&slot)?;
        self.focused.remove(&slot);
        if let Some(slots) = self.by_client.get_mut(&object.client) {
            slots.remove(&slot);
            if slots.is_empty() {
                self.by_client.remove(&object.client);
            }
        }
        Some(entry.partition)
    }

    /// Drops every binding owned by `client`.
    pub fn remove_client(&mut self, client: ClientId) -> Vec<ObjectRef> {
        let Some(slots) = self.by_client.remove(&client) else {
            return Vec::new();
        };

        slots
            .into_iter()
            .filter_map(|slot| {
                self.focused.remove(&slot);
                let entry = self.entries.remove(&slot)?;
                self.by_object.remove(&entry.object);
                Some(entry.object)
            })
            .collect()
    }

    /// Moves the whole focused partition back to unfocused.
    pub fn unfocus_all(&mut self) -> usize {
        let slots = std::mem::take(&mut self.focused);
        for slot in &slots {
            if let Some(entry) = self.entries.get_mut(slot) {
                entry.partition = Partition::Unfocused;
            }
        }
        slots.len()
    }

    /// Moves `client`'s unfocused bindings into the focused partition.
    /// Other clients' bindings are not touched.
    pub fn focus_client(&mut self, client: ClientId) -> usize {
        let Some(slots) = self.by_client.get(&client) else {
            return 0;
        };

        let mut moved = 0;
        for slot in slots {
            if let Some(entry) = self.entries.get_mut(slot) {
                if entry.partition == Partition::Unfocused {
                    entry.partition = Partition::Focused;
                    self.focused.insert(*slot);
                    moved += 1;
                }
            }
        }
        moved
    }

    pub fn focused(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.focused
            .iter()
            .filter_map(move |slot| self.entries.get(slot).map(|e| e.object))
    }

    pub fn unfocused(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.entries
            .values()
            .filter(|e| e.partition == Partition::Unfocused)
            .map(|e| e.object)
    }

    /// Every binding, both partitions, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.entries.values().map(|e| e.object)
    }

    pub fn client_bindings(&self, client: ClientId) -> impl Iterator<Item = ObjectRef> + '_ {
        self.by_client
            .get(&client)
            .into_iter()
            .flatten()
            .filter_map(move |slot| self.entries.get(slot).map(|e| e.object))
    }

    /// Bindings of `client` currently in `partition`.
    pub fn client_partition(
        &self,
        client: ClientId,
        partition: Partition,
    ) -> impl Iterator<Item = ObjectRef> + '_ {
        self.by_client
            .get(&client)
            .into_iter()
            .flatten()
            .filter_map(move |slot| self.entries.get(slot))
            .filter(move |e| e.partition == partition)
            .map(|e| e.object)
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.by_client.contains_key(&client)
    }

    pub fn partition_of(&self, object: ObjectRef) -> Option<Partition> {
        let slot = self.by_object.get(&object)?;
        self.entries.get(slot).map(|e| e.partition)
    }

    pub fn contains(&self, object: ObjectRef) -> bool {
        self.by_object.contains_key(&object)
    }

    pub fn has_focused(&self) -> bool {
        !self.focused.is_empty()
    }

    pub fn focused_len(&self) -> usize {
        self.focused.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
