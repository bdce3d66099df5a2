//! Canonical item and container tables

use std::collections::BTreeMap;
use void_core::IdCounter;

use crate::container::{Container, InventoryId};
use crate::item::{Item, ItemId};

/// Owns every live item instance
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: BTreeMap<ItemId, Item>,
    ids: IdCounter,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a requested id: zero allocates, anything else is reserved
    pub(crate) fn claim_id(&mut self, requested: u64) -> ItemId {
        if requested == 0 {
            ItemId(self.ids.next())
        } else {
            self.ids.observe(requested);
            ItemId(requested)
        }
    }

    pub(crate) fn insert(&mut self, item: Item) {
        self.ids.observe(item.id().raw());
        self.items.insert(item.id(), item);
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Option<Item> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Last id handed out or observed
    pub fn last_id(&self) -> u64 {
        self.ids.last()
    }

    /// Make the counter consistent with the ids currently stored
    pub(crate) fn reassign(&mut self) {
        let highest = self.items.keys().next_back().map(ItemId::raw).unwrap_or(0);
        self.ids.observe(highest);
    }
}

/// Owns every registered container
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: BTreeMap<InventoryId, Container>,
    ids: IdCounter,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container, allocating an id unless `requested` is nonzero.
    ///
    /// Registering over an existing id replaces the old entry.
    pub(crate) fn register(&mut self, mut container: Container, requested: u64) -> InventoryId {
        let id = if requested == 0 {
            InventoryId(self.ids.next())
        } else {
            self.ids.observe(requested);
            InventoryId(requested)
        };
        container.set_id(id);
        self.containers.insert(id, container);
        id
    }

    pub(crate) fn remove(&mut self, id: InventoryId) -> Option<Container> {
        self.containers.remove(&id)
    }

    pub fn get(&self, id: InventoryId) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: InventoryId) -> Option<&mut Container> {
        self.containers.get_mut(&id)
    }

    pub fn contains(&self, id: InventoryId) -> bool {
        self.containers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Container> {
        self.containers.values_mut()
    }

    pub fn last_id(&self) -> u64 {
        self.ids.last()
    }

    pub(crate) fn reassign(&mut self) {
        let highest = self
            .containers
            .keys()
            .next_back()
            .map(InventoryId::raw)
            .unwrap_or(0);
        self.ids.observe(highest);
    }
}
