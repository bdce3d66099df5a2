//! Containers - fixed-capacity ordered item slots

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{InventoryError, InventoryResult};
use crate::item::ItemId;
use crate::network::ClientId;

/// Slot index inside a container
pub type SlotId = u16;

/// Unique identifier of a registered container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct InventoryId(pub u64);

impl InventoryId {
    /// Not registered yet
    pub const NONE: InventoryId = InventoryId(0);

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for InventoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inventory#{}", self.0)
    }
}

/// Identifier of the world object a container is attached to
/// (a player, a campfire, a storage box)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct OwnerRef(pub u64);

/// Fixed-capacity container of item slots.
///
/// `slots[i]` is either empty or holds an item whose slot id is `i`. The
/// container only stores ids; item state lives in the item registry.
#[derive(Debug, Clone)]
pub struct Container {
    id: InventoryId,
    slot_limit: SlotId,
    slots: Vec<Option<ItemId>>,
    owner: OwnerRef,
    dirty: bool,
    connections: BTreeSet<ClientId>,
}

impl Container {
    /// Create an unregistered container
    pub fn new(owner: OwnerRef, slot_limit: SlotId) -> Self {
        Self {
            id: InventoryId::NONE,
            slot_limit,
            slots: vec![None; slot_limit as usize],
            owner,
            dirty: false,
            connections: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> InventoryId {
        self.id
    }

    pub fn slot_limit(&self) -> SlotId {
        self.slot_limit
    }

    pub fn owner(&self) -> OwnerRef {
        self.owner
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Item in `slot`, if any. Out-of-range slots read as empty.
    pub fn get_from_slot(&self, slot: SlotId) -> Option<ItemId> {
        self.slots.get(slot as usize).copied().flatten()
    }

    /// Number of occupied slots
    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Number of empty slots
    pub fn free_slots(&self) -> usize {
        self.slots.len() - self.used_slots()
    }

    /// Lowest empty slot
    pub fn find_empty_slot(&self) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.is_none())
            .map(|i| i as SlotId)
    }

    /// Slot holding `item`
    pub fn find_item(&self, item: ItemId) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| *s == Some(item))
            .map(|i| i as SlotId)
    }

    /// Occupied slots in index order
    pub fn items(&self) -> impl Iterator<Item = (SlotId, ItemId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|item| (i as SlotId, item)))
    }

    /// Reject slots at or beyond the slot limit
    pub fn check_slot(&self, slot: SlotId) -> InventoryResult<()> {
        if slot >= self.slot_limit {
            return Err(InventoryError::CapacityExceeded {
                inventory: self.id,
                slot,
                slot_limit: self.slot_limit,
            });
        }
        Ok(())
    }

    // ---- Observers ----

    /// Start replicating this container to `client`
    pub fn add_connection(&mut self, client: ClientId) -> bool {
        self.connections.insert(client)
    }

    pub fn remove_connection(&mut self, client: ClientId) -> bool {
        self.connections.remove(&client)
    }

    pub fn is_connected(&self, client: ClientId) -> bool {
        self.connections.contains(&client)
    }

    pub fn connections(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.connections.iter().copied()
    }

    pub fn has_connections(&self) -> bool {
        !self.connections.is_empty()
    }

    // ---- Registry-only mutation ----

    pub(crate) fn set_id(&mut self, id: InventoryId) {
        self.id = id;
    }

    /// Write a slot; the caller keeps the item's back-reference in sync
    pub(crate) fn set_slot(&mut self, slot: SlotId, item: Option<ItemId>) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            *entry = item;
        }
    }

    /// Returns true when the container was clean before
    pub(crate) fn mark_dirty(&mut self) -> bool {
        !std::mem::replace(&mut self.dirty, true)
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Resize the slot array. Shrinking over an occupied slot is rejected.
    pub(crate) fn set_slot_limit(&mut self, slot_limit: SlotId) -> InventoryResult<()> {
        if let Some((slot, _)) = self.items().find(|(slot, _)| *slot >= slot_limit) {
            return Err(InventoryError::SlotOccupied {
                inventory: self.id,
                slot,
            });
        }
        self.slot_limit = slot_limit;
        self.slots.resize(slot_limit as usize, None);
        Ok(())
    }

    /// Drop every slot reference, returning what was held
    pub(crate) fn take_all(&mut self) -> Vec<(SlotId, ItemId)> {
        let held: Vec<_> = self.items().collect();
        self.slots.iter_mut().for_each(|s| *s = None);
        held
    }
}
