//! Inventory lifecycle events
//!
//! The inventory system queues these as mutations happen. UI and gameplay
//! observers drain them once per frame with
//! [`InventorySystem::drain_events`](crate::InventorySystem::drain_events).

use crate::container::{InventoryId, SlotId};
use crate::item::ItemId;

/// Inventory events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// Item instance created and registered
    ItemCreated { item: ItemId, definition: String },
    /// Item instance removed from the registry
    ItemRemoved { item: ItemId },
    /// Contents of a slot changed (item placed, cleared or restacked)
    SlotChanged { inventory: InventoryId, slot: SlotId },
    /// Orphan sweep reclaimed detached items
    OrphansReclaimed { count: usize },
}
