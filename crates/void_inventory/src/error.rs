//! Inventory error types

use thiserror::Error;

use crate::container::{InventoryId, SlotId};
use crate::item::ItemId;

/// Errors raised by registry and container operations.
///
/// Every variant leaves the inventory state exactly as it was before the
/// failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Unknown item definition: {0}")]
    UnknownDefinition(String),

    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Unknown container: {0}")]
    UnknownContainer(InventoryId),

    #[error("Slot {slot} is outside container {inventory} (slot limit {slot_limit})")]
    CapacityExceeded {
        inventory: InventoryId,
        slot: SlotId,
        slot_limit: SlotId,
    },

    #[error("Item {item} cannot stack with item {other}")]
    IncompatibleStack { item: ItemId, other: ItemId },

    #[error("Slot {slot} of container {inventory} is empty")]
    EmptySlot { inventory: InventoryId, slot: SlotId },

    #[error("Slot {slot} of container {inventory} is occupied")]
    SlotOccupied { inventory: InventoryId, slot: SlotId },

    #[error("Item {0} has fewer than two units and cannot be split")]
    Unsplittable(ItemId),
}

impl InventoryError {
    /// Whether the error came from an id that no longer resolves
    pub fn is_stale_reference(&self) -> bool {
        matches!(self, Self::UnknownItem(_) | Self::UnknownContainer(_))
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;
