//! Container operations
//!
//! Slots are always scanned in ascending index order. `stack` first merges
//! into compatible stacks, lowest slot first, and only then takes the lowest
//! empty slot. Every failing operation leaves both containers untouched.

use crate::container::{Container, InventoryId, SlotId};
use crate::error::{InventoryError, InventoryResult};
use crate::item::ItemId;
use crate::system::InventorySystem;

impl InventorySystem {
    fn container_or_err(&self, id: InventoryId) -> InventoryResult<&Container> {
        self.containers.get(id).ok_or(InventoryError::UnknownContainer(id))
    }

    fn occupied_slot(&self, inventory: InventoryId, slot: SlotId) -> InventoryResult<ItemId> {
        let container = self.container_or_err(inventory)?;
        container.check_slot(slot)?;
        container
            .get_from_slot(slot)
            .ok_or(InventoryError::EmptySlot { inventory, slot })
    }

    fn can_stack(&self, target: ItemId, source: ItemId) -> bool {
        match (self.items.get(target), self.items.get(source)) {
            (Some(target), Some(source)) => target.can_stack_with(source),
            _ => false,
        }
    }

    /// Add up to `amount` units to `target`, returning how many fit
    fn merge_into(&mut self, target: ItemId, amount: u32) -> u32 {
        let Some(item) = self.items.get_mut(target) else {
            return 0;
        };
        let moved = amount - item.add(amount);
        if moved > 0 {
            self.mark_item_dirty(target);
        }
        moved
    }

    /// Stack an item into a container.
    ///
    /// Returns the quantity that could not be placed; zero means the item
    /// was fully absorbed (merged away or moved into an empty slot). On a
    /// partial result the item keeps the remainder and stays where it was.
    pub fn stack(&mut self, inventory: InventoryId, item: ItemId) -> InventoryResult<u32> {
        let targets: Vec<ItemId> = self
            .container_or_err(inventory)?
            .items()
            .map(|(_, id)| id)
            .filter(|id| *id != item)
            .collect();
        let source = self.items.get(item).ok_or(InventoryError::UnknownItem(item))?;
        let already_here = source.container() == Some(inventory);
        let original = source.stack_size();
        let mut remaining = original;

        for target in targets {
            if remaining == 0 {
                break;
            }
            if self.can_stack(target, item) {
                remaining -= self.merge_into(target, remaining);
            }
        }

        if remaining == 0 {
            self.remove_item(item);
            return Ok(0);
        }

        if remaining != original {
            if let Some(source) = self.items.get_mut(item) {
                source.set_stack_size(remaining);
            }
            self.mark_item_dirty(item);
        }

        if already_here {
            return Ok(0);
        }

        match self.containers.get(inventory).and_then(|c| c.find_empty_slot()) {
            Some(slot) => {
                self.detach(item);
                self.place(inventory, slot, item);
                Ok(0)
            }
            None => Ok(remaining),
        }
    }

    /// Move a whole stack between slots of the same or different containers.
    ///
    /// An empty destination receives the item; a compatible one absorbs as
    /// much as it can; an incompatible one rejects the move.
    pub fn move_item(
        &mut self,
        from: InventoryId,
        from_slot: SlotId,
        to: InventoryId,
        to_slot: SlotId,
    ) -> InventoryResult<()> {
        let source = self.occupied_slot(from, from_slot)?;
        let destination = self.container_or_err(to)?;
        destination.check_slot(to_slot)?;

        if from == to && from_slot == to_slot {
            return Ok(());
        }

        match destination.get_from_slot(to_slot) {
            None => {
                self.detach(source);
                self.place(to, to_slot, source);
            }
            Some(target) => {
                if !self.can_stack(target, source) {
                    return Err(InventoryError::IncompatibleStack {
                        item: source,
                        other: target,
                    });
                }

                let amount = self.items.get(source).map(|i| i.stack_size()).unwrap_or(0);
                let moved = self.merge_into(target, amount);
                if moved == amount {
                    self.remove_item(source);
                } else if moved > 0 {
                    if let Some(item) = self.items.get_mut(source) {
                        item.set_stack_size(amount - moved);
                    }
                    self.mark_item_dirty(source);
                }
            }
        }
        Ok(())
    }

    /// Move within one container
    pub fn move_within(&mut self, inventory: InventoryId, from_slot: SlotId, to_slot: SlotId) -> InventoryResult<()> {
        self.move_item(inventory, from_slot, inventory, to_slot)
    }

    /// Move half of a stack (rounded down) into an empty slot as a new item
    pub fn split(
        &mut self,
        from: InventoryId,
        from_slot: SlotId,
        to: InventoryId,
        to_slot: SlotId,
    ) -> InventoryResult<ItemId> {
        let source = self.occupied_slot(from, from_slot)?;
        let destination = self.container_or_err(to)?;
        destination.check_slot(to_slot)?;
        if destination.get_from_slot(to_slot).is_some() {
            return Err(InventoryError::SlotOccupied {
                inventory: to,
                slot: to_slot,
            });
        }

        let amount = self.items.get(source).map(|i| i.stack_size()).unwrap_or(0);
        if amount < 2 {
            return Err(InventoryError::Unsplittable(source));
        }
        let half = amount / 2;

        let portion = self.duplicate_item(source)?;
        if let Some(item) = self.items.get_mut(portion) {
            item.set_stack_size(half);
        }
        if let Some(item) = self.items.get_mut(source) {
            item.set_stack_size(amount - half);
        }
        self.mark_item_dirty(source);
        self.place(to, to_slot, portion);

        Ok(portion)
    }

    /// Stack the item in `from_slot` anywhere in `to`.
    ///
    /// Returns the quantity left behind in the source slot.
    pub fn transfer(&mut self, from: InventoryId, from_slot: SlotId, to: InventoryId) -> InventoryResult<u32> {
        let source = self.occupied_slot(from, from_slot)?;
        self.container_or_err(to)?;
        self.stack(to, source)
    }

    /// Empty a slot, returning the detached item
    pub fn clear_slot(&mut self, inventory: InventoryId, slot: SlotId) -> InventoryResult<Option<ItemId>> {
        let container = self.container_or_err(inventory)?;
        container.check_slot(slot)?;
        let held = container.get_from_slot(slot);
        if let Some(item) = held {
            self.detach(item);
        }
        Ok(held)
    }

    /// Item in a slot
    pub fn get_from_slot(&self, inventory: InventoryId, slot: SlotId) -> Option<ItemId> {
        self.containers.get(inventory).and_then(|c| c.get_from_slot(slot))
    }

    /// Detach every item of a container and hand them to the caller
    pub fn remove_all(&mut self, inventory: InventoryId) -> InventoryResult<Vec<ItemId>> {
        let held: Vec<ItemId> = self
            .container_or_err(inventory)?
            .items()
            .map(|(_, item)| item)
            .collect();
        for item in &held {
            self.detach(*item);
        }
        Ok(held)
    }

    /// Stack an item into a container; alias of [`stack`](Self::stack)
    /// used by gameplay code handing out loot.
    pub fn give_item(&mut self, inventory: InventoryId, item: ItemId) -> InventoryResult<u32> {
        self.stack(inventory, item)
    }

    /// Put an item into one specific empty slot and notify observers at once
    pub fn give_to_slot(&mut self, inventory: InventoryId, item: ItemId, slot: SlotId) -> InventoryResult<()> {
        let container = self.container_or_err(inventory)?;
        container.check_slot(slot)?;
        if container.get_from_slot(slot).is_some() {
            return Err(InventoryError::SlotOccupied { inventory, slot });
        }
        if !self.items.contains(item) {
            return Err(InventoryError::UnknownItem(item));
        }

        self.detach(item);
        self.place(inventory, slot, item);

        if self.is_server() {
            self.send_give_item(inventory, slot)?;
        }
        Ok(())
    }

    /// Create `amount` units of a definition and stack them into a container
    /// in max-size batches. Returns the undelivered quantity; undelivered
    /// units are never created.
    pub fn give_amount(&mut self, inventory: InventoryId, key: &str, amount: u32) -> InventoryResult<u32> {
        self.container_or_err(inventory)?;
        let max_stack = self
            .catalog()
            .get(key)
            .map(|def| def.max_stack.max(1))
            .ok_or_else(|| InventoryError::UnknownDefinition(key.to_string()))?;

        let mut remaining = amount;
        while remaining > 0 {
            let batch = remaining.min(max_stack);
            let item = self.create_item(key, 0)?;
            if let Some(created) = self.items.get_mut(item) {
                created.set_stack_size(batch);
            }

            let left = self.stack(inventory, item)?;
            if left > 0 {
                self.remove_item(item);
                remaining = remaining - batch + left;
                break;
            }
            remaining -= batch;
        }
        Ok(remaining)
    }
}
