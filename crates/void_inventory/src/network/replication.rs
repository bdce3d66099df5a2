//! Server push and client request handling

use super::{ClientId, InventoryMessage, ProtocolResult, Recipient};
use crate::container::{InventoryId, SlotId};
use crate::error::{InventoryError, InventoryResult};
use crate::event::InventoryEvent;
use crate::item::ItemId;
use crate::snapshot::ItemRecord;
use crate::system::InventorySystem;

impl InventorySystem {
    fn observers(&self, inventory: InventoryId) -> Vec<ClientId> {
        self.containers
            .get(inventory)
            .map(|c| c.connections().collect())
            .unwrap_or_default()
    }

    /// Send every dirty item of every dirty container to its observers.
    ///
    /// Containers go out in the order they became dirty, items in slot
    /// order. Dirty flags are cleared whether or not anyone is observing.
    /// Returns the number of messages queued.
    pub fn flush_dirty(&mut self) -> usize {
        let mut sent = 0;

        for inventory in self.take_dirty_list() {
            let Some(container) = self.containers.get(inventory) else {
                continue;
            };

            let dirty: Vec<ItemId> = container
                .items()
                .map(|(_, id)| id)
                .filter(|id| self.items.get(*id).map(|i| i.is_dirty()).unwrap_or(false))
                .collect();
            let items: Vec<ItemRecord> = dirty
                .iter()
                .filter_map(|id| self.items.get(*id).map(ItemRecord::from_item))
                .collect();
            let observers: Vec<ClientId> = container.connections().collect();

            for id in dirty {
                if let Some(item) = self.items.get_mut(id) {
                    item.set_dirty(false);
                }
            }
            if let Some(container) = self.containers.get_mut(inventory) {
                container.clear_dirty();
            }

            if items.is_empty() || observers.is_empty() {
                continue;
            }

            log::debug!("Flushing {} dirty items of {}", items.len(), inventory);
            self.send(
                Recipient::Clients(observers),
                &InventoryMessage::DirtyItems { inventory, items },
            );
            sent += 1;
        }
        sent
    }

    /// Send the item in `slot` to every observer at once
    pub fn send_give_item(&mut self, inventory: InventoryId, slot: SlotId) -> InventoryResult<()> {
        let container = self
            .containers
            .get(inventory)
            .ok_or(InventoryError::UnknownContainer(inventory))?;
        let item = container
            .get_from_slot(slot)
            .ok_or(InventoryError::EmptySlot { inventory, slot })?;
        let record = self
            .items
            .get(item)
            .map(ItemRecord::from_item)
            .ok_or(InventoryError::UnknownItem(item))?;

        if let Some(item) = self.items.get_mut(item) {
            item.set_dirty(false);
        }
        let observers = self.observers(inventory);
        self.send(
            Recipient::Clients(observers),
            &InventoryMessage::GiveItem {
                inventory,
                item: record,
                slot,
            },
        );
        Ok(())
    }

    /// Tell every observer to clear `slot`
    pub fn send_take_item(&mut self, inventory: InventoryId, slot: SlotId) -> InventoryResult<()> {
        if !self.containers.contains(inventory) {
            return Err(InventoryError::UnknownContainer(inventory));
        }
        let observers = self.observers(inventory);
        self.send(
            Recipient::Clients(observers),
            &InventoryMessage::TakeItem { inventory, slot },
        );
        Ok(())
    }

    // ---- Client requests ----

    /// Ask the server to move a stack. A server applies it directly.
    pub fn request_move(
        &mut self,
        from: InventoryId,
        from_slot: SlotId,
        to: InventoryId,
        to_slot: SlotId,
    ) -> InventoryResult<()> {
        if self.is_server() {
            return self.move_item(from, from_slot, to, to_slot);
        }
        self.send(
            Recipient::Server,
            &InventoryMessage::Move {
                from_slot,
                from,
                to_slot,
                to,
            },
        );
        Ok(())
    }

    /// Ask the server to split a stack. A server applies it directly.
    pub fn request_split(
        &mut self,
        from: InventoryId,
        from_slot: SlotId,
        to: InventoryId,
        to_slot: SlotId,
    ) -> InventoryResult<()> {
        if self.is_server() {
            return self.split(from, from_slot, to, to_slot).map(|_| ());
        }
        self.send(
            Recipient::Server,
            &InventoryMessage::Split {
                from_slot,
                from,
                to_slot,
                to,
            },
        );
        Ok(())
    }

    /// Ask the server to transfer a stack. A server applies it directly.
    pub fn request_transfer(&mut self, from: InventoryId, from_slot: SlotId, to: InventoryId) -> InventoryResult<()> {
        if self.is_server() {
            return self.transfer(from, from_slot, to).map(|_| ());
        }
        self.send(Recipient::Server, &InventoryMessage::Transfer { from_slot, from, to });
        Ok(())
    }

    /// Apply a request received from `client`.
    ///
    /// Malformed frames are reported; stale ids, containers the client is
    /// not observing and rejected operations are dropped silently.
    pub fn handle_client_message(&mut self, client: ClientId, frame: &[u8]) -> ProtocolResult<()> {
        let message = InventoryMessage::decode(frame).map_err(|e| {
            log::warn!("Malformed inventory frame from client {}: {}", client.0, e);
            e
        })?;

        if !self.is_server() {
            log::debug!("Ignoring {:?} on a client", message.kind());
            return Ok(());
        }

        let (from, to) = match &message {
            InventoryMessage::Move { from, to, .. }
            | InventoryMessage::Split { from, to, .. }
            | InventoryMessage::Transfer { from, to, .. } => (*from, *to),
            _ => {
                log::debug!("Client {} sent server-only {:?}", client.0, message.kind());
                return Ok(());
            }
        };

        if !self.is_connected(from, client) || !self.is_connected(to, client) {
            log::debug!(
                "Dropping {:?} from client {}: {} or {} not observed",
                message.kind(),
                client.0,
                from,
                to
            );
            return Ok(());
        }

        let result = match message {
            InventoryMessage::Move {
                from_slot, to_slot, ..
            } => self.move_item(from, from_slot, to, to_slot),
            InventoryMessage::Split {
                from_slot, to_slot, ..
            } => self.split(from, from_slot, to, to_slot).map(|_| ()),
            InventoryMessage::Transfer { from_slot, .. } => self.transfer(from, from_slot, to).map(|_| ()),
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::debug!("Rejected request from client {}: {}", client.0, e);
        }
        Ok(())
    }

    /// Apply a push received from the server
    pub fn handle_server_message(&mut self, frame: &[u8]) -> ProtocolResult<()> {
        let message = InventoryMessage::decode(frame).map_err(|e| {
            log::warn!("Malformed inventory frame from server: {}", e);
            e
        })?;

        if self.is_server() {
            log::debug!("Ignoring {:?} on the server", message.kind());
            return Ok(());
        }

        match message {
            InventoryMessage::DirtyItems { inventory, items } => {
                if !self.containers.contains(inventory) {
                    log::debug!("Dirty items for unknown {}", inventory);
                    return Ok(());
                }
                for record in &items {
                    match record.slot {
                        Some(slot) => {
                            self.apply_record(inventory, slot, record);
                        }
                        None => log::warn!("Dirty {} has no slot", record.item_id),
                    }
                }
            }
            InventoryMessage::GiveItem {
                inventory,
                item,
                slot,
            } => {
                if !self.containers.contains(inventory) {
                    log::debug!("Give item for unknown {}", inventory);
                    return Ok(());
                }
                self.apply_record(inventory, slot, &item);
            }
            InventoryMessage::TakeItem { inventory, slot } => {
                if let Some(item) = self.get_from_slot(inventory, slot) {
                    // Items that reappear elsewhere are recreated from their record
                    self.remove_item(item);
                } else if self.containers.contains(inventory) {
                    self.emit(InventoryEvent::SlotChanged { inventory, slot });
                }
            }
            InventoryMessage::Move { .. }
            | InventoryMessage::Split { .. }
            | InventoryMessage::Transfer { .. } => {
                log::debug!("Ignoring echoed inventory request");
            }
        }
        Ok(())
    }

    /// Drop a departed client from every container
    pub fn client_disconnected(&mut self, client: ClientId) {
        for container in self.containers.iter_mut() {
            container.remove_connection(client);
        }
    }
}
