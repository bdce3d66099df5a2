//! Binary records of items and containers
//!
//! Shared by the replication protocol and the save format.
//!
//! Item record: `string key | u32 stack | u64 item id | u16 slot | blob payload`.
//! An empty key stands for "no item" and ends the record. A slot of
//! `u16::MAX` means the item is not in a slot.
//!
//! Container record: `u64 id | u16 slot limit | u64 owner`, then for every
//! slot a `bool` occupied flag followed by an item record when set.
//!
//! Inventory section: `u32 container count | container records`.

use void_core::{ByteReader, ByteWriter, CodecError, CodecResult};

use crate::container::{Container, InventoryId, OwnerRef, SlotId};
use crate::error::{InventoryError, InventoryResult};
use crate::item::{decode_instance_data, Item, ItemId};
use crate::system::InventorySystem;

/// Wire value of "no slot"
pub const NO_SLOT: u16 = u16::MAX;

/// Serialized form of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub definition_key: String,
    pub stack_size: u32,
    pub item_id: ItemId,
    pub slot: Option<SlotId>,
    pub payload: Vec<u8>,
}

impl ItemRecord {
    pub fn from_item(item: &Item) -> Self {
        Self {
            definition_key: item.definition_key().to_string(),
            stack_size: item.stack_size(),
            item_id: item.id(),
            slot: item.slot_id(),
            payload: item.encode_payload(),
        }
    }

    pub fn write(&self, w: &mut ByteWriter) {
        w.write_str(&self.definition_key);
        w.write_u32(self.stack_size);
        w.write_u64(self.item_id.raw());
        w.write_u16(self.slot.unwrap_or(NO_SLOT));
        w.write_blob(&self.payload);
    }

    /// Write "no item"
    pub fn write_none(w: &mut ByteWriter) {
        w.write_str("");
    }

    /// Read a record that may be "no item"
    pub fn read_optional(r: &mut ByteReader<'_>) -> CodecResult<Option<Self>> {
        let definition_key = r.read_string()?;
        if definition_key.is_empty() {
            return Ok(None);
        }

        let stack_size = r.read_u32()?;
        let item_id = ItemId(r.read_u64()?);
        let slot = match r.read_u16()? {
            NO_SLOT => None,
            slot => Some(slot),
        };
        let payload = r.read_blob()?.to_vec();

        Ok(Some(Self {
            definition_key,
            stack_size,
            item_id,
            slot,
            payload,
        }))
    }

    /// Read a record that must hold an item
    pub fn read(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        Self::read_optional(r)?.ok_or_else(|| CodecError::invalid("empty item record"))
    }
}

/// Serialized form of one container and its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: InventoryId,
    pub slot_limit: SlotId,
    pub owner: OwnerRef,
    pub slots: Vec<Option<ItemRecord>>,
}

impl ContainerRecord {
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u64(self.id.raw());
        w.write_u16(self.slot_limit);
        w.write_u64(self.owner.0);
        for slot in &self.slots {
            match slot {
                Some(record) => {
                    w.write_bool(true);
                    record.write(w);
                }
                None => w.write_bool(false),
            }
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        let id = InventoryId(r.read_u64()?);
        let slot_limit = r.read_u16()?;
        let owner = OwnerRef(r.read_u64()?);

        let mut slots = Vec::with_capacity((slot_limit as usize).min(r.remaining()));
        for _ in 0..slot_limit {
            let slot = if r.read_bool()? {
                Some(ItemRecord::read(r)?)
            } else {
                None
            };
            slots.push(slot);
        }

        Ok(Self {
            id,
            slot_limit,
            owner,
            slots,
        })
    }

    /// Number of occupied slots
    pub fn item_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Every container of an inventory system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    pub containers: Vec<ContainerRecord>,
}

impl InventorySnapshot {
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u32(self.containers.len() as u32);
        for container in &self.containers {
            container.write(w);
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        let count = r.read_u32()? as usize;
        let mut containers = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            containers.push(ContainerRecord::read(r)?);
        }
        Ok(Self { containers })
    }
}

impl InventorySystem {
    fn container_record(&self, container: &Container) -> ContainerRecord {
        let mut slots = vec![None; container.slot_limit() as usize];
        for (slot, item) in container.items() {
            if let Some(item) = self.items.get(item) {
                slots[slot as usize] = Some(ItemRecord::from_item(item));
            }
        }

        ContainerRecord {
            id: container.id(),
            slot_limit: container.slot_limit(),
            owner: container.owner(),
            slots,
        }
    }

    /// Capture every container in id order
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            containers: self
                .containers
                .iter()
                .map(|c| self.container_record(c))
                .collect(),
        }
    }

    /// Write the inventory section of a save
    pub fn serialize(&self, w: &mut ByteWriter) {
        self.snapshot().write(w);
    }

    /// Apply a snapshot on top of the current state.
    ///
    /// Containers and items named in the snapshot are created or
    /// overwritten; everything else is left alone. Records whose definition
    /// no longer exists are skipped. Returns the number of items restored.
    pub fn restore(&mut self, snapshot: &InventorySnapshot) -> usize {
        // Reserve every recorded id so renumbered live items never land on one
        for record in snapshot.containers.iter().flat_map(|c| c.slots.iter().flatten()) {
            self.items.claim_id(record.item_id.raw());
        }

        let restored: usize = snapshot
            .containers
            .iter()
            .map(|record| self.restore_container(record))
            .sum();

        self.items.reassign();
        self.containers.reassign();
        restored
    }

    /// Read and apply an inventory section
    pub fn deserialize(&mut self, r: &mut ByteReader<'_>) -> CodecResult<usize> {
        let snapshot = InventorySnapshot::read(r)?;
        Ok(self.restore(&snapshot))
    }

    fn restore_container(&mut self, record: &ContainerRecord) -> usize {
        let id = record.id;
        let max_slot_limit = self.config().max_slot_limit;
        if record.slot_limit > max_slot_limit {
            log::warn!(
                "Skipping {} with slot limit {} above the maximum of {}",
                id,
                record.slot_limit,
                max_slot_limit
            );
            return 0;
        }

        if let Some(container) = self.containers.get(id) {
            let held: Vec<ItemId> = container.items().map(|(_, item)| item).collect();
            for item in held {
                self.detach(item);
            }
            if let Some(container) = self.containers.get_mut(id) {
                // Entries detach could not clear (dangling ids)
                container.take_all();
                if let Err(e) = container.set_slot_limit(record.slot_limit) {
                    log::warn!("Could not resize {} while restoring: {}", id, e);
                }
            }
        } else if let Err(e) = self.register(Container::new(record.owner, record.slot_limit), id.raw()) {
            log::warn!("Could not register {} while restoring: {}", id, e);
            return 0;
        }

        let mut restored = 0;
        for (slot, item) in record.slots.iter().enumerate() {
            if let Some(item) = item {
                if self.apply_record(id, slot as SlotId, item).is_some() {
                    restored += 1;
                }
            }
        }
        restored
    }

    /// Upsert an item from a record and put it into `slot`, displacing any
    /// other item held there
    pub(crate) fn apply_record(
        &mut self,
        inventory: InventoryId,
        slot: SlotId,
        record: &ItemRecord,
    ) -> Option<ItemId> {
        let id = self.upsert_item(record)?;

        let (current, valid) = match self.containers.get(inventory) {
            Some(container) => (container.get_from_slot(slot), container.check_slot(slot).is_ok()),
            None => return Some(id),
        };
        if !valid {
            log::warn!("Item record for {} names slot {} outside the container", inventory, slot);
            return Some(id);
        }

        if current != Some(id) {
            if let Some(other) = current {
                self.detach(other);
            }
            self.detach(id);
            self.place(inventory, slot, id);
        }
        if let Some(item) = self.items.get_mut(id) {
            item.set_dirty(false);
        }
        Some(id)
    }

    /// Create or update an item from a record without placing it
    pub(crate) fn upsert_item(&mut self, record: &ItemRecord) -> Option<ItemId> {
        let live_key = self
            .items
            .get(record.item_id)
            .map(|item| item.definition_key().to_string());

        if live_key.as_deref() != Some(record.definition_key.as_str()) {
            if !self.catalog().contains(&record.definition_key) {
                log::warn!(
                    "Skipping {} with unknown definition: {}",
                    record.item_id,
                    record.definition_key
                );
                return None;
            }
            if live_key.is_some() {
                self.renumber_item(record.item_id);
            }
        }

        let id = self
            .create_item(&record.definition_key, record.item_id.raw())
            .ok()?;

        let data = match decode_instance_data(&record.payload) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("Discarding unreadable payload of {}: {}", id, e);
                None
            }
        };

        if let Some(item) = self.items.get_mut(id) {
            item.set_stack_size(record.stack_size.max(1));
            if let Some(data) = data {
                item.set_instance_data(data);
            }
        }
        Some(id)
    }

    /// Move a live item to a fresh id, keeping its slot
    fn renumber_item(&mut self, id: ItemId) -> Option<ItemId> {
        self.items.claim_id(id.raw());
        let mut item = self.items.remove(id)?;
        let fresh = self.items.claim_id(0);
        item.set_id(fresh);

        if let Some((inventory, slot)) = item.container().zip(item.slot_id()) {
            if let Some(container) = self.containers.get_mut(inventory) {
                if container.get_from_slot(slot) == Some(id) {
                    container.set_slot(slot, Some(fresh));
                }
            }
        }
        self.items.insert(item);

        log::warn!("{} collides with a restored item, renumbered to {}", id, fresh);
        self.mark_item_dirty(fresh);
        Some(fresh)
    }

    /// Full snapshot of one container, sent to a client when it starts
    /// observing
    pub fn write_container(&self, id: InventoryId, w: &mut ByteWriter) -> InventoryResult<()> {
        let container = self
            .containers
            .get(id)
            .ok_or(InventoryError::UnknownContainer(id))?;
        self.container_record(container).write(w);
        Ok(())
    }

    /// Read a container snapshot, registering the container if needed
    pub fn read_container(&mut self, r: &mut ByteReader<'_>) -> CodecResult<InventoryId> {
        let record = ContainerRecord::read(r)?;
        self.restore_container(&record);
        self.items.reassign();
        self.containers.reassign();
        Ok(record.id)
    }

    /// Embed an optional item in an entity payload
    pub fn write_item(&self, item: Option<ItemId>, w: &mut ByteWriter) {
        match item.and_then(|id| self.items.get(id)) {
            Some(item) => ItemRecord::from_item(item).write(w),
            None => ItemRecord::write_none(w),
        }
    }

    /// Read an item embedded with [`write_item`](Self::write_item).
    ///
    /// The item is upserted but not placed in any container.
    pub fn read_item(&mut self, r: &mut ByteReader<'_>) -> CodecResult<Option<ItemId>> {
        Ok(ItemRecord::read_optional(r)?.and_then(|record| self.upsert_item(&record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;
    use crate::definition::{DefinitionCatalog, ItemClass, ItemDefinition};
    use crate::item::{ItemProperty, WorldRef};

    fn system() -> InventorySystem {
        let mut catalog = DefinitionCatalog::with_builtins();
        catalog
            .add_definition(
                ItemDefinition::new("wood", "Wood")
                    .with_class(ItemClass::Material)
                    .with_max_stack(100),
            )
            .unwrap();
        InventorySystem::new(InventoryConfig::server(), catalog)
    }

    #[test]
    fn test_item_record_layout() {
        let record = ItemRecord {
            definition_key: "ab".into(),
            stack_size: 3,
            item_id: ItemId(5),
            slot: None,
            payload: Vec::new(),
        };
        let mut w = ByteWriter::new();
        record.write(&mut w);

        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 4 + 2 + 4 + 8 + 2 + 4);
        assert_eq!(&bytes[18..20], &[0xff, 0xff]);
    }

    #[test]
    fn test_empty_key_reads_as_none() {
        let mut w = ByteWriter::new();
        ItemRecord::write_none(&mut w);
        let bytes = w.into_bytes();

        assert_eq!(ItemRecord::read_optional(&mut ByteReader::new(&bytes)), Ok(None));
        assert!(ItemRecord::read(&mut ByteReader::new(&bytes)).is_err());
    }

    #[test]
    fn test_serialize_restore_into_fresh_system() {
        let mut source = system();
        let inv = source.register(Container::new(OwnerRef(9), 3), 0).unwrap();
        source.give_amount(inv, "wood", 130).unwrap();
        let stone = source.create_item("stone", 0).unwrap();
        source.set_item_property(stone, "shiny", ItemProperty::Bool(true)).unwrap();
        source.give_to_slot(inv, stone, 2).unwrap();

        let mut w = ByteWriter::new();
        source.serialize(&mut w);
        let bytes = w.into_bytes();

        let mut target = system();
        assert_eq!(target.deserialize(&mut ByteReader::new(&bytes)).unwrap(), 3);
        assert_eq!(target.snapshot(), source.snapshot());

        let restored = target.find_instance(stone).unwrap();
        assert_eq!(restored.get_property("shiny"), Some(&ItemProperty::Bool(true)));
        assert_eq!(target.find(inv).unwrap().owner(), OwnerRef(9));

        // Fresh ids never collide with restored ones
        let fresh = target.create_item("wood", 0).unwrap();
        assert!(fresh.raw() > stone.raw());
        let fresh_inv = target.register(Container::new(OwnerRef(1), 1), 0).unwrap();
        assert!(fresh_inv.raw() > inv.raw());
    }

    #[test]
    fn test_restore_overwrites_existing_container() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 2), 0).unwrap();
        let a = system.create_item("wood", 0).unwrap();
        system.set_stack_size(a, 10).unwrap();
        system.stack(inv, a).unwrap();
        let saved = system.snapshot();

        system.set_stack_size(a, 60).unwrap();
        system.move_item(inv, 0, inv, 1).unwrap();
        let b = system.create_item("stone", 0).unwrap();
        system.give_to_slot(inv, b, 0).unwrap();

        system.restore(&saved);
        assert_eq!(system.get_from_slot(inv, 0), Some(a));
        assert_eq!(system.get_from_slot(inv, 1), None);
        assert_eq!(system.find_instance(a).unwrap().stack_size(), 10);
        // The displaced stone is left for the orphan sweep
        assert!(system.find_instance(b).unwrap().is_orphaned());
    }

    #[test]
    fn test_restore_skips_unknown_definitions() {
        let snapshot = InventorySnapshot {
            containers: vec![ContainerRecord {
                id: InventoryId(4),
                slot_limit: 2,
                owner: OwnerRef(1),
                slots: vec![
                    Some(ItemRecord {
                        definition_key: "removed_item".into(),
                        stack_size: 1,
                        item_id: ItemId(10),
                        slot: Some(0),
                        payload: Vec::new(),
                    }),
                    Some(ItemRecord {
                        definition_key: "wood".into(),
                        stack_size: 7,
                        item_id: ItemId(11),
                        slot: Some(1),
                        payload: Vec::new(),
                    }),
                ],
            }],
        };

        let mut system = system();
        assert_eq!(system.restore(&snapshot), 1);
        assert_eq!(system.get_from_slot(InventoryId(4), 0), None);
        assert_eq!(system.get_from_slot(InventoryId(4), 1), Some(ItemId(11)));
    }

    #[test]
    fn test_write_read_container() {
        let mut server = system();
        let inv = server.register(Container::new(OwnerRef(1), 2), 0).unwrap();
        server.give_amount(inv, "wood", 5).unwrap();

        let mut w = ByteWriter::new();
        server.write_container(inv, &mut w).unwrap();
        assert!(server.write_container(InventoryId(99), &mut w).is_err());
        let bytes = w.into_bytes();

        let mut client = InventorySystem::new(InventoryConfig::client(), server.catalog().clone());
        let read = client.read_container(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(read, inv);
        assert_eq!(client.snapshot(), server.snapshot());
    }

    #[test]
    fn test_write_read_item() {
        let mut source = system();
        let held = source.create_item("wood", 0).unwrap();
        source.set_stack_size(held, 33).unwrap();
        source.set_world_entity(held, Some(WorldRef(1))).unwrap();

        let mut w = ByteWriter::new();
        source.write_item(Some(held), &mut w);
        source.write_item(None, &mut w);
        let bytes = w.into_bytes();

        let mut target = system();
        let mut r = ByteReader::new(&bytes);
        let read = target.read_item(&mut r).unwrap();
        assert_eq!(read, Some(held));
        assert_eq!(target.find_instance(held).unwrap().stack_size(), 33);
        assert_eq!(target.read_item(&mut r).unwrap(), None);
        assert!(r.is_empty());
    }

    #[test]
    fn test_restore_renumbers_colliding_live_item() {
        let mut source = system();
        let inv = source.register(Container::new(OwnerRef(1), 2), 0).unwrap();
        let wood = source.create_item("wood", 0).unwrap();
        source.set_stack_size(wood, 80).unwrap();
        source.stack(inv, wood).unwrap();

        // A booted world already holds a map item under the same id
        let mut target = system();
        let map = target.register(Container::new(OwnerRef(7), 1), 50).unwrap();
        let stone = target.create_item("stone", 0).unwrap();
        target.set_stack_size(stone, 5).unwrap();
        target.stack(map, stone).unwrap();
        assert_eq!(stone, wood);

        target.restore(&source.snapshot());

        let restored = target.find_instance(target.get_from_slot(inv, 0).unwrap()).unwrap();
        assert_eq!(restored.definition_key(), "wood");
        assert_eq!(restored.stack_size(), 80);

        let kept = target.get_from_slot(map, 0).unwrap();
        assert_ne!(kept, wood);
        let kept = target.find_instance(kept).unwrap();
        assert_eq!(kept.definition_key(), "stone");
        assert_eq!(kept.stack_size(), 5);
        assert_eq!(kept.slot_id(), Some(0));
        assert_eq!(kept.container(), Some(map));
        assert_eq!(target.sweep_orphans(), 0);
    }

    #[test]
    fn test_restore_skips_container_over_max_slot_limit() {
        let snapshot = InventorySnapshot {
            containers: vec![ContainerRecord {
                id: InventoryId(3),
                slot_limit: 1000,
                owner: OwnerRef(1),
                slots: vec![None; 1000],
            }],
        };

        let mut system = system();
        assert_eq!(system.restore(&snapshot), 0);
        assert!(system.find(InventoryId(3)).is_none());
    }

    #[test]
    fn test_restore_shrinks_container_with_dangling_slot() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 4), 0).unwrap();
        system.containers.get_mut(inv).unwrap().set_slot(3, Some(ItemId(77)));

        let snapshot = InventorySnapshot {
            containers: vec![ContainerRecord {
                id: inv,
                slot_limit: 2,
                owner: OwnerRef(1),
                slots: vec![None, None],
            }],
        };
        system.restore(&snapshot);
        assert_eq!(system.find(inv).unwrap().slot_limit(), 2);
        assert_eq!(system.find(inv).unwrap().used_slots(), 0);
    }
}
