//! The inventory system
//!
//! One `InventorySystem` owns every item, container and definition of a
//! simulation session. It is created at world start and passed by reference
//! to gameplay code and to the persistence layer.

use void_core::{ByteReader, ByteWriter};

use crate::config::InventoryConfig;
use crate::container::{Container, InventoryId, SlotId};
use crate::definition::{CatalogError, CatalogResult, DefinitionCatalog, ItemClass, ItemDefinition};
use crate::error::{InventoryError, InventoryResult};
use crate::event::InventoryEvent;
use crate::item::{decode_instance_data, Item, ItemId, ItemProperty, WorldRef};
use crate::network::{ClientId, Envelope, InventoryMessage, NetRole, Recipient};
use crate::registry::{ContainerRegistry, ItemRegistry};

/// Item, container and definition state of one session
#[derive(Debug)]
pub struct InventorySystem {
    config: InventoryConfig,
    catalog: DefinitionCatalog,
    pub(crate) items: ItemRegistry,
    pub(crate) containers: ContainerRegistry,
    dirty_list: Vec<InventoryId>,
    events: Vec<InventoryEvent>,
    outbox: Vec<Envelope>,
}

impl InventorySystem {
    /// Create a system around an already built catalog
    pub fn new(config: InventoryConfig, catalog: DefinitionCatalog) -> Self {
        Self {
            config,
            catalog,
            items: ItemRegistry::new(),
            containers: ContainerRegistry::new(),
            dirty_list: Vec::new(),
            events: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Create a system and load definitions from the configured paths
    pub fn initialize(config: InventoryConfig) -> Result<Self, CatalogError> {
        let mut catalog = DefinitionCatalog::with_builtins();
        for path in &config.definition_paths {
            catalog.add_source(path.clone());
        }
        catalog.reload()?;

        log::info!(
            "Inventory system initialized as {:?} with {} definitions",
            config.role,
            catalog.len()
        );
        Ok(Self::new(config, catalog))
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn role(&self) -> NetRole {
        self.config.role
    }

    pub fn is_server(&self) -> bool {
        self.config.role == NetRole::Server
    }

    pub fn is_client(&self) -> bool {
        self.config.role == NetRole::Client
    }

    // ---- Definitions ----

    pub fn catalog(&self) -> &DefinitionCatalog {
        &self.catalog
    }

    /// Register an extra definition at runtime
    pub fn add_definition(&mut self, definition: ItemDefinition) -> CatalogResult<()> {
        self.catalog.add_definition(definition)
    }

    /// Rebuild the catalog from built-ins and resource files.
    ///
    /// Live items keep their state; only future creations see the new
    /// definitions. A failed reload keeps the previous catalog.
    pub fn reload_definitions(&mut self) -> CatalogResult<usize> {
        self.catalog.reload().map_err(|e| {
            log::error!("Definition reload failed, keeping previous catalog: {}", e);
            e
        })
    }

    // ---- Item registry ----

    /// Read-only view of every item
    pub fn items(&self) -> &ItemRegistry {
        &self.items
    }

    /// Create an item from a definition key.
    ///
    /// A nonzero `id` that is already registered returns the existing
    /// instance untouched.
    pub fn create_item(&mut self, key: &str, id: u64) -> InventoryResult<ItemId> {
        if id != 0 && self.items.contains(ItemId(id)) {
            return Ok(ItemId(id));
        }

        let definition = match self.catalog.get(key) {
            Some(def) => def.clone(),
            None => {
                log::error!("Unable to create an item, no definition found for: {}", key);
                return Err(InventoryError::UnknownDefinition(key.to_string()));
            }
        };

        Ok(self.create_item_with(&definition, id))
    }

    /// Create an item from an explicit definition, bypassing the catalog
    pub fn create_item_with(&mut self, definition: &ItemDefinition, id: u64) -> ItemId {
        if id != 0 && self.items.contains(ItemId(id)) {
            return ItemId(id);
        }

        let id = self.items.claim_id(id);
        self.items.insert(Item::from_definition(id, definition));
        self.emit(InventoryEvent::ItemCreated {
            item: id,
            definition: definition.id.clone(),
        });
        id
    }

    /// Create an item of the first catalog definition (in key order) with `class`
    pub fn create_item_of_class(&mut self, class: ItemClass, id: u64) -> InventoryResult<ItemId> {
        let definition = self
            .catalog
            .iter()
            .find(|def| def.class == class)
            .cloned()
            .ok_or_else(|| {
                log::error!("Unable to create an item, no definition of class: {}", class.name());
                InventoryError::UnknownDefinition(class.name().to_string())
            })?;

        Ok(self.create_item_with(&definition, id))
    }

    /// Structural copy of an item with a fresh identity.
    ///
    /// The copy starts outside any container.
    pub fn duplicate_item(&mut self, source: ItemId) -> InventoryResult<ItemId> {
        let (key, stack_size, payload) = {
            let item = self.items.get(source).ok_or(InventoryError::UnknownItem(source))?;
            let mut w = ByteWriter::new();
            w.write_blob(&item.encode_payload());
            (item.definition_key().to_string(), item.stack_size(), w.into_bytes())
        };

        let copy = self.create_item(&key, 0)?;

        let data = ByteReader::new(&payload)
            .read_blob()
            .ok()
            .and_then(|bytes| decode_instance_data(bytes).ok());
        if let Some(item) = self.items.get_mut(copy) {
            item.set_stack_size(stack_size);
            if let Some(data) = data {
                item.set_instance_data(data);
            }
        }

        Ok(copy)
    }

    /// Look up a live item
    pub fn find_instance(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    /// Remove an item, clearing its slot first. Absent ids are a no-op.
    pub fn remove_item(&mut self, id: ItemId) -> bool {
        if !self.items.contains(id) {
            return false;
        }

        self.detach(id);
        self.items.remove(id);
        self.emit(InventoryEvent::ItemRemoved { item: id });
        true
    }

    /// Set a stack size; zero destroys the item
    pub fn set_stack_size(&mut self, id: ItemId, stack_size: u32) -> InventoryResult<()> {
        if stack_size == 0 {
            if !self.remove_item(id) {
                return Err(InventoryError::UnknownItem(id));
            }
            return Ok(());
        }

        let item = self.items.get_mut(id).ok_or(InventoryError::UnknownItem(id))?;
        item.set_stack_size(stack_size);
        self.mark_item_dirty(id);
        Ok(())
    }

    /// Set an instance property
    pub fn set_item_property(
        &mut self,
        id: ItemId,
        key: impl Into<String>,
        value: ItemProperty,
    ) -> InventoryResult<()> {
        let item = self.items.get_mut(id).ok_or(InventoryError::UnknownItem(id))?;
        item.set_property(key.into(), value);
        self.mark_item_dirty(id);
        Ok(())
    }

    /// Attach or detach the world representation of an item
    pub fn set_world_entity(&mut self, id: ItemId, entity: Option<WorldRef>) -> InventoryResult<()> {
        let item = self.items.get_mut(id).ok_or(InventoryError::UnknownItem(id))?;
        item.set_world_entity(entity);
        Ok(())
    }

    // ---- Container registry ----

    /// Read-only view of every container
    pub fn containers(&self) -> &ContainerRegistry {
        &self.containers
    }

    /// Register a container; a nonzero `id` is used as-is
    pub fn register(&mut self, container: Container, id: u64) -> InventoryResult<InventoryId> {
        if container.slot_limit() > self.config.max_slot_limit {
            return Err(InventoryError::CapacityExceeded {
                inventory: InventoryId(id),
                slot: container.slot_limit(),
                slot_limit: self.config.max_slot_limit,
            });
        }

        if self.containers.contains(InventoryId(id)) {
            log::warn!("Re-registering {}, its items are detached", InventoryId(id));
            self.remove_container(InventoryId(id), false);
        }

        let id = self.containers.register(container, id);
        log::debug!("Registered {}", id);
        Ok(id)
    }

    pub fn find(&self, id: InventoryId) -> Option<&Container> {
        self.containers.get(id)
    }

    /// Mutable access for observer bookkeeping
    pub fn find_mut(&mut self, id: InventoryId) -> Option<&mut Container> {
        self.containers.get_mut(id)
    }

    /// Unregister a container.
    ///
    /// With `destroy_items` every contained item is removed as well;
    /// otherwise the detached items are returned to the caller, who must
    /// re-home them before the next orphan sweep.
    pub fn remove_container(&mut self, id: InventoryId, destroy_items: bool) -> Option<Vec<ItemId>> {
        let mut container = self.containers.remove(id)?;
        self.dirty_list.retain(|dirty| *dirty != id);

        let held: Vec<ItemId> = container.take_all().into_iter().map(|(_, item)| item).collect();
        for item in &held {
            if let Some(item) = self.items.get_mut(*item) {
                item.set_slot(None, None);
            }
        }

        if destroy_items {
            for item in &held {
                self.remove_item(*item);
            }
        }

        log::debug!("Removed {} holding {} items", id, held.len());
        Some(held)
    }

    /// Resize a registered container
    pub fn set_slot_limit(&mut self, id: InventoryId, slot_limit: SlotId) -> InventoryResult<()> {
        if slot_limit > self.config.max_slot_limit {
            return Err(InventoryError::CapacityExceeded {
                inventory: id,
                slot: slot_limit,
                slot_limit: self.config.max_slot_limit,
            });
        }
        let container = self.containers.get_mut(id).ok_or(InventoryError::UnknownContainer(id))?;
        container.set_slot_limit(slot_limit)
    }

    /// Start replicating a container to `client`
    pub fn add_connection(&mut self, id: InventoryId, client: ClientId) -> InventoryResult<()> {
        let container = self.containers.get_mut(id).ok_or(InventoryError::UnknownContainer(id))?;
        container.add_connection(client);
        Ok(())
    }

    pub fn remove_connection(&mut self, id: InventoryId, client: ClientId) -> InventoryResult<()> {
        let container = self.containers.get_mut(id).ok_or(InventoryError::UnknownContainer(id))?;
        container.remove_connection(client);
        Ok(())
    }

    pub fn is_connected(&self, id: InventoryId, client: ClientId) -> bool {
        self.containers
            .get(id)
            .map(|c| c.is_connected(client))
            .unwrap_or(false)
    }

    // ---- Events, outbox, tick ----

    /// Take every queued lifecycle event
    pub fn drain_events(&mut self) -> Vec<InventoryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take every queued outgoing frame
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Containers waiting for the next flush, in insertion order
    pub fn dirty_containers(&self) -> &[InventoryId] {
        &self.dirty_list
    }

    /// Whether the item is held by the slot its back-reference names
    fn is_held(&self, item: &Item) -> bool {
        item.container()
            .zip(item.slot_id())
            .and_then(|(inventory, slot)| self.containers.get(inventory)?.get_from_slot(slot))
            == Some(item.id())
    }

    /// Neither held by a container slot nor represented in the world
    pub fn is_orphan(&self, id: ItemId) -> bool {
        self.items
            .get(id)
            .map(|item| item.world_entity().is_none() && !self.is_held(item))
            .unwrap_or(false)
    }

    /// Remove every item that is neither in a container nor in the world
    pub fn sweep_orphans(&mut self) -> usize {
        let orphans: Vec<ItemId> = self
            .items
            .iter()
            .filter(|item| item.world_entity().is_none() && !self.is_held(item))
            .map(Item::id)
            .collect();

        for id in &orphans {
            self.remove_item(*id);
        }

        if !orphans.is_empty() {
            log::debug!("Reclaimed {} orphaned items", orphans.len());
            self.emit(InventoryEvent::OrphansReclaimed { count: orphans.len() });
        }
        orphans.len()
    }

    /// Per-tick work: flush dirty containers (server) then reclaim orphans
    pub fn tick(&mut self) {
        if self.is_server() {
            self.flush_dirty();
        }
        if self.config.sweep_orphans {
            self.sweep_orphans();
        }
    }

    // ---- Internal primitives ----

    pub(crate) fn emit(&mut self, event: InventoryEvent) {
        if self.config.track_events {
            self.events.push(event);
        }
    }

    pub(crate) fn send(&mut self, recipient: Recipient, message: &InventoryMessage) {
        if let Recipient::Clients(clients) = &recipient {
            if clients.is_empty() {
                return;
            }
        }
        self.outbox.push(Envelope {
            recipient,
            frame: message.encode(),
        });
    }

    pub(crate) fn take_dirty_list(&mut self) -> Vec<InventoryId> {
        std::mem::take(&mut self.dirty_list)
    }

    /// Queue a container for the next flush; replicas never flush
    pub(crate) fn mark_container_dirty(&mut self, id: InventoryId) {
        if !self.is_server() {
            return;
        }
        if let Some(container) = self.containers.get_mut(id) {
            if container.mark_dirty() {
                self.dirty_list.push(id);
            }
        }
    }

    /// Flag an item for replication along with its container
    pub(crate) fn mark_item_dirty(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        item.set_dirty(true);
        let location = item.container().zip(item.slot_id());

        if let Some((inventory, slot)) = location {
            self.mark_container_dirty(inventory);
            self.emit(InventoryEvent::SlotChanged { inventory, slot });
        }
    }

    /// Put an item into a validated, empty slot
    pub(crate) fn place(&mut self, inventory: InventoryId, slot: SlotId, id: ItemId) {
        let Some(container) = self.containers.get_mut(inventory) else {
            return;
        };
        container.set_slot(slot, Some(id));
        if let Some(item) = self.items.get_mut(id) {
            item.set_slot(Some(inventory), Some(slot));
        }
        self.mark_item_dirty(id);
    }

    /// Clear an item's slot and its back-reference
    pub(crate) fn detach(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        let location = item.container().zip(item.slot_id());
        item.set_slot(None, None);

        let Some((inventory, slot)) = location else {
            return;
        };
        let Some(container) = self.containers.get_mut(inventory) else {
            return;
        };
        if container.get_from_slot(slot) != Some(id) {
            return;
        }
        container.set_slot(slot, None);
        let observers: Vec<ClientId> = container.connections().collect();

        self.mark_container_dirty(inventory);
        self.emit(InventoryEvent::SlotChanged { inventory, slot });

        if self.is_server() {
            self.send(
                Recipient::Clients(observers),
                &InventoryMessage::TakeItem { inventory, slot },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::OwnerRef;

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
    fn test_create_item() {
        let mut system = system();
        let id = system.create_item("wood", 0).unwrap();
        let item = system.find_instance(id).unwrap();
        assert_eq!(item.definition_key(), "wood");
        assert_eq!(item.stack_size(), 1);

        assert_eq!(
            system.drain_events(),
            vec![InventoryEvent::ItemCreated {
                item: id,
                definition: "wood".into()
            }]
        );
    }

    #[test]
    fn test_create_unknown_definition() {
        let mut system = system();
        assert_eq!(
            system.create_item("unobtainium", 0),
            Err(InventoryError::UnknownDefinition("unobtainium".into()))
        );
        assert!(system.items().is_empty());
        // No id was consumed
        assert_eq!(system.items().last_id(), 0);
    }

    #[test]
    fn test_create_existing_id_is_idempotent() {
        let mut system = system();
        let id = system.create_item("wood", 12).unwrap();
        system.set_stack_size(id, 30).unwrap();

        assert_eq!(system.create_item("stone", 12).unwrap(), id);
        let item = system.find_instance(id).unwrap();
        assert_eq!(item.definition_key(), "wood");
        assert_eq!(item.stack_size(), 30);

        // The counter moved past the explicit id
        assert_eq!(system.create_item("wood", 0).unwrap(), ItemId(13));
    }

    #[test]
    fn test_create_item_of_class() {
        let mut system = system();
        // "metal_fragments" sorts before "stone" and "wood"
        let id = system.create_item_of_class(ItemClass::Material, 0).unwrap();
        assert_eq!(system.find_instance(id).unwrap().definition_key(), "metal_fragments");
        assert!(system.create_item_of_class(ItemClass::Weapon, 0).is_err());
    }

    #[test]
    fn test_duplicate_item() {
        let mut system = system();
        let id = system.create_item("wood", 0).unwrap();
        system.set_stack_size(id, 42).unwrap();
        system
            .set_item_property(id, "wet", ItemProperty::Bool(true))
            .unwrap();

        let copy = system.duplicate_item(id).unwrap();
        assert_ne!(copy, id);
        let copy = system.find_instance(copy).unwrap();
        assert_eq!(copy.stack_size(), 42);
        assert_eq!(copy.get_property("wet"), Some(&ItemProperty::Bool(true)));
        assert!(copy.container().is_none());
    }

    #[test]
    fn test_remove_item_is_idempotent() {
        let mut system = system();
        let id = system.create_item("wood", 0).unwrap();
        assert!(system.remove_item(id));
        assert!(!system.remove_item(id));
        assert!(system.find_instance(id).is_none());
    }

    #[test]
    fn test_set_stack_size_zero_destroys() {
        let mut system = system();
        let id = system.create_item("wood", 0).unwrap();
        system.set_stack_size(id, 0).unwrap();
        assert!(system.find_instance(id).is_none());
    }

    #[test]
    fn test_register_over_max_slot_limit() {
        let mut system = system();
        let result = system.register(Container::new(OwnerRef(1), 1000), 0);
        assert!(matches!(result, Err(InventoryError::CapacityExceeded { .. })));
        assert!(system.containers().is_empty());
    }

    #[test]
    fn test_remove_container_returns_detached_items() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 4), 0).unwrap();
        let id = system.create_item("wood", 0).unwrap();
        system.stack(inv, id).unwrap();

        let held = system.remove_container(inv, false).unwrap();
        assert_eq!(held, vec![id]);
        assert!(system.find_instance(id).unwrap().is_orphaned());
        assert!(system.find(inv).is_none());
        assert!(system.dirty_containers().is_empty());
    }

    #[test]
    fn test_remove_container_destroys_items() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 4), 0).unwrap();
        let id = system.create_item("wood", 0).unwrap();
        system.stack(inv, id).unwrap();

        system.remove_container(inv, true).unwrap();
        assert!(system.find_instance(id).is_none());
        assert!(system.remove_container(inv, true).is_none());
    }

    #[test]
    fn test_orphan_sweep() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 4), 0).unwrap();
        let kept = system.create_item("wood", 0).unwrap();
        system.stack(inv, kept).unwrap();
        let pickup = system.create_item("wood", 0).unwrap();
        system.set_world_entity(pickup, Some(WorldRef(3))).unwrap();
        let orphan = system.create_item("stone", 0).unwrap();

        assert!(system.find_instance(orphan).is_some());
        assert_eq!(system.sweep_orphans(), 1);
        assert!(system.find_instance(orphan).is_none());
        assert!(system.find_instance(kept).is_some());
        assert!(system.find_instance(pickup).is_some());
    }

    #[test]
    fn test_events_disabled() {
        let mut config = InventoryConfig::server();
        config.track_events = false;
        let mut system = InventorySystem::new(config, DefinitionCatalog::with_builtins());
        system.create_item("stone", 0).unwrap();
        assert!(system.drain_events().is_empty());
    }

    #[test]
    fn test_dirty_list_coalesces() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 4), 0).unwrap();
        let a = system.create_item("wood", 0).unwrap();
        let b = system.create_item("stone", 0).unwrap();
        system.stack(inv, a).unwrap();
        system.stack(inv, b).unwrap();
        system.set_stack_size(a, 10).unwrap();

        assert_eq!(system.dirty_containers(), &[inv]);
    }

    #[test]
    fn test_register_over_live_id_detaches_items() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 2), 5).unwrap();
        system.give_amount(inv, "wood", 10).unwrap();
        let held = system.get_from_slot(inv, 0).unwrap();

        assert_eq!(system.register(Container::new(OwnerRef(2), 2), 5).unwrap(), inv);
        assert_eq!(system.get_from_slot(inv, 0), None);
        assert_eq!(system.find(inv).unwrap().owner(), OwnerRef(2));
        assert!(system.find_instance(held).unwrap().container().is_none());

        assert_eq!(system.sweep_orphans(), 1);
        assert!(system.find_instance(held).is_none());
    }

    #[test]
    fn test_sweep_reclaims_items_with_dangling_back_reference() {
        let mut system = system();
        let inv = system.register(Container::new(OwnerRef(1), 2), 0).unwrap();
        let id = system.create_item("wood", 0).unwrap();
        system.stack(inv, id).unwrap();
        assert!(!system.is_orphan(id));

        // Slot emptied behind the item's back
        system.containers.get_mut(inv).unwrap().set_slot(0, None);
        assert_eq!(system.find_instance(id).unwrap().container(), Some(inv));
        assert!(system.is_orphan(id));
        assert_eq!(system.sweep_orphans(), 1);
        assert!(system.find_instance(id).is_none());

        // Same for a container that no longer exists
        let other = system.register(Container::new(OwnerRef(1), 2), 0).unwrap();
        let id = system.create_item("wood", 0).unwrap();
        system.stack(other, id).unwrap();
        system.containers.remove(other);
        assert_eq!(system.sweep_orphans(), 1);
        assert!(system.find_instance(id).is_none());
    }

    #[test]
    fn test_client_keeps_no_dirty_list() {
        let mut system = InventorySystem::new(InventoryConfig::client(), DefinitionCatalog::with_builtins());
        let inv = system.register(Container::new(OwnerRef(1), 2), 0).unwrap();
        let id = system.create_item("stone", 0).unwrap();
        system.stack(inv, id).unwrap();

        assert!(system.dirty_containers().is_empty());
        assert!(!system.find(inv).unwrap().is_dirty());
    }
}
