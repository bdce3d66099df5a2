//! Persistable world entities and the roster that tracks them

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use void_core::{ByteReader, ByteWriter, CodecError, IdCounter};
use void_inventory::InventorySystem;

/// Handle of an entity inside a [`WorldRoster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub u64);

/// A world entity that takes part in full-world saves.
///
/// Entities placed by the map report a stable anchor; on load they are
/// matched to the live map instance instead of being spawned. Players report
/// their stable player id and are saved through the per-player table.
pub trait Persistable {
    /// Registered type name used to respawn the entity
    fn type_name(&self) -> &str;

    /// Stable anchor of a map-placed entity
    fn map_anchor(&self) -> Option<&str> {
        None
    }

    /// Stable player id, for player entities
    fn player_id(&self) -> Option<i64> {
        None
    }

    /// Opt out of the entity section (e.g. transient effects)
    fn should_save_state(&self) -> bool {
        true
    }

    fn serialize_state(&self, w: &mut ByteWriter, inventory: &InventorySystem);

    fn deserialize_state(
        &mut self,
        r: &mut ByteReader<'_>,
        inventory: &mut InventorySystem,
    ) -> Result<(), CodecError>;

    /// First restore phase, run on every entity before any
    /// [`after_state_loaded`](Self::after_state_loaded)
    fn before_state_loaded(&mut self, _inventory: &mut InventorySystem) {}

    /// Second restore phase
    fn after_state_loaded(&mut self, _inventory: &mut InventorySystem) {}

    /// Called when the roster removes the entity
    fn on_despawn(&mut self, _inventory: &mut InventorySystem) {}
}

/// Builds a fresh entity of one registered type
pub type EntityFactory = Box<dyn Fn() -> Box<dyn Persistable>>;

/// Builds a player entity for a stable player id
pub type PlayerFactory = Box<dyn Fn(i64) -> Box<dyn Persistable>>;

/// Every persistable entity of the running world
#[derive(Default)]
pub struct WorldRoster {
    entities: BTreeMap<EntityKey, Box<dyn Persistable>>,
    keys: IdCounter,
    factories: BTreeMap<String, EntityFactory>,
    player_factory: Option<PlayerFactory>,
    connected: BTreeSet<i64>,
}

impl WorldRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how to spawn an entity type by name
    pub fn register_type<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Persistable> + 'static,
    {
        self.factories.insert(type_name.into(), Box::new(factory));
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Register how to spawn player entities
    pub fn set_player_factory<F>(&mut self, factory: F)
    where
        F: Fn(i64) -> Box<dyn Persistable> + 'static,
    {
        self.player_factory = Some(Box::new(factory));
    }

    /// Add an existing entity
    pub fn insert(&mut self, entity: Box<dyn Persistable>) -> EntityKey {
        let key = EntityKey(self.keys.next());
        self.entities.insert(key, entity);
        key
    }

    /// Spawn a registered type
    pub fn spawn(&mut self, type_name: &str) -> Option<EntityKey> {
        let entity = self.factories.get(type_name)?();
        Some(self.insert(entity))
    }

    /// Spawn a player entity through the player factory
    pub fn spawn_player(&mut self, player_id: i64) -> Option<EntityKey> {
        let entity = self.player_factory.as_ref()?(player_id);
        Some(self.insert(entity))
    }

    /// Remove an entity, running its despawn hook
    pub fn despawn(&mut self, key: EntityKey, inventory: &mut InventorySystem) -> Option<Box<dyn Persistable>> {
        let mut entity = self.entities.remove(&key)?;
        entity.on_despawn(inventory);
        Some(entity)
    }

    pub fn get(&self, key: EntityKey) -> Option<&dyn Persistable> {
        self.entities.get(&key).map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut (dyn Persistable + 'static)> {
        self.entities.get_mut(&key).map(|e| e.as_mut())
    }

    /// Keys in spawn order
    pub fn keys(&self) -> Vec<EntityKey> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &dyn Persistable)> {
        self.entities.iter().map(|(k, e)| (*k, e.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn find_by_anchor(&self, anchor: &str) -> Option<EntityKey> {
        self.iter()
            .find(|(_, e)| e.map_anchor() == Some(anchor))
            .map(|(k, _)| k)
    }

    pub fn find_player(&self, player_id: i64) -> Option<EntityKey> {
        self.iter()
            .find(|(_, e)| e.player_id() == Some(player_id))
            .map(|(k, _)| k)
    }

    // ---- Connected players ----

    pub fn connect(&mut self, player_id: i64) {
        self.connected.insert(player_id);
    }

    pub fn disconnect(&mut self, player_id: i64) {
        self.connected.remove(&player_id);
    }

    pub fn is_connected(&self, player_id: i64) -> bool {
        self.connected.contains(&player_id)
    }

    /// Player entities whose player is connected
    pub fn connected_players(&self) -> Vec<EntityKey> {
        self.iter()
            .filter(|(_, e)| e.player_id().map(|id| self.is_connected(id)).unwrap_or(false))
            .map(|(k, _)| k)
            .collect()
    }
}

impl fmt::Debug for WorldRoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldRoster")
            .field("entities", &self.entities.len())
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .field("connected", &self.connected)
            .finish()
    }
}
