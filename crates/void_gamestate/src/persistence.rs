//! Full-world save and load
//!
//! Blob layout, little-endian:
//!
//! ```text
//! i32 version | str world_id | inventory section
//! | i32 count, (i64 player_id, i32 len, bytes)*
//! | i32 count, (str type_name, i32 len, bytes, bool map_placed, [str anchor])*
//! | u64 next_persistent_id
//! ```
//!
//! A load parses the whole blob before touching the world, so a version
//! mismatch or a truncated blob leaves every registry as it was.

use std::collections::BTreeMap;

use void_core::{ByteReader, ByteWriter, CodecError, CodecResult, IdCounter};
use void_inventory::{InventorySnapshot, InventorySystem};

use crate::config::PersistConfig;
use crate::entity::{EntityKey, WorldRoster};
use crate::save::{SaveError, SaveResult, SaveStorage};

/// Current save format version
pub const FORMAT_VERSION: i32 = 20;

/// One entity that could not be restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRestoreFailure {
    pub type_name: String,
    pub anchor: Option<String>,
    pub reason: String,
}

/// Outcome of a full-world load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub world_id: String,
    pub items_restored: usize,
    pub players_restored: usize,
    pub entities_restored: usize,
    pub failures: Vec<EntityRestoreFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct EntityRecord {
    type_name: String,
    data: Vec<u8>,
    anchor: Option<String>,
}

/// Everything read from a blob, before any of it is applied
struct ParsedSave {
    world_id: String,
    inventory: InventorySnapshot,
    players: BTreeMap<i64, Vec<u8>>,
    entities: Vec<EntityRecord>,
    next_persistent_id: u64,
}

/// Owns the world id, the per-player table and the persistent id counter
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    world_id: Option<String>,
    version: i32,
    player_data: BTreeMap<i64, Vec<u8>>,
    persistent_ids: IdCounter,
}

impl Default for PersistenceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceManager {
    pub fn new() -> Self {
        Self::with_version(FORMAT_VERSION)
    }

    pub fn from_config(config: &PersistConfig) -> Self {
        Self::with_version(config.format_version)
    }

    pub fn with_version(version: i32) -> Self {
        Self {
            world_id: None,
            version,
            player_data: BTreeMap::new(),
            persistent_ids: IdCounter::new(),
        }
    }

    /// World id, minted on first save
    pub fn world_id(&self) -> Option<&str> {
        self.world_id.as_deref()
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Allocate a persistent id; the counter survives save and load
    pub fn generate_id(&mut self) -> u64 {
        self.persistent_ids.next()
    }

    /// Saved payload of one player
    pub fn player_data(&self, player_id: i64) -> Option<&[u8]> {
        self.player_data.get(&player_id).map(|d| d.as_slice())
    }

    /// Capture one player's state into the player table.
    ///
    /// Returns `false` if `key` is not a player entity.
    pub fn save_player(&mut self, key: EntityKey, roster: &WorldRoster, inventory: &InventorySystem) -> bool {
        let Some(entity) = roster.get(key) else {
            return false;
        };
        let Some(player_id) = entity.player_id() else {
            return false;
        };

        let mut w = ByteWriter::new();
        entity.serialize_state(&mut w, inventory);
        self.player_data.insert(player_id, w.into_bytes());
        true
    }

    /// Apply a player's saved state, if there is any.
    ///
    /// Returns `Ok(false)` when nothing is stored for the player.
    pub fn load_player(
        &self,
        key: EntityKey,
        roster: &mut WorldRoster,
        inventory: &mut InventorySystem,
    ) -> SaveResult<bool> {
        let Some(entity) = roster.get_mut(key) else {
            return Ok(false);
        };
        let Some(data) = entity.player_id().and_then(|id| self.player_data.get(&id)) else {
            return Ok(false);
        };

        entity.deserialize_state(&mut ByteReader::new(data), inventory)?;
        Ok(true)
    }

    /// Serialize the whole world
    pub fn save_all(&mut self, roster: &WorldRoster, inventory: &InventorySystem) -> Vec<u8> {
        let world_id = self
            .world_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();

        for key in roster.connected_players() {
            self.save_player(key, roster, inventory);
        }

        let mut w = ByteWriter::new();
        w.write_i32(self.version);
        w.write_str(&world_id);
        inventory.serialize(&mut w);

        w.write_i32(self.player_data.len() as i32);
        for (player_id, data) in &self.player_data {
            w.write_i64(*player_id);
            w.write_i32(data.len() as i32);
            w.write_raw(data);
        }

        let entities: Vec<_> = roster
            .iter()
            .filter(|(_, e)| e.should_save_state() && e.player_id().is_none())
            .collect();
        w.write_i32(entities.len() as i32);
        for (_, entity) in entities {
            let mut state = ByteWriter::new();
            entity.serialize_state(&mut state, inventory);

            w.write_str(entity.type_name());
            w.write_i32(state.len() as i32);
            w.write_raw(state.as_bytes());
            match entity.map_anchor() {
                Some(anchor) => {
                    w.write_bool(true);
                    w.write_str(anchor);
                }
                None => w.write_bool(false),
            }
        }

        w.write_u64(self.persistent_ids.last());

        log::info!(
            "Saved world {} ({} containers, {} players, {} bytes)",
            world_id,
            inventory.containers().len(),
            self.player_data.len(),
            w.len()
        );
        w.into_bytes()
    }

    /// Replace the world with the contents of `blob`
    pub fn load_all(
        &mut self,
        blob: &[u8],
        roster: &mut WorldRoster,
        inventory: &mut InventorySystem,
    ) -> SaveResult<LoadReport> {
        let mut r = ByteReader::new(blob);

        let version = r.read_i32()?;
        if version != self.version {
            log::warn!(
                "Refusing to load save version {} (expected {})",
                version,
                self.version
            );
            return Err(SaveError::VersionMismatch(version, self.version));
        }
        let parsed = parse_body(&mut r)?;

        // Map-placed entities and live players survive; everything else is
        // recreated from the blob
        for key in roster.keys() {
            let transient = roster
                .get(key)
                .map(|e| e.map_anchor().is_none() && e.player_id().is_none())
                .unwrap_or(false);
            if transient {
                roster.despawn(key, inventory);
            }
        }

        let mut report = LoadReport {
            world_id: parsed.world_id.clone(),
            ..Default::default()
        };
        self.world_id = Some(parsed.world_id);
        report.items_restored = inventory.restore(&parsed.inventory);

        self.load_entities(parsed.entities, roster, inventory, &mut report);

        self.player_data.extend(parsed.players);
        self.load_players(roster, inventory, &mut report);

        self.persistent_ids.reset(parsed.next_persistent_id);

        let keys = roster.keys();
        for key in &keys {
            if let Some(entity) = roster.get_mut(*key) {
                entity.before_state_loaded(inventory);
            }
        }
        for key in &keys {
            if let Some(entity) = roster.get_mut(*key) {
                entity.after_state_loaded(inventory);
            }
        }

        log::info!(
            "Loaded world {} ({} items, {} players, {} entities, {} failures)",
            report.world_id,
            report.items_restored,
            report.players_restored,
            report.entities_restored,
            report.failures.len()
        );
        Ok(report)
    }

    fn load_entities(
        &self,
        records: Vec<EntityRecord>,
        roster: &mut WorldRoster,
        inventory: &mut InventorySystem,
        report: &mut LoadReport,
    ) {
        // Pass 1: every record gets a live entity before any state is read
        let mut matched = Vec::with_capacity(records.len());
        for record in records {
            let target = match &record.anchor {
                Some(anchor) => roster.find_by_anchor(anchor).map(|key| (key, false)),
                None => roster.spawn(&record.type_name).map(|key| (key, true)),
            };

            match target {
                Some((key, spawned)) => matched.push((record, key, spawned)),
                None => {
                    let reason = match &record.anchor {
                        Some(anchor) => format!("no map entity with anchor {:?}", anchor),
                        None => format!("unknown entity type {:?}", record.type_name),
                    };
                    fail(report, &record.type_name, record.anchor.clone(), reason);
                }
            }
        }

        // Pass 2: read state; one bad entity never stops the others
        for (record, key, spawned) in matched {
            let result = match roster.get_mut(key) {
                Some(entity) if entity.type_name() != record.type_name => Err(CodecError::invalid(format!(
                    "anchor is held by a {:?}",
                    entity.type_name()
                ))),
                Some(entity) => entity.deserialize_state(&mut ByteReader::new(&record.data), inventory),
                None => continue,
            };

            match result {
                Ok(()) => report.entities_restored += 1,
                Err(err) => {
                    if spawned {
                        roster.despawn(key, inventory);
                    }
                    fail(report, &record.type_name, record.anchor, err.to_string());
                }
            }
        }
    }

    fn load_players(&self, roster: &mut WorldRoster, inventory: &mut InventorySystem, report: &mut LoadReport) {
        for (player_id, data) in &self.player_data {
            let key = match roster.find_player(*player_id) {
                Some(key) => key,
                None => match roster.spawn_player(*player_id) {
                    Some(key) => key,
                    None => {
                        fail(report, "player", None, format!("no player factory for {}", player_id));
                        continue;
                    }
                },
            };

            let Some(entity) = roster.get_mut(key) else {
                continue;
            };
            match entity.deserialize_state(&mut ByteReader::new(data), inventory) {
                Ok(()) => report.players_restored += 1,
                Err(err) => {
                    let type_name = entity.type_name().to_string();
                    fail(report, &type_name, None, format!("player {}: {}", player_id, err));
                }
            }
        }
    }

    /// Save the world into `storage` under `name`
    pub fn save_to_storage(
        &mut self,
        storage: &mut dyn SaveStorage,
        name: &str,
        roster: &WorldRoster,
        inventory: &InventorySystem,
    ) -> SaveResult<()> {
        let blob = self.save_all(roster, inventory);
        storage.write(name, &blob)
    }

    /// Load the world stored under `name`
    pub fn load_from_storage(
        &mut self,
        storage: &dyn SaveStorage,
        name: &str,
        roster: &mut WorldRoster,
        inventory: &mut InventorySystem,
    ) -> SaveResult<LoadReport> {
        let blob = storage.read(name)?;
        self.load_all(&blob, roster, inventory)
    }
}

fn fail(report: &mut LoadReport, type_name: &str, anchor: Option<String>, reason: String) {
    log::warn!("Failed to restore {} ({:?}): {}", type_name, anchor, reason);
    report.failures.push(EntityRestoreFailure {
        type_name: type_name.to_string(),
        anchor,
        reason,
    });
}

fn parse_body(r: &mut ByteReader<'_>) -> CodecResult<ParsedSave> {
    let world_id = r.read_string()?;
    let inventory = InventorySnapshot::read(r)?;

    let mut players = BTreeMap::new();
    for _ in 0..r.read_len_i32()? {
        let player_id = r.read_i64()?;
        let len = r.read_len_i32()?;
        players.insert(player_id, r.read_raw(len)?.to_vec());
    }

    let count = r.read_len_i32()?;
    let mut entities = Vec::new();
    for _ in 0..count {
        let type_name = r.read_string()?;
        let len = r.read_len_i32()?;
        let data = r.read_raw(len)?.to_vec();
        let anchor = if r.read_bool()? { Some(r.read_string()?) } else { None };
        entities.push(EntityRecord { type_name, data, anchor });
    }

    let next_persistent_id = r.read_u64()?;
    if !r.is_empty() {
        return Err(CodecError::invalid(format!("{} trailing bytes", r.remaining())));
    }

    Ok(ParsedSave {
        world_id,
        inventory,
        players,
        entities,
        next_persistent_id,
    })
}
