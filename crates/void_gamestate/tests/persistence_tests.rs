use std::cell::RefCell;
use std::rc::Rc;

use void_core::{ByteReader, ByteWriter, CodecError};
use void_gamestate::prelude::*;
use void_inventory::prelude::*;

type Journal = Rc<RefCell<Vec<String>>>;

const PLAYER: i64 = 76561198000000042;

fn catalog() -> DefinitionCatalog {
    let mut catalog = DefinitionCatalog::with_builtins();
    catalog
        .add_definition(
            ItemDefinition::new("wood", "Wood")
                .with_class(ItemClass::Material)
                .with_max_stack(100),
        )
        .unwrap();
    catalog
}

fn inventory() -> InventorySystem {
    let _ = env_logger::builder().is_test(true).try_init();
    InventorySystem::new(InventoryConfig::server(), catalog())
}

fn read_inventory_id(r: &mut ByteReader<'_>) -> Result<InventoryId, CodecError> {
    Ok(InventoryId(r.read_u64()?))
}

/// Map-placed storage box
struct Chest {
    anchor: String,
    inventory: InventoryId,
    journal: Journal,
}

/// Dropped loot bag, spawned at runtime
struct Bag {
    inventory: InventoryId,
    journal: Journal,
}

struct Pawn {
    player: i64,
    health: i32,
    inventory: InventoryId,
    journal: Journal,
}

/// Writes nothing, so it can never be read back
struct Fragile;

macro_rules! journaled {
    () => {
        fn before_state_loaded(&mut self, _inventory: &mut InventorySystem) {
            let entry = format!("before {}", self.type_name());
            self.journal.borrow_mut().push(entry);
        }

        fn after_state_loaded(&mut self, _inventory: &mut InventorySystem) {
            let entry = format!("after {}", self.type_name());
            self.journal.borrow_mut().push(entry);
        }
    };
}

impl Persistable for Chest {
    fn type_name(&self) -> &str {
        "chest"
    }

    fn map_anchor(&self) -> Option<&str> {
        Some(self.anchor.as_str())
    }

    fn serialize_state(&self, w: &mut ByteWriter, _inventory: &InventorySystem) {
        w.write_u64(self.inventory.raw());
    }

    fn deserialize_state(&mut self, r: &mut ByteReader<'_>, _inventory: &mut InventorySystem) -> Result<(), CodecError> {
        self.inventory = read_inventory_id(r)?;
        Ok(())
    }

    journaled!();
}

impl Persistable for Bag {
    fn type_name(&self) -> &str {
        "bag"
    }

    fn serialize_state(&self, w: &mut ByteWriter, _inventory: &InventorySystem) {
        w.write_u64(self.inventory.raw());
    }

    fn deserialize_state(&mut self, r: &mut ByteReader<'_>, _inventory: &mut InventorySystem) -> Result<(), CodecError> {
        self.inventory = read_inventory_id(r)?;
        Ok(())
    }

    journaled!();
}

impl Persistable for Pawn {
    fn type_name(&self) -> &str {
        "pawn"
    }

    fn player_id(&self) -> Option<i64> {
        Some(self.player)
    }

    fn serialize_state(&self, w: &mut ByteWriter, _inventory: &InventorySystem) {
        w.write_i32(self.health);
        w.write_u64(self.inventory.raw());
    }

    fn deserialize_state(&mut self, r: &mut ByteReader<'_>, _inventory: &mut InventorySystem) -> Result<(), CodecError> {
        self.health = r.read_i32()?;
        self.inventory = read_inventory_id(r)?;
        Ok(())
    }

    journaled!();
}

impl Persistable for Fragile {
    fn type_name(&self) -> &str {
        "fragile"
    }

    fn serialize_state(&self, _w: &mut ByteWriter, _inventory: &InventorySystem) {}

    fn deserialize_state(&mut self, r: &mut ByteReader<'_>, _inventory: &mut InventorySystem) -> Result<(), CodecError> {
        r.read_u32()?;
        Ok(())
    }
}

/// Roster with every type registered and the map chest already placed
fn roster(journal: &Journal) -> WorldRoster {
    let mut roster = WorldRoster::new();

    let bags = journal.clone();
    roster.register_type("bag", move || {
        Box::new(Bag {
            inventory: InventoryId::NONE,
            journal: bags.clone(),
        })
    });
    roster.register_type("fragile", || Box::new(Fragile));

    let pawns = journal.clone();
    roster.set_player_factory(move |player| {
        Box::new(Pawn {
            player,
            health: 0,
            inventory: InventoryId::NONE,
            journal: pawns.clone(),
        })
    });

    roster.insert(Box::new(Chest {
        anchor: "chest_north".to_string(),
        inventory: InventoryId::NONE,
        journal: journal.clone(),
    }));
    roster
}

/// A populated world: chest, one bag, one connected player
struct World {
    inventory: InventorySystem,
    roster: WorldRoster,
    journal: Journal,
}

impl World {
    fn empty() -> Self {
        let journal = Journal::default();
        Self {
            inventory: inventory(),
            roster: roster(&journal),
            journal,
        }
    }

    fn populated() -> Self {
        let mut world = Self::empty();
        let inv = &mut world.inventory;

        let chest_inv = inv.register(Container::new(OwnerRef(1), 4), 0).unwrap();
        inv.give_amount(chest_inv, "wood", 250).unwrap();
        let bag_inv = inv.register(Container::new(OwnerRef(2), 2), 0).unwrap();
        inv.give_amount(bag_inv, "stone", 30).unwrap();
        let pawn_inv = inv.register(Container::new(OwnerRef(3), 6), 0).unwrap();
        inv.give_amount(pawn_inv, "metal_fragments", 7).unwrap();

        let chest = world.roster.find_by_anchor("chest_north").unwrap();
        world.roster.despawn(chest, inv);
        world.roster.insert(Box::new(Chest {
            anchor: "chest_north".to_string(),
            inventory: chest_inv,
            journal: world.journal.clone(),
        }));
        world.roster.insert(Box::new(Bag {
            inventory: bag_inv,
            journal: world.journal.clone(),
        }));
        world.roster.insert(Box::new(Pawn {
            player: PLAYER,
            health: 87,
            inventory: pawn_inv,
            journal: world.journal.clone(),
        }));
        world.roster.connect(PLAYER);
        world
    }
}

#[test]
fn test_round_trip_into_fresh_world() {
    let source = World::populated();
    let mut manager = PersistenceManager::new();
    let blob = manager.save_all(&source.roster, &source.inventory);

    let mut target = World::empty();
    let mut loader = PersistenceManager::new();
    let report = loader
        .load_all(&blob, &mut target.roster, &mut target.inventory)
        .unwrap();

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.world_id, manager.world_id().unwrap());
    assert_eq!(report.entities_restored, 2);
    assert_eq!(report.players_restored, 1);
    assert_eq!(report.items_restored, 5);
    assert_eq!(target.inventory.snapshot(), source.inventory.snapshot());
    assert_eq!(loader.player_data(PLAYER), manager.player_data(PLAYER));

    // Chest re-matched, bag spawned, pawn spawned by the player factory
    assert_eq!(target.roster.len(), 3);
    assert!(target.roster.find_player(PLAYER).is_some());

    // Saving the restored world produces the same bytes
    assert_eq!(loader.save_all(&target.roster, &target.inventory), blob);
}

#[test]
fn test_round_trip_into_world_with_overlapping_ids() {
    let source = World::populated();
    let blob = PersistenceManager::new().save_all(&source.roster, &source.inventory);

    // Map content created at boot takes item ids the save also uses
    let mut target = World::empty();
    let map = target
        .inventory
        .register(Container::new(OwnerRef(99), 2), 40)
        .unwrap();
    target.inventory.give_amount(map, "stone", 5).unwrap();
    assert!(source.inventory.find_instance(ItemId(1)).is_some());

    let report = PersistenceManager::new()
        .load_all(&blob, &mut target.roster, &mut target.inventory)
        .unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);

    let restored: Vec<ContainerRecord> = target
        .inventory
        .snapshot()
        .containers
        .into_iter()
        .filter(|c| c.id != map)
        .collect();
    assert_eq!(restored, source.inventory.snapshot().containers);

    let kept = target.inventory.get_from_slot(map, 0).unwrap();
    let kept = target.inventory.find_instance(kept).unwrap();
    assert_eq!(kept.definition_key(), "stone");
    assert_eq!(kept.stack_size(), 5);
    assert_eq!(target.inventory.sweep_orphans(), 0);
}

#[test]
fn test_load_replaces_transient_entities() {
    let mut world = World::populated();
    let mut manager = PersistenceManager::new();
    let blob = manager.save_all(&world.roster, &world.inventory);

    world.roster.spawn("bag").unwrap();
    world.roster.spawn("bag").unwrap();
    assert_eq!(world.roster.len(), 5);

    manager
        .load_all(&blob, &mut world.roster, &mut world.inventory)
        .unwrap();
    assert_eq!(world.roster.len(), 3);
}

#[test]
fn test_version_mismatch_leaves_world_unchanged() {
    let mut world = World::populated();
    let mut old = PersistenceManager::with_version(FORMAT_VERSION - 1);
    let blob = old.save_all(&World::empty().roster, &inventory());

    let before = world.inventory.snapshot();
    let mut manager = PersistenceManager::new();
    let err = manager
        .load_all(&blob, &mut world.roster, &mut world.inventory)
        .unwrap_err();

    assert!(matches!(err, SaveError::VersionMismatch(found, expected)
        if found == FORMAT_VERSION - 1 && expected == FORMAT_VERSION));
    assert_eq!(world.roster.len(), 3);
    assert_eq!(world.inventory.snapshot(), before);
    assert!(world.journal.borrow().is_empty());
}

#[test]
fn test_one_bad_entity_does_not_stop_the_load() {
    let mut world = World::populated();
    world.roster.spawn("fragile").unwrap();
    let blob = PersistenceManager::new().save_all(&world.roster, &world.inventory);

    let mut target = World::empty();
    let report = PersistenceManager::new()
        .load_all(&blob, &mut target.roster, &mut target.inventory)
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].type_name, "fragile");
    assert_eq!(report.failures[0].anchor, None);
    assert_eq!(report.entities_restored, 2);
    assert_eq!(report.players_restored, 1);
    // The half-restored entity is not left in the world
    assert_eq!(target.roster.len(), 3);
}

#[test]
fn test_unknown_type_and_missing_anchor_are_reported() {
    let world = World::populated();
    let blob = PersistenceManager::new().save_all(&world.roster, &world.inventory);

    let mut inventory = inventory();
    let mut bare = WorldRoster::new();
    let report = PersistenceManager::new()
        .load_all(&blob, &mut bare, &mut inventory)
        .unwrap();

    let mut failed: Vec<&str> = report.failures.iter().map(|f| f.type_name.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["bag", "chest", "player"]);
    assert!(report
        .failures
        .iter()
        .any(|f| f.anchor.as_deref() == Some("chest_north")));
    assert_eq!(report.entities_restored, 0);
    // Inventory still restored
    assert_eq!(inventory.snapshot(), world.inventory.snapshot());
}

#[test]
fn test_restore_hooks_run_in_two_phases() {
    let world = World::populated();
    let blob = PersistenceManager::new().save_all(&world.roster, &world.inventory);

    let mut target = World::empty();
    PersistenceManager::new()
        .load_all(&blob, &mut target.roster, &mut target.inventory)
        .unwrap();

    let journal = target.journal.borrow();
    assert_eq!(journal.len(), 6);
    let first_after = journal.iter().position(|e| e.starts_with("after")).unwrap();
    assert!(journal[..first_after].iter().all(|e| e.starts_with("before")));
    assert!(journal[first_after..].iter().all(|e| e.starts_with("after")));
}

#[test]
fn test_per_player_save_and_load() {
    let mut world = World::populated();
    let mut manager = PersistenceManager::new();
    let pawn = world.roster.find_player(PLAYER).unwrap();

    assert!(!manager.load_player(pawn, &mut world.roster, &mut world.inventory).unwrap());
    assert!(manager.save_player(pawn, &world.roster, &world.inventory));
    assert!(manager.player_data(PLAYER).is_some());

    let chest = world.roster.find_by_anchor("chest_north").unwrap();
    assert!(!manager.save_player(chest, &world.roster, &world.inventory));

    assert!(manager.load_player(pawn, &mut world.roster, &mut world.inventory).unwrap());
}

#[test]
fn test_offline_player_data_is_kept() {
    let mut world = World::populated();
    let mut manager = PersistenceManager::new();
    manager.save_all(&world.roster, &world.inventory);

    // Player leaves; the table still carries their last state
    world.roster.disconnect(PLAYER);
    let blob = manager.save_all(&world.roster, &world.inventory);

    let mut target = World::empty();
    let mut loader = PersistenceManager::new();
    let report = loader
        .load_all(&blob, &mut target.roster, &mut target.inventory)
        .unwrap();
    assert_eq!(report.players_restored, 1);
    assert!(loader.player_data(PLAYER).is_some());
}

#[test]
fn test_file_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = PersistConfig {
        save_dir: dir.path().join("saves"),
        ..PersistConfig::testing()
    };
    let mut storage = config.storage();

    let world = World::populated();
    let mut manager = PersistenceManager::from_config(&config);
    manager
        .save_to_storage(&mut storage, &config.save_name, &world.roster, &world.inventory)
        .unwrap();
    assert_eq!(storage.list().unwrap(), vec![config.save_name.clone()]);

    let mut target = World::empty();
    let report = PersistenceManager::from_config(&config)
        .load_from_storage(&storage, &config.save_name, &mut target.roster, &mut target.inventory)
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(target.inventory.snapshot(), world.inventory.snapshot());

    assert!(matches!(
        manager.load_from_storage(&storage, "missing", &mut target.roster, &mut target.inventory),
        Err(SaveError::SlotNotFound(_))
    ));
}
