//! Void GameState - World Persistence
//!
//! Saves and restores the whole world: the inventory graph, per-player
//! state and every entity that opts into persistence.
//!
//! # Features
//!
//! - Versioned binary world blob with a minted world id
//! - Per-player save table, included in the world blob
//! - Map-placed entities re-matched by anchor instead of respawned
//! - Per-entity restore failures collected instead of aborting the load
//! - File and in-memory save storage
//!
//! # Example
//!
//! ```ignore
//! use void_gamestate::prelude::*;
//!
//! let mut manager = PersistenceManager::from_config(&config);
//! manager.save_to_storage(&mut storage, &config.save_name, &roster, &inventory)?;
//! let report = manager.load_from_storage(&storage, &config.save_name, &mut roster, &mut inventory)?;
//! ```

pub mod config;
pub mod entity;
pub mod persistence;
pub mod save;

pub mod prelude {
    pub use crate::config::PersistConfig;
    pub use crate::entity::{EntityKey, Persistable, WorldRoster};
    pub use crate::persistence::{EntityRestoreFailure, LoadReport, PersistenceManager, FORMAT_VERSION};
    pub use crate::save::{FileStorage, MemoryStorage, SaveError, SaveResult, SaveStorage};
}

pub use prelude::*;
