//! Void Inventory - Items, Containers and Replication
//!
//! This crate owns every item and container of a simulation session.
//!
//! # Features
//!
//! - Definition catalog loaded from built-ins and TOML resources
//! - Item registry with monotonic ids and idempotent create
//! - Fixed-capacity containers with stack/move/split/transfer
//! - Dirty tracking and per-tick replication to observing clients
//! - Validated client requests (move/split/transfer)
//! - Binary snapshots of the item/container graph for save files
//! - Orphan sweep for items left without a container or world entity
//!
//! # Example
//!
//! ```ignore
//! use void_inventory::prelude::*;
//!
//! let mut inventory = InventorySystem::initialize(InventoryConfig::server())?;
//! let backpack = inventory.register(Container::new(OwnerRef(1), 24), 0)?;
//!
//! let stone = inventory.create_item("stone", 0)?;
//! inventory.set_stack_size(stone, 30)?;
//! let remainder = inventory.stack(backpack, stone)?;
//!
//! // Once per server tick
//! inventory.tick();
//! for envelope in inventory.drain_outbox() {
//!     // hand envelope.frame to the transport
//! }
//! ```

pub mod config;
pub mod container;
pub mod definition;
pub mod error;
pub mod event;
pub mod item;
pub mod network;
pub mod ops;
pub mod registry;
pub mod snapshot;
pub mod system;

pub mod prelude {
    pub use crate::config::{ConfigError, InventoryConfig};
    pub use crate::container::{Container, InventoryId, OwnerRef, SlotId};
    pub use crate::definition::{CatalogError, DefinitionCatalog, ItemClass, ItemDefinition};
    pub use crate::error::{InventoryError, InventoryResult};
    pub use crate::event::InventoryEvent;
    pub use crate::item::{InstanceData, Item, ItemId, ItemProperty, WorldRef};
    pub use crate::network::{ClientId, Envelope, InventoryMessage, NetRole, NetworkEvent, ProtocolError, Recipient};
    pub use crate::snapshot::{ContainerRecord, InventorySnapshot, ItemRecord};
    pub use crate::system::InventorySystem;
}

pub use prelude::*;
