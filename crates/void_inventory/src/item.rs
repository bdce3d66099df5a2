//! Item instances

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::container::{InventoryId, SlotId};
use crate::definition::{ItemClass, ItemDefinition};

/// Unique identifier of an item instance for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the raw id value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Identifier of a world entity that currently represents an item
/// (a dropped pickup, a weapon in hand, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldRef(pub u64);

/// Item property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemProperty {
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<ItemProperty>),
}

impl ItemProperty {
    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Instance-specific properties (durability, loaded ammo, ...)
pub type InstanceData = BTreeMap<String, ItemProperty>;

/// A live item instance.
///
/// Items never own their container; `container` is an id looked up through
/// the container registry, so removing the container is enough to invalidate
/// it.
#[derive(Debug, Clone)]
pub struct Item {
    id: ItemId,
    definition_key: String,
    class: ItemClass,
    stack_size: u32,
    max_stack: u32,
    slot_id: Option<SlotId>,
    dirty: bool,
    container: Option<InventoryId>,
    world_entity: Option<WorldRef>,
    instance_data: InstanceData,
}

impl Item {
    /// Instantiate an item from its definition with the default stack size
    pub(crate) fn from_definition(id: ItemId, definition: &ItemDefinition) -> Self {
        let max_stack = definition.max_stack.max(1);
        let mut item = Self {
            id,
            definition_key: definition.id.clone(),
            class: definition.class,
            stack_size: definition.default_stack.max(1).min(max_stack),
            max_stack,
            slot_id: None,
            dirty: false,
            container: None,
            world_entity: None,
            instance_data: InstanceData::new(),
        };
        definition.class.on_created(&mut item, definition);
        item
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Stable definition key, the same across saves
    pub fn definition_key(&self) -> &str {
        &self.definition_key
    }

    pub fn class(&self) -> ItemClass {
        self.class
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    pub fn max_stack(&self) -> u32 {
        self.max_stack
    }

    /// Room left on this stack
    pub fn space(&self) -> u32 {
        self.max_stack.saturating_sub(self.stack_size)
    }

    /// Slot inside the owning container, if any
    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Owning container, if any
    pub fn container(&self) -> Option<InventoryId> {
        self.container
    }

    /// World representation, if any
    pub fn world_entity(&self) -> Option<WorldRef> {
        self.world_entity
    }

    /// Neither in a container nor represented in the world
    pub fn is_orphaned(&self) -> bool {
        self.container.is_none() && self.world_entity.is_none()
    }

    pub fn instance_data(&self) -> &InstanceData {
        &self.instance_data
    }

    /// Get an instance property
    pub fn get_property(&self, key: &str) -> Option<&ItemProperty> {
        self.instance_data.get(key)
    }

    /// Whether `other` may be merged into the same stack as this item.
    ///
    /// Requires the same definition, a stackable class and definition, and
    /// identical instance data.
    pub fn can_stack_with(&self, other: &Item) -> bool {
        self.id != other.id
            && self.definition_key == other.definition_key
            && self.max_stack > 1
            && self.class.allows_stacking()
            && self.instance_data == other.instance_data
    }

    /// Add to this stack (returns overflow if any)
    pub(crate) fn add(&mut self, amount: u32) -> u32 {
        let to_add = amount.min(self.space());
        self.stack_size += to_add;
        amount - to_add
    }

    pub(crate) fn set_stack_size(&mut self, stack_size: u32) {
        self.stack_size = stack_size.min(self.max_stack);
    }

    pub(crate) fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }

    pub(crate) fn set_slot(&mut self, container: Option<InventoryId>, slot: Option<SlotId>) {
        self.container = container;
        self.slot_id = slot;
    }

    pub(crate) fn set_world_entity(&mut self, world_entity: Option<WorldRef>) {
        self.world_entity = world_entity;
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub(crate) fn set_property(&mut self, key: String, value: ItemProperty) {
        self.instance_data.insert(key, value);
    }

    pub(crate) fn set_instance_data(&mut self, data: InstanceData) {
        self.instance_data = data;
    }

    /// Encode the type-specific payload
    pub fn encode_payload(&self) -> Vec<u8> {
        encode_instance_data(&self.instance_data)
    }
}

/// Encode instance data with bincode; an empty map encodes to no bytes
pub fn encode_instance_data(data: &InstanceData) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    match bincode::serialize(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Failed to encode item instance data: {}", e);
            Vec::new()
        }
    }
}

/// Decode instance data written by [`encode_instance_data`]
pub fn decode_instance_data(bytes: &[u8]) -> Result<InstanceData, bincode::Error> {
    if bytes.is_empty() {
        return Ok(InstanceData::new());
    }
    bincode::deserialize(bytes)
}
