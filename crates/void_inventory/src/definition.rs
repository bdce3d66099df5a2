//! Item definitions and the definition catalog
//!
//! A definition is an immutable template identified by a stable string key.
//! The catalog is rebuilt from two sources on every reload:
//!
//! 1. built-in, code-defined definitions ([`builtin_definitions`])
//! 2. declarative TOML resources, one or more `[[item]]` tables per file
//!
//! ```toml
//! [[item]]
//! id = "wood"
//! name = "Wood"
//! class = "material"
//! max_stack = 100
//! cost = 2
//! tags = ["fuel"]
//!
//! [item.properties]
//! burn_time = 12.5
//! ```
//!
//! Each resource names an [`ItemClass`]; the class table is the only place
//! that maps a name to item behavior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::item::{Item, ItemProperty};

/// Errors from loading or extending the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Duplicate item definition: {0}")]
    DuplicateDefinition(String),

    #[error("Unknown item class '{class}' for definition {id}")]
    UnknownClass { id: String, class: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Item class - selects creation and stacking behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemClass {
    /// Plain item with no special behavior
    Generic,
    /// Crafting materials
    Material,
    /// Food, medicine and other consumables
    Consumable,
    /// Crafting components
    Component,
    /// Weapons and tools (never stack)
    Weapon,
    /// Ammunition
    Ammo,
}

impl Default for ItemClass {
    fn default() -> Self {
        Self::Generic
    }
}

impl ItemClass {
    /// Every registered class
    pub const ALL: [ItemClass; 6] = [
        Self::Generic,
        Self::Material,
        Self::Consumable,
        Self::Component,
        Self::Weapon,
        Self::Ammo,
    ];

    /// Resource name of this class
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Material => "material",
            Self::Consumable => "consumable",
            Self::Component => "component",
            Self::Weapon => "weapon",
            Self::Ammo => "ammo",
        }
    }

    /// Resolve a class from its resource name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.name().eq_ignore_ascii_case(name))
    }

    /// Whether items of this class may share a stack
    pub fn allows_stacking(&self) -> bool {
        !matches!(self, Self::Weapon)
    }

    /// Creation hook applied to every new instance of this class
    pub(crate) fn on_created(&self, item: &mut Item, definition: &ItemDefinition) {
        match self {
            Self::Weapon => {
                let durability = definition
                    .get_property("durability")
                    .and_then(ItemProperty::as_float)
                    .unwrap_or(100.0);
                item.set_property("durability".to_string(), ItemProperty::Float(durability));
            }
            Self::Generic | Self::Material | Self::Consumable | Self::Component | Self::Ammo => {}
        }
    }
}

/// Item definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Unique identifier (stable across saves)
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Class
    pub class: ItemClass,
    /// Stack size of freshly created instances
    pub default_stack: u32,
    /// Maximum stack size (1 = not stackable)
    pub max_stack: u32,
    /// Base cost
    pub cost: u32,
    /// Tags for filtering
    pub tags: Vec<String>,
    /// Custom properties
    pub properties: BTreeMap<String, ItemProperty>,
}

impl ItemDefinition {
    /// Create a new item definition
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            class: ItemClass::default(),
            default_stack: 1,
            max_stack: 1,
            cost: 0,
            tags: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set class
    pub fn with_class(mut self, class: ItemClass) -> Self {
        self.class = class;
        self
    }

    /// Set max stack size
    pub fn with_max_stack(mut self, max: u32) -> Self {
        self.max_stack = max.max(1);
        self
    }

    /// Set default stack size
    pub fn with_default_stack(mut self, size: u32) -> Self {
        self.default_stack = size.max(1);
        self
    }

    /// Set cost
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: ItemProperty) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Check if item has a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Get property value
    pub fn get_property(&self, key: &str) -> Option<&ItemProperty> {
        self.properties.get(key)
    }

    /// Check if stackable
    pub fn is_stackable(&self) -> bool {
        self.max_stack > 1 && self.class.allows_stacking()
    }
}

/// Code-defined definitions registered ahead of resource files
pub fn builtin_definitions() -> Vec<ItemDefinition> {
    vec![
        ItemDefinition::new("stone", "Stone")
            .with_class(ItemClass::Material)
            .with_description("A bunch of stones. Usually obtained by smashing rocks until they break.")
            .with_max_stack(50),
        ItemDefinition::new("metal_fragments", "Metal Fragments")
            .with_class(ItemClass::Material)
            .with_description("Fragments of metal. Usually obtained by smelting metal ore.")
            .with_max_stack(10),
    ]
}

/// Raw TOML structure for a resource file
#[derive(Debug, Deserialize)]
struct ResourceFileToml {
    #[serde(default)]
    item: Vec<ItemToml>,
}

/// Raw TOML structure for one item resource
#[derive(Debug, Deserialize)]
struct ItemToml {
    id: String,
    name: Option<String>,
    #[serde(default)]
    description: String,
    class: Option<String>,
    default_stack: Option<u32>,
    max_stack: Option<u32>,
    #[serde(default)]
    cost: u32,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    properties: BTreeMap<String, toml::Value>,
}

fn property_from_toml(value: toml::Value) -> ItemProperty {
    match value {
        toml::Value::Integer(v) => ItemProperty::Int(v),
        toml::Value::Float(v) => ItemProperty::Float(v),
        toml::Value::Boolean(v) => ItemProperty::Bool(v),
        toml::Value::String(v) => ItemProperty::String(v),
        toml::Value::Array(values) => {
            ItemProperty::Array(values.into_iter().map(property_from_toml).collect())
        }
        other => ItemProperty::String(other.to_string()),
    }
}

/// Parse every `[[item]]` table of a resource file
pub fn parse_resources(content: &str) -> CatalogResult<Vec<ItemDefinition>> {
    let raw: ResourceFileToml = toml::from_str(content)?;

    raw.item
        .into_iter()
        .map(|item| {
            let class = match item.class.as_deref() {
                None => ItemClass::Generic,
                Some(name) => ItemClass::from_name(name).ok_or_else(|| CatalogError::UnknownClass {
                    id: item.id.clone(),
                    class: name.to_string(),
                })?,
            };

            let mut definition = ItemDefinition::new(item.id.clone(), item.name.unwrap_or(item.id))
                .with_description(item.description)
                .with_class(class)
                .with_max_stack(item.max_stack.unwrap_or(1))
                .with_default_stack(item.default_stack.unwrap_or(1))
                .with_cost(item.cost);
            definition.tags = item.tags;
            definition.properties = item
                .properties
                .into_iter()
                .map(|(k, v)| (k, property_from_toml(v)))
                .collect();

            Ok(definition)
        })
        .collect()
}

/// Catalog of item definitions keyed by their stable id
#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    definitions: BTreeMap<String, ItemDefinition>,
    sources: Vec<PathBuf>,
}

impl DefinitionCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the built-in definitions
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for definition in builtin_definitions() {
            // Built-in keys are distinct
            let _ = catalog.add_definition(definition);
        }
        catalog
    }

    /// Register a resource file or directory consulted by [`reload`](Self::reload)
    pub fn add_source(&mut self, path: impl Into<PathBuf>) {
        self.sources.push(path.into());
    }

    /// Registered resource paths
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Add a definition; duplicate keys are rejected
    pub fn add_definition(&mut self, definition: ItemDefinition) -> CatalogResult<()> {
        if self.definitions.contains_key(&definition.id) {
            log::error!(
                "Unable to add item definition for: {}. Another item with this unique id already exists!",
                definition.id
            );
            return Err(CatalogError::DuplicateDefinition(definition.id));
        }

        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Parse and add every definition in a TOML string
    pub fn add_resources_str(&mut self, content: &str) -> CatalogResult<usize> {
        let definitions = parse_resources(content)?;
        let count = definitions.len();
        for definition in definitions {
            self.add_definition(definition)?;
        }
        Ok(count)
    }

    /// Load a single resource file or every `.toml` file of a directory
    pub fn load_path(&mut self, path: &Path) -> CatalogResult<usize> {
        let io_err = |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !path.is_dir() {
            let content = fs::read_to_string(path).map_err(io_err)?;
            return self.add_resources_str(&content);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "toml").unwrap_or(false))
            .collect();
        files.sort();

        let mut count = 0;
        for file in files {
            count += self.load_path(&file)?;
        }
        Ok(count)
    }

    /// Rebuild the catalog from built-ins plus every registered source.
    ///
    /// On failure the current definitions are kept untouched.
    pub fn reload(&mut self) -> CatalogResult<usize> {
        let mut fresh = Self::with_builtins();
        for source in &self.sources {
            fresh.load_path(source)?;
        }

        self.definitions = fresh.definitions;
        log::info!("Loaded {} item definitions", self.definitions.len());
        Ok(self.definitions.len())
    }

    /// Get a definition by key
    pub fn get(&self, key: &str) -> Option<&ItemDefinition> {
        self.definitions.get(key)
    }

    /// Check if a key is defined
    pub fn contains(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterate definitions in key order
    pub fn iter(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.definitions.values()
    }
}
