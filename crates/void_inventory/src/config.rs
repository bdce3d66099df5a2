//! Inventory system configuration
//!
//! Loaded from the `[inventory]` table of a TOML file:
//!
//! ```toml
//! [inventory]
//! role = "server"
//! max_slot_limit = 64
//! sweep_orphans = true
//! track_events = true
//! definition_paths = ["assets/items"]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::container::SlotId;
use crate::network::NetRole;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Inventory system configuration
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryConfig {
    /// Server (authoritative) or client (replica)
    pub role: NetRole,
    /// Largest slot limit a container may be registered with
    pub max_slot_limit: SlotId,
    /// Reclaim orphaned items on every tick
    pub sweep_orphans: bool,
    /// Queue lifecycle events for observers
    pub track_events: bool,
    /// Definition resource files or directories
    pub definition_paths: Vec<PathBuf>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            role: NetRole::Server,
            max_slot_limit: 256,
            sweep_orphans: true,
            track_events: true,
            definition_paths: Vec::new(),
        }
    }
}

impl InventoryConfig {
    /// Authoritative server preset
    pub fn server() -> Self {
        Self::default()
    }

    /// Client replica preset; clients never reclaim items on their own
    pub fn client() -> Self {
        Self {
            role: NetRole::Client,
            sweep_orphans: false,
            ..Default::default()
        }
    }

    /// Add a definition resource path
    pub fn with_definition_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.definition_paths.push(path.into());
        self
    }

    /// Parse from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: ConfigFileToml = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(section) = raw.inventory {
            if let Some(role) = section.role {
                config.role = role;
            }
            if let Some(limit) = section.max_slot_limit {
                config.max_slot_limit = limit;
            }
            if let Some(sweep) = section.sweep_orphans {
                config.sweep_orphans = sweep;
            }
            if let Some(track) = section.track_events {
                config.track_events = track;
            }
            config.definition_paths = section.definition_paths;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFileToml {
    inventory: Option<InventorySectionToml>,
}

#[derive(Debug, Deserialize)]
struct InventorySectionToml {
    role: Option<NetRole>,
    max_slot_limit: Option<SlotId>,
    sweep_orphans: Option<bool>,
    track_events: Option<bool>,
    #[serde(default)]
    definition_paths: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(InventoryConfig::server().role, NetRole::Server);
        let client = InventoryConfig::client();
        assert_eq!(client.role, NetRole::Client);
        assert!(!client.sweep_orphans);
    }

    #[test]
    fn test_from_toml() {
        let config = InventoryConfig::from_toml_str(
            r#"
[inventory]
role = "client"
max_slot_limit = 32
definition_paths = ["assets/items", "mods/items.toml"]
"#,
        )
        .unwrap();

        assert_eq!(config.role, NetRole::Client);
        assert_eq!(config.max_slot_limit, 32);
        assert!(config.sweep_orphans);
        assert_eq!(config.definition_paths.len(), 2);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(InventoryConfig::from_toml_str("").unwrap(), InventoryConfig::default());
    }

    #[test]
    fn test_bad_role() {
        let result = InventoryConfig::from_toml_str("[inventory]\nrole = \"observer\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
