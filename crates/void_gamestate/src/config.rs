//! Persistence configuration
//!
//! ```toml
//! [persistence]
//! save_dir = "saves"
//! save_name = "world"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::persistence::FORMAT_VERSION;
use crate::save::{FileStorage, SaveResult};

/// Where and how the world is saved
#[derive(Debug, Clone, PartialEq)]
pub struct PersistConfig {
    /// Directory holding save files
    pub save_dir: PathBuf,
    /// Slot name of the full-world save
    pub save_name: String,
    /// Format version written and accepted on load
    pub format_version: i32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            save_name: "world".to_string(),
            format_version: FORMAT_VERSION,
        }
    }
}

impl PersistConfig {
    /// Create config for development (uses local directory)
    pub fn development() -> Self {
        Self {
            save_dir: PathBuf::from("./saves_dev"),
            save_name: "dev".to_string(),
            ..Default::default()
        }
    }

    /// Create config for testing (uses temp directory)
    pub fn testing() -> Self {
        Self {
            save_dir: std::env::temp_dir().join("void_gamestate_test_saves"),
            save_name: "test".to_string(),
            ..Default::default()
        }
    }

    /// File storage rooted at `save_dir`
    pub fn storage(&self) -> FileStorage {
        FileStorage::new(self.save_dir.clone())
    }

    /// Parse from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> SaveResult<Self> {
        let raw: ConfigFileToml = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(section) = raw.persistence {
            if let Some(dir) = section.save_dir {
                config.save_dir = dir;
            }
            if let Some(name) = section.save_name {
                config.save_name = name;
            }
            if let Some(version) = section.format_version {
                config.format_version = version;
            }
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> SaveResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFileToml {
    persistence: Option<PersistSectionToml>,
}

#[derive(Debug, Deserialize)]
struct PersistSectionToml {
    save_dir: Option<PathBuf>,
    save_name: Option<String>,
    format_version: Option<i32>,
}
