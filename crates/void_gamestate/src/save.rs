//! Save storage backends

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use void_core::CodecError;

/// Save system errors
#[derive(Debug, Error)]
pub enum SaveError {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed save data
    #[error("Malformed save data: {0}")]
    Codec(#[from] CodecError),
    /// Version mismatch
    #[error("Version mismatch: save version {0}, current version {1}")]
    VersionMismatch(i32, i32),
    /// Slot not found
    #[error("Save slot not found: {0}")]
    SlotNotFound(String),
    /// Slot name that cannot be used as a file name
    #[error("Invalid save slot name: {0:?}")]
    InvalidName(String),
    /// Configuration file error
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for save operations
pub type SaveResult<T> = Result<T, SaveError>;

/// Where save blobs live
pub trait SaveStorage {
    /// Store a blob under `name`, replacing any previous one
    fn write(&mut self, name: &str, data: &[u8]) -> SaveResult<()>;

    /// Fetch the blob stored under `name`
    fn read(&self, name: &str) -> SaveResult<Vec<u8>>;

    /// Check if a blob exists
    fn exists(&self, name: &str) -> bool;

    /// Delete a blob; deleting a missing one is not an error
    fn delete(&mut self, name: &str) -> SaveResult<()>;

    /// Names of every stored blob, sorted
    fn list(&self) -> SaveResult<Vec<String>>;
}

fn check_name(name: &str) -> SaveResult<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(SaveError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Directory of `<name>.sav` files
#[derive(Debug, Clone)]
pub struct FileStorage {
    save_dir: PathBuf,
}

impl FileStorage {
    /// Save file extension
    pub const EXTENSION: &'static str = "sav";

    /// Create storage rooted at `save_dir`; the directory is created lazily
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Ensure save directory exists
    pub fn ensure_dir(&self) -> SaveResult<()> {
        fs::create_dir_all(&self.save_dir)?;
        Ok(())
    }

    /// Get save file path for a slot
    pub fn slot_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(format!("{}.{}", name, Self::EXTENSION))
    }
}

impl SaveStorage for FileStorage {
    fn write(&mut self, name: &str, data: &[u8]) -> SaveResult<()> {
        check_name(name)?;
        self.ensure_dir()?;

        // Readers never observe a partially written save
        let path = self.slot_path(name);
        let tmp = path.with_extension("sav.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;

        log::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn read(&self, name: &str) -> SaveResult<Vec<u8>> {
        check_name(name)?;
        let path = self.slot_path(name);

        if !path.exists() {
            return Err(SaveError::SlotNotFound(name.to_string()));
        }

        Ok(fs::read(&path)?)
    }

    fn exists(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.slot_path(name).exists()
    }

    fn delete(&mut self, name: &str) -> SaveResult<()> {
        check_name(name)?;
        let path = self.slot_path(name);

        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn list(&self) -> SaveResult<Vec<String>> {
        if !self.save_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.save_dir)? {
            let path = entry?.path();

            if path.extension().map(|e| e == Self::EXTENSION).unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

/// In-memory storage for tests and dedicated-server hosts that persist
/// blobs elsewhere
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStorage for MemoryStorage {
    fn write(&mut self, name: &str, data: &[u8]) -> SaveResult<()> {
        check_name(name)?;
        self.blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> SaveResult<Vec<u8>> {
        self.blobs
            .get(name)
            .cloned()
            .ok_or_else(|| SaveError::SlotNotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    fn delete(&mut self, name: &str) -> SaveResult<()> {
        self.blobs.remove(name);
        Ok(())
    }

    fn list(&self) -> SaveResult<Vec<String>> {
        Ok(self.blobs.keys().cloned().collect())
    }
}
