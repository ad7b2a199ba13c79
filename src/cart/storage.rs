//! Durable cart storage.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tempfile::NamedTempFile;
use thiserror::Error;

use super::{Cart, codec};

/// Errors raised by cart storage backends.
#[derive(Debug, Error)]
pub enum CartStorageError {
    /// Reading or writing the backing file failed.
    #[error("cart storage i/o error")]
    Io(#[from] io::Error),

    /// The cart could not be serialised.
    #[error("cart serialisation failed")]
    Encode(#[from] serde_json::Error),

    /// A writer panicked while holding the shared slot.
    #[error("cart storage lock poisoned")]
    Poisoned,
}

/// Somewhere a cart survives between sessions.
///
/// `load` tolerates malformed content and returns whatever could be salvaged.
/// A missing copy loads as an empty cart.
pub trait CartStorage {
    /// Reads the stored cart.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backing medium cannot be read.
    fn load(&self) -> Result<Cart, CartStorageError>;

    /// Replaces the stored cart.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing medium cannot be written.
    fn save(&self, cart: &Cart) -> Result<(), CartStorageError>;

    /// Removes the stored copy entirely.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing medium cannot be written.
    fn clear(&self) -> Result<(), CartStorageError>;
}

/// In-memory storage. Clones share the same slot, which lets two stores
/// stand in for two browsing contexts writing the same cart.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryCartStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-filled with a raw document.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// The raw stored document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CartStorageError::Poisoned`] if the slot is poisoned.
    pub fn raw(&self) -> Result<Option<String>, CartStorageError> {
        Ok(self
            .slot
            .lock()
            .map_err(|_poisoned| CartStorageError::Poisoned)?
            .clone())
    }

    fn replace(&self, value: Option<String>) -> Result<(), CartStorageError> {
        *self
            .slot
            .lock()
            .map_err(|_poisoned| CartStorageError::Poisoned)? = value;

        Ok(())
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> Result<Cart, CartStorageError> {
        Ok(self.raw()?.as_deref().map(codec::decode).unwrap_or_default())
    }

    fn save(&self, cart: &Cart) -> Result<(), CartStorageError> {
        self.replace(Some(codec::encode(cart)?))
    }

    fn clear(&self) -> Result<(), CartStorageError> {
        self.replace(None)
    }
}

/// A JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileCartStorage {
    path: PathBuf,
}

impl FileCartStorage {
    /// Uses the given file path; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for FileCartStorage {
    fn load(&self) -> Result<Cart, CartStorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(codec::decode(&raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Cart::default()),
            Err(error) => Err(error.into()),
        }
    }

    fn save(&self, cart: &Cart) -> Result<(), CartStorageError> {
        let encoded = codec::encode(cart)?;

        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        // Staging names are unique per save.
        let mut staging = NamedTempFile::new_in(parent)?;
        staging.write_all(encoded.as_bytes())?;
        staging.persist(&self.path).map_err(|error| error.error)?;

        Ok(())
    }

    fn clear(&self) -> Result<(), CartStorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
