//! Key-value persistence for the serialized chain.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::debug;

/// Named slots holding whole string values. Writes replace the slot wholesale.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, slot: &str) -> io::Result<Option<String>>;
    fn put(&self, slot: &str, value: &str) -> io::Result<()>;
    fn remove(&self, slot: &str) -> io::Result<()>;
}

/// Process-local store. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, slot: &str) -> io::Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(slot).cloned())
    }

    fn put(&self, slot: &str, value: &str) -> io::Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> io::Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(slot);
        Ok(())
    }
}

/// One JSON file per slot: `<dir>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: &str) -> io::Result<PathBuf> {
        let valid = !slot.is_empty()
            && slot
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !slot.starts_with('.');
        if !valid {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid slot name '{slot}'"),
            ));
        }
        Ok(self.dir.join(format!("{slot}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, slot: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.slot_path(slot)?) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put(&self, slot: &str, value: &str) -> io::Result<()> {
        let path = self.slot_path(slot)?;
        // Write beside the target and rename, so readers never see half a chain.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!("STORE - wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn remove(&self, slot: &str) -> io::Result<()> {
        match fs::remove_file(self.slot_path(slot)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("score-ledger-store-{}", Uuid::new_v4()))
    }

    #[test]
    fn memory_store_overwrites_slots() {
        let store = MemoryStore::new();
        assert_eq!(store.get("scoreChain").unwrap(), None);
        store.put("scoreChain", "[1]").unwrap();
        store.put("scoreChain", "[2]").unwrap();
        assert_eq!(store.get("scoreChain").unwrap().as_deref(), Some("[2]"));
        store.remove("scoreChain").unwrap();
        assert_eq!(store.get("scoreChain").unwrap(), None);
    }

    #[test]
    fn file_store_round_trips_and_replaces() {
        let dir = scratch_dir();
        let store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get("scoreChain").unwrap(), None);

        store.put("scoreChain", "[\"first\"]").unwrap();
        store.put("scoreChain", "[\"second\"]").unwrap();
        assert_eq!(
            store.get("scoreChain").unwrap().as_deref(),
            Some("[\"second\"]")
        );
        assert!(dir.join("scoreChain.json").exists());
        assert!(!dir.join("scoreChain.json.tmp").exists());

        store.remove("scoreChain").unwrap();
        store.remove("scoreChain").unwrap();
        assert_eq!(store.get("scoreChain").unwrap(), None);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn file_store_rejects_path_like_slots() {
        let dir = scratch_dir();
        let store = FileStore::open(&dir).unwrap();
        for slot in ["", "../escape", "a/b", ".hidden"] {
            let err = store.put(slot, "x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{slot}");
        }
        fs::remove_dir_all(dir).unwrap();
    }
}
