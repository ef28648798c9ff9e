//! On-disk JSON document stores.
//!
//! Three small documents back the UI forms: the flat task configuration,
//! the nested delay settings and the staged account submission. Loads are
//! size-bounded, saves go through a tmp file and a rename.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde_json::{Map, Value};
use thiserror::Error;

use taskdesk_core::document;

/// Defensive bound: the documents are expected to be tiny; this prevents
/// pathological reads if one is corrupted or replaced.
pub const MAX_DOCUMENT_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metadata read failed: {0}")]
    Metadata(io::Error),
    #[error("document too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("read failed: {0}")]
    Read(io::Error),
    #[error("parse failed: {0}")]
    Parse(serde_json::Error),
    #[error("document root is not an object")]
    NotAnObject,
    #[error("serialize failed: {0}")]
    Serialize(serde_json::Error),
    #[error("tmp write failed: {0}")]
    WriteTmp(io::Error),
    #[error("rename failed: {0}")]
    Rename(io::Error),
    #[error(transparent)]
    Invalid(#[from] taskdesk_core::CoreError),
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty document unless one already exists.
    pub fn ensure_exists(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&Map::new())
    }

    pub fn get_all(&self) -> Result<Map<String, Value>, StoreError> {
        let meta = fs::metadata(&self.path).map_err(StoreError::Metadata)?;
        if meta.len() > MAX_DOCUMENT_BYTES {
            return Err(StoreError::TooLarge {
                size: meta.len(),
                max: MAX_DOCUMENT_BYTES,
            });
        }

        let data = fs::read_to_string(&self.path).map_err(StoreError::Read)?;
        let value: Value = serde_json::from_str(&data).map_err(StoreError::Parse)?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get_all()?.get(key).cloned())
    }

    pub fn get_path(&self, keys: &[&str]) -> Result<Option<Value>, StoreError> {
        Ok(document::get_path(&self.get_all()?, keys).cloned())
    }

    pub fn update(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut doc = self.get_all()?;
        doc.insert(key.to_owned(), value);
        self.save(&doc)
    }

    /// Update a nested key, creating intermediate objects as needed.
    pub fn update_path(&self, keys: &[&str], value: Value) -> Result<(), StoreError> {
        let mut root = Value::Object(self.get_all()?);
        document::set_path(&mut root, keys, value)?;
        match root {
            Value::Object(map) => self.save(&map),
            _ => Err(StoreError::NotAnObject),
        }
    }

    pub fn save(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(doc).map_err(StoreError::Serialize)?;
        fs::write(&tmp, payload).map_err(StoreError::WriteTmp)?;

        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
        fs::rename(&tmp, &self.path).map_err(StoreError::Rename)?;
        Ok(())
    }
}
