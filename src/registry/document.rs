//! JSON documents on disk
//!
//! Each document is a `key -> object` map rewritten wholesale on update.
//! Read-modify-write cycles hold a per-document lock, and writes go to a
//! temporary file in the same directory that is renamed over the existing one,
//! so readers never observe a half-written file and concurrent writers never
//! lose each other's keys.

use crate::error::{GatewayError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct JsonDocument<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonDocument<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BTreeMap<String, T>> {
        let _guard = self.guard()?;
        self.read()
    }

    pub fn get(&self, key: &str) -> Result<Option<T>> {
        Ok(self.load()?.remove(key))
    }

    pub fn upsert(&self, key: &str, value: T) -> Result<()> {
        let _guard = self.guard()?;

        let mut content = self.read()?;
        content.insert(key.to_string(), value);
        self.write(&content)?;

        debug!("Wrote key {} to {}", key, self.path.display());
        Ok(())
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| GatewayError::Internal(format!(
            "Lock poisoned for {}",
            self.path.display()
        )))
    }

    fn read(&self) -> Result<BTreeMap<String, T>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| GatewayError::Internal(
            format!("Failed to read {}: {}", self.path.display(), e)
        ))?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| GatewayError::Internal(
            format!("Failed to parse {}: {}", self.path.display(), e)
        ))
    }

    fn write(&self, content: &BTreeMap<String, T>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        fs::create_dir_all(dir).map_err(|e| GatewayError::Internal(
            format!("Failed to create metadata directory: {}", e)
        ))?;

        let serialized = serde_json::to_string_pretty(content).map_err(|e| GatewayError::Internal(
            format!("Failed to serialize {}: {}", self.path.display(), e)
        ))?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serialized.as_bytes())?;
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path).map_err(|e| GatewayError::Internal(
            format!("Failed to replace {}: {}", self.path.display(), e.error)
        ))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let doc: JsonDocument<Value> = JsonDocument::new(temp_dir.path().join("none.json"));
        assert!(doc.load().unwrap().is_empty());
        assert!(doc.get("x").unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites_key() {
        let temp_dir = TempDir::new().unwrap();
        let doc = JsonDocument::new(temp_dir.path().join("nested/doc.json"));

        doc.upsert("a", json!({"v": 1})).unwrap();
        doc.upsert("b", json!({"v": 2})).unwrap();
        doc.upsert("a", json!({"v": 3})).unwrap();

        let content = doc.load().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content["a"], json!({"v": 3}));
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let doc: Arc<JsonDocument<Value>> =
            Arc::new(JsonDocument::new(temp_dir.path().join("model-config.json")));

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let doc = doc.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        doc.upsert(&format!("w{}_{}", writer, i), json!({"writer": writer}))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(doc.load().unwrap().len(), 200);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let doc: JsonDocument<Value> = JsonDocument::new(&path);
        assert!(doc.load().is_err());
    }
}
