//! Cross-process runtime context.
//!
//! A handful of values (current trading date, active signature, whether a
//! trade happened) must be visible to separately launched tool processes.
//! The contract is a tiny key-value capability; the default backend is a
//! single JSON document on disk. Readers treat a missing or corrupt
//! document as empty; writers log failures and continue, because losing a
//! context update must never abort a trading session.

use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Well-known context keys.
pub mod keys {
    pub const TODAY_DATE: &str = "TODAY_DATE";
    pub const SIGNATURE: &str = "SIGNATURE";
    pub const IF_TRADE: &str = "IF_TRADE";
    pub const LOG_PATH: &str = "LOG_PATH";
    pub const MARKET: &str = "MARKET";
}

/// Key-value capability shared by the driver and external tools.
pub trait RuntimeStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Best-effort write; implementations log and swallow failures.
    fn set(&self, key: &str, value: Value);

    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v {
            Value::Bool(b) => Some(b),
            Value::String(s) => Some(matches!(s.as_str(), "true" | "True" | "1")),
            _ => None,
        })
    }

    fn set_str(&self, key: &str, value: &str) {
        self.set(key, Value::String(value.to_string()));
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set(key, Value::Bool(value));
    }
}

/// JSON-document backend. Reads fall back to process environment
/// variables for keys absent from the document, so an operator can still
/// inject values the usual way.
pub struct FileRuntimeStore {
    path: PathBuf,
}

impl FileRuntimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_document(&self) -> Map<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    "Runtime context {} is not a JSON object, treating as empty",
                    self.path.display()
                );
                Map::new()
            }
        }
    }
}

impl RuntimeStore for FileRuntimeStore {
    fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.read_document().get(key) {
            return Some(value.clone());
        }
        std::env::var(key).ok().map(Value::String)
    }

    fn set(&self, key: &str, value: Value) {
        let mut doc = self.read_document();
        doc.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("Failed to create {}: {}", parent.display(), e);
                    return;
                }
            }
        }
        match serde_json::to_string_pretty(&Value::Object(doc)) {
            Ok(body) => {
                if let Err(e) = fs::write(&self.path, body) {
                    warn!(
                        "Failed to persist runtime context {}: {}",
                        self.path.display(),
                        e
                    );
                }
            }
            Err(e) => warn!("Failed to encode runtime context: {}", e),
        }
    }
}

/// In-memory backend for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuntimeStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileRuntimeStore::new(dir.path().join("runtime.json"));

        assert!(store.get(keys::TODAY_DATE).is_none());

        store.set_str(keys::TODAY_DATE, "2025-10-10");
        store.set_bool(keys::IF_TRADE, true);

        assert_eq!(
            store.get_str(keys::TODAY_DATE).as_deref(),
            Some("2025-10-10")
        );
        assert_eq!(store.get_bool(keys::IF_TRADE), Some(true));
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("runtime.json");
        let store = FileRuntimeStore::new(&path);

        store.set_str(keys::SIGNATURE, "demo");

        assert!(path.exists());
        assert_eq!(store.get_str(keys::SIGNATURE).as_deref(), Some("demo"));
    }

    #[test]
    fn test_file_store_tolerates_corrupt_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.json");
        fs::write(&path, "not json at all").unwrap();

        let store = FileRuntimeStore::new(&path);
        assert!(store.get(keys::MARKET).is_none());

        // A write repairs the document.
        store.set_str(keys::MARKET, "cn");
        assert_eq!(store.get_str(keys::MARKET).as_deref(), Some("cn"));
    }

    #[test]
    fn test_file_store_env_fallback() {
        let dir = tempdir().unwrap();
        let store = FileRuntimeStore::new(dir.path().join("runtime.json"));

        std::env::set_var("ASHARE_CTX_TEST_ONLY", "from-env");
        assert_eq!(
            store.get_str("ASHARE_CTX_TEST_ONLY").as_deref(),
            Some("from-env")
        );
        std::env::remove_var("ASHARE_CTX_TEST_ONLY");
    }

    #[test]
    fn test_document_value_wins_over_env() {
        let dir = tempdir().unwrap();
        let store = FileRuntimeStore::new(dir.path().join("runtime.json"));

        std::env::set_var("ASHARE_CTX_SHADOWED", "from-env");
        store.set_str("ASHARE_CTX_SHADOWED", "from-file");
        assert_eq!(
            store.get_str("ASHARE_CTX_SHADOWED").as_deref(),
            Some("from-file")
        );
        std::env::remove_var("ASHARE_CTX_SHADOWED");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.get(keys::IF_TRADE).is_none());

        store.set_bool(keys::IF_TRADE, false);
        assert_eq!(store.get_bool(keys::IF_TRADE), Some(false));

        store.set_str(keys::SIGNATURE, "mem");
        assert_eq!(store.get_str(keys::SIGNATURE).as_deref(), Some("mem"));
    }
}
