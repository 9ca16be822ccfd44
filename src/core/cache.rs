// src/core/cache.rs

use log::trace;
use std::{any::Any, collections::HashMap};

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Short, stable content hash used to name generated files.
pub fn content_hash(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    let truncated: Vec<u8> = hash.as_bytes().iter().take(HASH_TRUNCATE_LENGTH).copied().collect();
    hex::encode(truncated)
}

/// Memoized facts about one session, such as "is git installed" or the temporary
/// directory. Owned by its session and written only by it.
#[derive(Default)]
pub struct ShellControlCache {
    values: HashMap<String, Box<dyn Any + Send>>,
    applications: HashMap<String, bool>,
}

impl std::fmt::Debug for ShellControlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellControlCache")
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("applications", &self.applications)
            .finish()
    }
}

impl ShellControlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key` if one of type `T` is stored.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.values.get(key)?.downcast_ref::<T>().cloned()
    }

    pub fn set<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Returns the cached value, computing and storing it first on a miss. Failures are
    /// not cached.
    pub fn get_or_try_insert<T, E, F>(&mut self, key: &str, compute: F) -> Result<T, E>
    where
        T: Any + Clone + Send,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get::<T>(key) {
            trace!("Session cache hit for '{}'", key);
            return Ok(value);
        }
        let value = compute()?;
        self.set(key, value.clone());
        Ok(value)
    }

    pub fn application_in_path(&self, name: &str) -> Option<bool> {
        self.applications.get(name).copied()
    }

    pub fn set_application_in_path(&mut self, name: impl Into<String>, present: bool) {
        self.applications.insert(name.into(), present);
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.applications.clear();
    }
}
