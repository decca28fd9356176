use std::collections::HashMap;

use crate::{Error, storage::KeyValueStore};

/// A [KeyValueStore] that keeps everything in memory, used for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    /// Add an item, e.g. to set up a store with pre-existing data.
    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_owned(), value.to_owned());
        self
    }

    /// The raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// The number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), Error> {
        self.items.remove(key);
        Ok(())
    }
}
