//! String key-value persistence boundary.
//!
//! Hosts back this with whatever survives across page loads on their platform (web localStorage,
//! native preference stores). The core only assumes synchronous string get/set/remove.
use std::collections::HashMap;
use std::sync::Mutex;

/// A synchronous string key-value store.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local [`KeyValueStorage`], the default for hosts without durable storage and for
/// tests.
#[derive(Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> InMemoryStorage {
        InMemoryStorage::default()
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self
            .entries
            .lock()
            .expect("thread holding storage lock should not panic");
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self
            .entries
            .lock()
            .expect("thread holding storage lock should not panic");
        entries.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        let mut entries = self
            .entries
            .lock()
            .expect("thread holding storage lock should not panic");
        entries.remove(key);
    }
}
