use std::collections::BTreeMap;

use crate::error::Result;

/// Synchronous string-keyed persistence substrate.
///
/// Writes fully overwrite the prior value; there are no merge semantics at this layer.
pub trait KeyValueStore {
    /// # Errors
    /// Returns [`crate::ApiaryError::Storage`] when the substrate cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    /// Returns [`crate::ApiaryError::Storage`] when the substrate rejects the write.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    /// Returns [`crate::ApiaryError::Storage`] when the substrate rejects the delete.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// # Errors
    /// Returns [`crate::ApiaryError::Storage`] when the substrate cannot be listed.
    fn keys(&self) -> Result<Vec<String>>;

    /// # Errors
    /// Returns [`crate::ApiaryError::Storage`] when the substrate cannot be cleared.
    fn clear(&mut self) -> Result<()>;

    /// Drop every entry and write `entries` in their place.
    ///
    /// Implementations backed by a transactional engine should override this so a
    /// reader never observes a mix of old and new entries.
    ///
    /// # Errors
    /// Returns [`crate::ApiaryError::Storage`] when any write fails.
    fn replace_all(&mut self, entries: &[(String, String)]) -> Result<()> {
        self.clear()?;
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn replace_all(&mut self, entries: &[(String, String)]) -> Result<()> {
        self.entries = entries.iter().cloned().collect();
        Ok(())
    }
}
