//! Process-local secure storage provider.
//!
//! Keys live only as long as the provider. Useful for tests and for
//! ephemeral sessions where persistence is handled elsewhere.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{KeyAlias, KeyHandle, KeySpec, SecureStorageProvider};
use crate::error::{KeyError, KeyResult};

/// In-memory key table behind an `RwLock`.
pub struct MemoryKeyProvider {
    keys: RwLock<HashMap<KeyAlias, KeyHandle>>,
    hardware_backed: bool,
    available: AtomicBool,
}

impl MemoryKeyProvider {
    /// Creates an empty software-only provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            hardware_backed: false,
            available: AtomicBool::new(true),
        }
    }

    /// Creates an empty provider that reports itself as hardware-backed.
    #[must_use]
    pub fn hardware_backed() -> Self {
        Self {
            hardware_backed: true,
            ..Self::new()
        }
    }

    /// Simulates the provider going offline (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the key table lock is poisoned.
    pub fn len(&self) -> KeyResult<usize> {
        Ok(self.read()?.len())
    }

    /// Returns `true` if no keys are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the key table lock is poisoned.
    pub fn is_empty(&self) -> KeyResult<bool> {
        Ok(self.read()?.is_empty())
    }

    fn ensure_available(&self) -> KeyResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KeyError::backing_store("memory provider offline"))
        }
    }

    fn read(
        &self,
    ) -> KeyResult<std::sync::RwLockReadGuard<'_, HashMap<KeyAlias, KeyHandle>>> {
        self.keys
            .read()
            .map_err(|_| KeyError::backing_store("key table lock poisoned"))
    }
}

impl Default for MemoryKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStorageProvider for MemoryKeyProvider {
    fn create_key(&self, alias: &KeyAlias, spec: &KeySpec) -> KeyResult<()> {
        self.ensure_available()?;
        spec.ensure_supported()?;
        let mut keys = self
            .keys
            .write()
            .map_err(|_| KeyError::backing_store("key table lock poisoned"))?;
        if keys.contains_key(alias) {
            return Err(KeyError::AlreadyExists {
                alias: alias.clone(),
            });
        }
        keys.insert(alias.clone(), KeyHandle::generate(alias.clone())?);
        Ok(())
    }

    fn get_key(&self, alias: &KeyAlias) -> KeyResult<KeyHandle> {
        self.ensure_available()?;
        self.read()?
            .get(alias)
            .cloned()
            .ok_or_else(|| KeyError::NotFound {
                alias: alias.clone(),
            })
    }

    fn contains_key(&self, alias: &KeyAlias) -> KeyResult<bool> {
        self.ensure_available()?;
        Ok(self.read()?.contains_key(alias))
    }

    fn is_hardware_backed(&self) -> bool {
        self.hardware_backed
    }
}
