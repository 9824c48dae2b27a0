//! Device-bound symmetric key lifecycle.
//!
//! [`SecureKeyStore`] creates, checks and resolves one 256-bit key per
//! [`KeyAlias`] through a platform [`SecureStorageProvider`]. Keys are never
//! overwritten and never leave the store except as an opaque [`KeyHandle`].

mod alias;
mod device;
mod file;
mod handle;
mod lock;
mod memory;
mod paths;
mod provider;
#[cfg(test)]
pub(crate) mod tests_utils;

use std::sync::Arc;

pub use alias::KeyAlias;
pub use device::{DeviceKeyProvider, DeviceKeystore};
pub use file::FileKeyProvider;
pub(crate) use handle::KeyBacking;
pub use handle::{KeyHandle, KEY_LEN, NONCE_ROTATION_THRESHOLD};
pub use memory::MemoryKeyProvider;
pub use paths::KeystorePaths;
pub use provider::{KeyAlgorithm, KeyPurpose, KeySpec, SecureStorageProvider};

use crate::error::{KeyError, KeyResult};

/// Key store policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStoreConfig {
    /// Refuse to generate keys on providers that are not hardware-backed.
    pub require_hardware_backing: bool,
}

/// Owns the key material for every push topic on this device.
///
/// Reads are safe to run concurrently for any alias. Creation atomicity is
/// delegated to the provider.
pub struct SecureKeyStore {
    provider: Arc<dyn SecureStorageProvider>,
    config: KeyStoreConfig,
}

impl SecureKeyStore {
    /// Creates a key store with the default policy.
    #[must_use]
    pub fn new(provider: Arc<dyn SecureStorageProvider>) -> Self {
        Self::with_config(provider, KeyStoreConfig::default())
    }

    /// Creates a key store with an explicit policy.
    #[must_use]
    pub const fn with_config(
        provider: Arc<dyn SecureStorageProvider>,
        config: KeyStoreConfig,
    ) -> Self {
        Self { provider, config }
    }

    /// Returns `true` iff a key has been generated under `alias`.
    ///
    /// A provider failure is logged and reported as `false`; use
    /// [`Self::try_exists`] to observe it.
    #[must_use]
    pub fn exists(&self, alias: &KeyAlias) -> bool {
        self.try_exists(alias).unwrap_or_else(|err| {
            tracing::warn!(%alias, error = %err, "key existence check failed");
            false
        })
    }

    /// Returns whether a key exists under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::BackingStoreUnavailable`] on provider failure.
    pub fn try_exists(&self, alias: &KeyAlias) -> KeyResult<bool> {
        self.provider.contains_key(alias)
    }

    /// Creates a new 256-bit key under `alias`.
    ///
    /// # Errors
    ///
    /// - [`KeyError::AlreadyExists`] if the alias is taken. The existing key is
    ///   left untouched.
    /// - [`KeyError::BackingStoreUnavailable`] if the provider is unreachable,
    ///   or hardware backing is required and the provider lacks it.
    pub fn generate(&self, alias: &KeyAlias) -> KeyResult<()> {
        if self.config.require_hardware_backing && !self.provider.is_hardware_backed() {
            return Err(KeyError::backing_store(
                "device lacks hardware-backed key storage",
            ));
        }
        match self.provider.create_key(alias, &KeySpec::default()) {
            Ok(()) => {
                tracing::info!(%alias, "generated device-bound key");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(%alias, error = %err, "key generation refused");
                Err(err)
            }
        }
    }

    /// Resolves the key stored under `alias`.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NotFound`] if no key was generated under `alias`.
    /// - [`KeyError::BackingStoreUnavailable`] on provider failure.
    pub fn retrieve(&self, alias: &KeyAlias) -> KeyResult<KeyHandle> {
        self.provider.get_key(alias)
    }
}
