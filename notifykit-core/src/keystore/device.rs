//! Platform keystore seam.
//!
//! Android Keystore and the iOS Keychain keep symmetric keys inside the TEE
//! or Secure Enclave and never hand out the key bytes. [`DeviceKeystore`] is
//! implemented on the platform side and does the sealing itself;
//! [`DeviceKeyProvider`] adapts it to [`SecureStorageProvider`] so the key
//! store and the codec work the same over software and hardware keys.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{KeyAlias, KeyHandle, KeySpec, SecureStorageProvider};
use crate::error::{KeyError, KeyResult, NotifyKitError, NotifyKitResult};

/// Device keystore holding one non-exportable ChaCha20-Poly1305 key per
/// alias.
///
/// # Requirements
///
/// - `create_key` MUST be atomic and MUST fail with
///   [`NotifyKitError::KeyAlreadyExists`] rather than replace a key.
/// - `seal` MUST return `nonce(12) || ciphertext || tag(16)` with a fresh
///   random nonce, so envelopes are interchangeable with software keys.
/// - `open_sealed` MUST fail with [`NotifyKitError::AuthenticationFailed`]
///   when the tag does not verify.
#[uniffi::export(with_foreign)]
pub trait DeviceKeystore: Send + Sync {
    /// Creates a 256-bit key under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyKitError::KeyAlreadyExists`] if the alias is taken, or
    /// [`NotifyKitError::StorageUnavailable`] if the keystore refuses.
    fn create_key(&self, alias: String) -> NotifyKitResult<()>;

    /// Returns whether a key exists under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyKitError::StorageUnavailable`] if the keystore cannot
    /// be queried.
    fn contains_key(&self, alias: String) -> NotifyKitResult<bool>;

    /// Seals `plaintext` under the key for `alias`, authenticating
    /// `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is missing or the keystore refuses.
    fn seal(
        &self,
        alias: String,
        associated_data: Vec<u8>,
        plaintext: Vec<u8>,
    ) -> NotifyKitResult<Vec<u8>>;

    /// Opens an envelope sealed under the key for `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyKitError::AuthenticationFailed`] if the envelope or the
    /// associated data was altered, [`NotifyKitError::KeyInvalidated`] if the
    /// platform revoked the key.
    fn open_sealed(
        &self,
        alias: String,
        associated_data: Vec<u8>,
        envelope: Vec<u8>,
    ) -> NotifyKitResult<Vec<u8>>;

    /// Whether keys live in hardware (TEE, StrongBox, Secure Enclave).
    fn is_hardware_backed(&self) -> bool;
}

/// [`SecureStorageProvider`] over a platform [`DeviceKeystore`].
///
/// Handles are cached after the first lookup so every handle for an alias
/// shares one encryption counter for the provider's lifetime.
pub struct DeviceKeyProvider {
    keystore: Arc<dyn DeviceKeystore>,
    handles: RwLock<HashMap<KeyAlias, KeyHandle>>,
}

impl DeviceKeyProvider {
    /// Wraps a platform keystore.
    #[must_use]
    pub fn new(keystore: Arc<dyn DeviceKeystore>) -> Self {
        Self {
            keystore,
            handles: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, alias: &KeyAlias) -> KeyResult<Option<KeyHandle>> {
        let handles = self
            .handles
            .read()
            .map_err(|_| KeyError::backing_store("device handle cache poisoned"))?;
        Ok(handles.get(alias).cloned())
    }

    fn remember(&self, alias: &KeyAlias) -> KeyResult<KeyHandle> {
        let mut handles = self
            .handles
            .write()
            .map_err(|_| KeyError::backing_store("device handle cache poisoned"))?;
        Ok(handles
            .entry(alias.clone())
            .or_insert_with(|| KeyHandle::from_device(alias.clone(), Arc::clone(&self.keystore)))
            .clone())
    }
}

impl SecureStorageProvider for DeviceKeyProvider {
    fn create_key(&self, alias: &KeyAlias, spec: &KeySpec) -> KeyResult<()> {
        spec.ensure_supported()?;
        self.keystore
            .create_key(alias.to_string())
            .map_err(|err| key_error(alias, &err))
    }

    fn get_key(&self, alias: &KeyAlias) -> KeyResult<KeyHandle> {
        if let Some(handle) = self.cached(alias)? {
            return Ok(handle);
        }
        if !self.contains_key(alias)? {
            return Err(KeyError::NotFound {
                alias: alias.clone(),
            });
        }
        self.remember(alias)
    }

    fn contains_key(&self, alias: &KeyAlias) -> KeyResult<bool> {
        self.keystore
            .contains_key(alias.to_string())
            .map_err(|err| key_error(alias, &err))
    }

    fn is_hardware_backed(&self) -> bool {
        self.keystore.is_hardware_backed()
    }
}

fn key_error(alias: &KeyAlias, err: &NotifyKitError) -> KeyError {
    match err {
        NotifyKitError::KeyNotFound { .. } => KeyError::NotFound {
            alias: alias.clone(),
        },
        NotifyKitError::KeyAlreadyExists { .. } => KeyError::AlreadyExists {
            alias: alias.clone(),
        },
        other => KeyError::backing_store(other.to_string()),
    }
}
