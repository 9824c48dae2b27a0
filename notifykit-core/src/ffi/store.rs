use std::sync::Arc;

use crate::codec;
use crate::error::NotifyKitResult;
use crate::keystore::{
    DeviceKeyProvider, DeviceKeystore, FileKeyProvider, KeyAlias, KeyStoreConfig, KeystorePaths,
    SecureKeyStore,
};

/// Topic key store for the host app.
///
/// Every method takes the topic as a plain string; invalid aliases are
/// reported as [`crate::NotifyKitError::InvalidInput`].
#[derive(uniffi::Object)]
pub struct NotifyKeyStore {
    inner: Arc<SecureKeyStore>,
}

impl NotifyKeyStore {
    /// Returns the underlying key store.
    #[must_use]
    pub const fn key_store(&self) -> &Arc<SecureKeyStore> {
        &self.inner
    }
}

#[uniffi::export]
impl NotifyKeyStore {
    /// Creates a key store over the platform keystore.
    ///
    /// With `require_hardware_backing`, key generation fails on devices whose
    /// keystore reports no TEE, StrongBox or Secure Enclave.
    #[uniffi::constructor]
    #[must_use]
    pub fn with_device_keystore(
        keystore: Arc<dyn DeviceKeystore>,
        require_hardware_backing: bool,
    ) -> Arc<Self> {
        let config = KeyStoreConfig {
            require_hardware_backing,
        };
        let provider = Arc::new(DeviceKeyProvider::new(keystore));
        Arc::new(Self {
            inner: Arc::new(SecureKeyStore::with_config(provider, config)),
        })
    }

    /// Creates a software key store persisting keys under `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotifyKitError::StorageUnavailable`] if the keystore
    /// directory cannot be created.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn with_file_storage(paths: Arc<KeystorePaths>) -> NotifyKitResult<Arc<Self>> {
        let provider = FileKeyProvider::open(paths.as_ref().clone())?;
        Ok(Arc::new(Self {
            inner: Arc::new(SecureKeyStore::new(Arc::new(provider))),
        }))
    }

    /// Returns `true` iff a key exists for `alias`.
    #[must_use]
    pub fn exists(&self, alias: String) -> bool {
        KeyAlias::new(alias).is_ok_and(|alias| self.inner.exists(&alias))
    }

    /// Generates the key for `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotifyKitError::KeyAlreadyExists`] if the alias is
    /// taken; the existing key is kept.
    pub fn generate(&self, alias: String) -> NotifyKitResult<()> {
        Ok(self.inner.generate(&KeyAlias::new(alias)?)?)
    }

    /// Seals `plaintext` for `alias`, returning the envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be resolved or sealing fails.
    #[allow(clippy::needless_pass_by_value)]
    pub fn encrypt(
        &self,
        alias: String,
        plaintext: Vec<u8>,
        associated_data: Vec<u8>,
    ) -> NotifyKitResult<Vec<u8>> {
        let key = self.inner.retrieve(&KeyAlias::new(alias)?)?;
        Ok(codec::encrypt(&key, &plaintext, &associated_data)?.into_bytes())
    }

    /// Opens an envelope sealed for `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotifyKitError::AuthenticationFailed`] if the
    /// envelope does not authenticate, or another variant if the key cannot
    /// be resolved.
    #[allow(clippy::needless_pass_by_value)]
    pub fn decrypt(
        &self,
        alias: String,
        envelope: Vec<u8>,
        associated_data: Vec<u8>,
    ) -> NotifyKitResult<Vec<u8>> {
        let key = self.inner.retrieve(&KeyAlias::new(alias)?)?;
        Ok(codec::decrypt(&key, &envelope, &associated_data)?)
    }

    /// Returns whether the key for `alias` has sealed enough envelopes in
    /// this process that it should be rotated.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be resolved.
    pub fn needs_rotation(&self, alias: String) -> NotifyKitResult<bool> {
        Ok(self.inner.retrieve(&KeyAlias::new(alias)?)?.needs_rotation())
    }
}
