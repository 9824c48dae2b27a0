//! Opaque key handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};

use super::{DeviceKeystore, KeyAlias};
use crate::error::{KeyError, KeyResult};

/// Length of a symmetric key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Number of encryptions under one key after which random 96-bit nonces are
/// no longer considered collision-safe and the key should be rotated.
pub const NONCE_ROTATION_THRESHOLD: u64 = 1 << 32;

/// Where the key bytes live.
pub enum KeyBacking {
    /// Held in process memory, zeroized on drop.
    Software(SecretBox<[u8; KEY_LEN]>),
    /// Held by the platform keystore; the codec seals and opens through it.
    Device(Arc<dyn DeviceKeystore>),
}

struct KeyMaterial {
    backing: KeyBacking,
    encryptions: AtomicU64,
}

/// Opaque reference to a device-bound symmetric key.
///
/// A handle can only be passed to [`crate::codec::encrypt`] and
/// [`crate::codec::decrypt`]. Software keys never leave the crate: the handle
/// does not implement `Serialize`, its `Debug` output is redacted, and the
/// key is zeroized when the last clone is dropped. Device keys never enter
/// it at all.
///
/// Clones share the same per-key encryption counter.
#[derive(Clone)]
pub struct KeyHandle {
    alias: KeyAlias,
    material: Arc<KeyMaterial>,
}

impl KeyHandle {
    /// Wraps key material produced by a software storage provider.
    #[must_use]
    pub fn from_secret(alias: KeyAlias, secret: SecretBox<[u8; KEY_LEN]>) -> Self {
        Self::with_backing(alias, KeyBacking::Software(secret))
    }

    /// Refers to a non-exportable key held by `keystore` under `alias`.
    #[must_use]
    pub fn from_device(alias: KeyAlias, keystore: Arc<dyn DeviceKeystore>) -> Self {
        Self::with_backing(alias, KeyBacking::Device(keystore))
    }

    fn with_backing(alias: KeyAlias, backing: KeyBacking) -> Self {
        Self {
            alias,
            material: Arc::new(KeyMaterial {
                backing,
                encryptions: AtomicU64::new(0),
            }),
        }
    }

    /// Generates a fresh random key for `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::BackingStoreUnavailable`] if the system RNG fails.
    pub fn generate(alias: KeyAlias) -> KeyResult<Self> {
        let secret = SecretBox::try_init_with_mut(|key: &mut [u8; KEY_LEN]| {
            OsRng
                .try_fill_bytes(key)
                .map_err(|err| KeyError::backing_store(format!("key generation failed: {err}")))
        })?;
        Ok(Self::from_secret(alias, secret))
    }

    /// Returns the alias the key is stored under.
    #[must_use]
    pub const fn alias(&self) -> &KeyAlias {
        &self.alias
    }

    /// Returns `true` if the key bytes are held by a platform keystore.
    #[must_use]
    pub fn is_device_backed(&self) -> bool {
        matches!(self.material.backing, KeyBacking::Device(_))
    }

    /// Returns how many envelopes have been sealed under this key in this
    /// process.
    #[must_use]
    pub fn encryption_count(&self) -> u64 {
        self.material.encryptions.load(Ordering::Relaxed)
    }

    /// Returns `true` once the key has sealed more envelopes than
    /// [`NONCE_ROTATION_THRESHOLD`].
    #[must_use]
    pub fn needs_rotation(&self) -> bool {
        self.encryption_count() > NONCE_ROTATION_THRESHOLD
    }

    /// Counts one encryption and returns the new total.
    pub(crate) fn record_encryption(&self) -> u64 {
        self.material.encryptions.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn backing(&self) -> &KeyBacking {
        &self.material.backing
    }

    /// Returns the key bytes of a software key, `None` for device keys.
    pub(crate) fn software_key(&self) -> Option<&[u8; KEY_LEN]> {
        match &self.material.backing {
            KeyBacking::Software(secret) => Some(secret.expose_secret()),
            KeyBacking::Device(_) => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_encryption_count(&self, count: u64) {
        self.material.encryptions.store(count, Ordering::Relaxed);
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("alias", &self.alias)
            .field("device_backed", &self.is_device_backed())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_is_redacted() {
        let handle = KeyHandle::generate(KeyAlias::new("wc_topic_1").unwrap()).unwrap();
        let rendered = format!("{handle:?}");
        assert!(rendered.contains("wc_topic_1"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(&hex::encode(handle.software_key().unwrap())));
    }

    #[test]
    fn test_generated_keys_differ() {
        let alias = KeyAlias::new("wc_topic_1").unwrap();
        let a = KeyHandle::generate(alias.clone()).unwrap();
        let b = KeyHandle::generate(alias).unwrap();
        assert_ne!(a.software_key(), b.software_key());
        assert!(!a.is_device_backed());
    }

    #[test]
    fn test_clones_share_encryption_counter() {
        let handle = KeyHandle::generate(KeyAlias::new("wc_topic_1").unwrap()).unwrap();
        let clone = handle.clone();
        assert_eq!(handle.record_encryption(), 1);
        assert_eq!(clone.record_encryption(), 2);
        assert_eq!(handle.encryption_count(), 2);
        assert!(!handle.needs_rotation());

        clone.set_encryption_count(NONCE_ROTATION_THRESHOLD + 1);
        assert!(handle.needs_rotation());
    }

    #[test]
    fn test_device_key_is_not_exportable() {
        let keystore = Arc::new(super::super::tests_utils::TestDeviceKeystore::new());
        let handle = KeyHandle::from_device(KeyAlias::new("wc_topic_1").unwrap(), keystore);
        assert!(handle.is_device_backed());
        assert!(handle.software_key().is_none());
        assert!(format!("{handle:?}").contains("device_backed: true"));
    }
}
