//! Secure storage provider interface.
//!
//! The key store depends on the platform only through
//! [`SecureStorageProvider`]. Platform implementations should use
//! hardware-backed keystores where available:
//! - Android: Android Keystore with StrongBox or TEE-backed keys
//! - iOS: Keychain Services with `kSecAttrAccessibleAfterFirstUnlockThisDeviceOnly`
//! - Desktop/CLI: [`super::FileKeyProvider`] (software only, for development)

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{KeyAlias, KeyHandle};
use crate::error::{KeyError, KeyResult};

const KEY_BITS: u16 = 256;

/// AEAD algorithm a key is created for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum KeyAlgorithm {
    /// ChaCha20-Poly1305 (RFC 8439): 256-bit key, 96-bit nonce, 128-bit tag.
    #[strum(serialize = "chacha20-poly1305")]
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

/// Operations a key may be used for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    /// Sealing and opening payload envelopes.
    EncryptDecrypt,
}

/// Parameters passed to the provider when a key is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    /// What the key may be used for.
    pub purpose: KeyPurpose,
    /// Cipher the key is bound to.
    pub algorithm: KeyAlgorithm,
    /// Key size in bits.
    pub key_bits: u16,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self {
            purpose: KeyPurpose::EncryptDecrypt,
            algorithm: KeyAlgorithm::ChaCha20Poly1305,
            key_bits: KEY_BITS,
        }
    }
}

impl KeySpec {
    /// Checks that the requested key parameters are ones this crate can use.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::BackingStoreUnavailable`] for key sizes other than
    /// 256 bits.
    pub fn ensure_supported(&self) -> KeyResult<()> {
        if self.key_bits != KEY_BITS {
            return Err(KeyError::backing_store(format!(
                "unsupported key size for {}: {} bits",
                self.algorithm, self.key_bits
            )));
        }
        Ok(())
    }
}

/// Secure storage holding device-bound symmetric keys.
///
/// # Requirements
///
/// - `create_key` MUST be atomic: two concurrent calls for the same alias
///   must produce exactly one key and one [`KeyError::AlreadyExists`].
/// - Existing keys MUST NOT be overwritten.
/// - Keys SHOULD be non-exportable and bound to the device (not restored
///   from backups).
pub trait SecureStorageProvider: Send + Sync {
    /// Creates a key under `alias` if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::AlreadyExists`] if the alias is taken, or
    /// [`KeyError::BackingStoreUnavailable`] if storage cannot be reached.
    fn create_key(&self, alias: &KeyAlias, spec: &KeySpec) -> KeyResult<()>;

    /// Returns a handle to the key stored under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotFound`] if no key exists, or
    /// [`KeyError::BackingStoreUnavailable`] if storage cannot be reached.
    fn get_key(&self, alias: &KeyAlias) -> KeyResult<KeyHandle>;

    /// Returns whether a key exists under `alias` without loading it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::BackingStoreUnavailable`] if storage cannot be reached.
    fn contains_key(&self, alias: &KeyAlias) -> KeyResult<bool>;

    /// Whether keys live in hardware (TEE, StrongBox, Secure Enclave).
    fn is_hardware_backed(&self) -> bool;
}
