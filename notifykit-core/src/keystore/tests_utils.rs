use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use super::DeviceKeystore;
use crate::codec::NONCE_LEN;
use crate::error::{NotifyKitError, NotifyKitResult};

/// Device keystore doing the sealing in-process, with switches for the
/// platform failures the codec has to handle.
pub struct TestDeviceKeystore {
    keys: Mutex<HashMap<String, [u8; 32]>>,
    invalidated: Mutex<HashSet<String>>,
    available: AtomicBool,
    short_seals: AtomicBool,
}

impl TestDeviceKeystore {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            invalidated: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
            short_seals: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes `seal` drop the last byte of every envelope.
    pub fn set_short_seals(&self, short: bool) {
        self.short_seals.store(short, Ordering::SeqCst);
    }

    /// Simulates the platform revoking the key for `alias`.
    pub fn invalidate(&self, alias: &str) {
        self.invalidated.lock().unwrap().insert(alias.to_string());
    }

    pub fn key_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    fn ensure_available(&self) -> NotifyKitResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(NotifyKitError::StorageUnavailable {
                detail: "keystore locked".to_string(),
            })
        }
    }

    fn cipher(&self, alias: &str) -> NotifyKitResult<ChaCha20Poly1305> {
        let keys = self.keys.lock().unwrap();
        let key = keys.get(alias).ok_or_else(|| NotifyKitError::KeyNotFound {
            alias: alias.to_string(),
        })?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
    }
}

impl DeviceKeystore for TestDeviceKeystore {
    fn create_key(&self, alias: String) -> NotifyKitResult<()> {
        self.ensure_available()?;
        let mut keys = self.keys.lock().unwrap();
        if keys.contains_key(&alias) {
            return Err(NotifyKitError::KeyAlreadyExists { alias });
        }
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        keys.insert(alias, key);
        Ok(())
    }

    fn contains_key(&self, alias: String) -> NotifyKitResult<bool> {
        self.ensure_available()?;
        Ok(self.keys.lock().unwrap().contains_key(&alias))
    }

    fn seal(
        &self,
        alias: String,
        associated_data: Vec<u8>,
        plaintext: Vec<u8>,
    ) -> NotifyKitResult<Vec<u8>> {
        self.ensure_available()?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = self
            .cipher(&alias)?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &associated_data,
                },
            )
            .map_err(|err| NotifyKitError::Crypto {
                detail: err.to_string(),
            })?;
        let mut envelope = nonce.to_vec();
        envelope.extend_from_slice(&sealed);
        if self.short_seals.load(Ordering::SeqCst) {
            envelope.pop();
        }
        Ok(envelope)
    }

    fn open_sealed(
        &self,
        alias: String,
        associated_data: Vec<u8>,
        envelope: Vec<u8>,
    ) -> NotifyKitResult<Vec<u8>> {
        self.ensure_available()?;
        if self.invalidated.lock().unwrap().contains(&alias) {
            return Err(NotifyKitError::KeyInvalidated);
        }
        let (nonce, sealed) = envelope.split_at(NONCE_LEN);
        self.cipher(&alias)?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: &associated_data,
                },
            )
            .map_err(|_| NotifyKitError::AuthenticationFailed)
    }

    fn is_hardware_backed(&self) -> bool {
        true
    }
}
