//! Common test utilities shared across integration tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use notifykit_core::codec::NONCE_LEN;
use notifykit_core::keystore::KeyAlias;
use notifykit_core::{
    codec, DeliveryFailure, DeviceKeystore, FlowError, MemoryKeyProvider, MemoryTaskRegistry,
    NotificationDecryptFlow, NotificationListener, NotifyKitError, PayloadConsumer,
    PlatformTaskRegistry, PushReceiver, SecureKeyStore, SecureStorageProvider, WorkerCoordinator,
};
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

#[allow(dead_code, reason = "used in tests")]
#[derive(Default)]
pub struct RecordingConsumer {
    plaintexts: Mutex<Vec<(String, Vec<u8>)>>,
    failures: Mutex<Vec<(String, FlowError)>>,
}

#[allow(dead_code, reason = "used in tests")]
impl RecordingConsumer {
    pub fn plaintexts(&self) -> Vec<(String, Vec<u8>)> {
        self.plaintexts.lock().expect("consumer lock").clone()
    }

    pub fn failures(&self) -> Vec<(String, FlowError)> {
        self.failures.lock().expect("consumer lock").clone()
    }
}

impl PayloadConsumer for RecordingConsumer {
    fn on_plaintext(&self, topic: &KeyAlias, plaintext: Vec<u8>) {
        self.plaintexts
            .lock()
            .expect("consumer lock")
            .push((topic.to_string(), plaintext));
    }

    fn on_failure(&self, topic: &KeyAlias, error: &FlowError) {
        self.failures
            .lock()
            .expect("consumer lock")
            .push((topic.to_string(), error.clone()));
    }
}

/// A device wired end to end over the given storage provider.
#[allow(dead_code, reason = "used in tests")]
pub struct TestDevice {
    pub store: Arc<SecureKeyStore>,
    pub registry: Arc<MemoryTaskRegistry>,
    pub consumer: Arc<RecordingConsumer>,
    pub receiver: PushReceiver,
}

#[allow(dead_code, reason = "used in tests")]
impl TestDevice {
    pub fn new(provider: Arc<dyn SecureStorageProvider>) -> Self {
        let store = Arc::new(SecureKeyStore::new(provider));
        let registry = Arc::new(MemoryTaskRegistry::new());
        let consumer = Arc::new(RecordingConsumer::default());
        let flow = NotificationDecryptFlow::new(Arc::clone(&store), consumer.clone());
        let receiver = PushReceiver::new(
            Arc::new(WorkerCoordinator::new(registry.clone())),
            flow,
        );
        Self {
            store,
            registry,
            consumer,
            receiver,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyProvider::new()))
    }

    /// Seals `plaintext` for `topic` the way a sender holding the topic key
    /// would, returning the base64 blob carried in the push data.
    pub fn seal_for(&self, topic: &str, plaintext: &[u8]) -> String {
        let alias = KeyAlias::new(topic).expect("alias");
        let key = self.store.retrieve(&alias).expect("retrieve");
        codec::encrypt(&key, plaintext, &[])
            .expect("encrypt")
            .to_base64()
    }
}

/// Platform keystore stand-in sealing in-process, one key per alias.
#[allow(dead_code, reason = "used in tests")]
#[derive(Default)]
pub struct InMemoryDeviceKeystore {
    keys: Mutex<HashMap<String, [u8; 32]>>,
    locked: AtomicBool,
}

#[allow(dead_code, reason = "used in tests")]
impl InMemoryDeviceKeystore {
    /// Simulates the keystore refusing every operation until unlocked.
    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    fn cipher(&self, alias: &str) -> Result<ChaCha20Poly1305, NotifyKitError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(NotifyKitError::StorageUnavailable {
                detail: "device locked".to_string(),
            });
        }
        let keys = self.keys.lock().expect("keystore lock");
        let key = keys.get(alias).ok_or_else(|| NotifyKitError::KeyNotFound {
            alias: alias.to_string(),
        })?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(key)))
    }
}

impl DeviceKeystore for InMemoryDeviceKeystore {
    fn create_key(&self, alias: String) -> Result<(), NotifyKitError> {
        let mut keys = self.keys.lock().expect("keystore lock");
        if keys.contains_key(&alias) {
            return Err(NotifyKitError::KeyAlreadyExists { alias });
        }
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        keys.insert(alias, key);
        Ok(())
    }

    fn contains_key(&self, alias: String) -> Result<bool, NotifyKitError> {
        Ok(self.keys.lock().expect("keystore lock").contains_key(&alias))
    }

    fn seal(
        &self,
        alias: String,
        associated_data: Vec<u8>,
        plaintext: Vec<u8>,
    ) -> Result<Vec<u8>, NotifyKitError> {
        let cipher = self.cipher(&alias)?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = cipher
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
        let mut out = nonce.to_vec();
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn open_sealed(
        &self,
        alias: String,
        associated_data: Vec<u8>,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, NotifyKitError> {
        let cipher = self.cipher(&alias)?;
        let (nonce, sealed) = envelope.split_at(NONCE_LEN);
        cipher
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

/// Running-service list as the host app would report it.
#[allow(dead_code, reason = "used in tests")]
#[derive(Default)]
pub struct ServiceRegistry {
    running: Mutex<Vec<String>>,
    launches: Mutex<Vec<String>>,
}

#[allow(dead_code, reason = "used in tests")]
impl ServiceRegistry {
    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().expect("registry lock").clone()
    }
}

impl PlatformTaskRegistry for ServiceRegistry {
    fn list_active(&self) -> Result<Vec<String>, NotifyKitError> {
        Ok(self.running.lock().expect("registry lock").clone())
    }

    fn register(&self, identity: String) -> Result<(), NotifyKitError> {
        self.launches
            .lock()
            .expect("registry lock")
            .push(identity.clone());
        self.running.lock().expect("registry lock").push(identity);
        Ok(())
    }

    fn unregister(&self, identity: String) -> Result<(), NotifyKitError> {
        self.running
            .lock()
            .expect("registry lock")
            .retain(|name| *name != identity);
        Ok(())
    }
}

/// Records what the host app's listener would show.
#[allow(dead_code, reason = "used in tests")]
#[derive(Default)]
pub struct RecordingListener {
    plaintexts: Mutex<Vec<(String, Vec<u8>)>>,
    failures: Mutex<Vec<(String, DeliveryFailure)>>,
}

#[allow(dead_code, reason = "used in tests")]
impl RecordingListener {
    pub fn plaintexts(&self) -> Vec<(String, Vec<u8>)> {
        self.plaintexts.lock().expect("listener lock").clone()
    }

    pub fn failures(&self) -> Vec<(String, DeliveryFailure)> {
        self.failures.lock().expect("listener lock").clone()
    }
}

impl NotificationListener for RecordingListener {
    fn on_plaintext(&self, topic: String, plaintext: Vec<u8>) {
        self.plaintexts
            .lock()
            .expect("listener lock")
            .push((topic, plaintext));
    }

    fn on_failure(&self, topic: String, failure: DeliveryFailure) {
        self.failures
            .lock()
            .expect("listener lock")
            .push((topic, failure));
    }
}

pub fn temp_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("notifykit-test-{}", Uuid::new_v4()));
    path
}

#[allow(dead_code, reason = "used in tests")]
pub fn cleanup_root(root: &Path) {
    let _ = std::fs::remove_dir_all(root);
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
