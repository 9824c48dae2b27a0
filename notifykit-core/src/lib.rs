#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Device-bound encryption for push notification payloads.
//!
//! A sender seals a payload for a topic with [`codec::encrypt`]. The device
//! holds the only copy of the topic key in a [`SecureKeyStore`]. When a push
//! arrives, a [`PushReceiver`] makes sure the background decryption worker is
//! running exactly once and the [`NotificationDecryptFlow`] opens the payload.
//!
//! Swift and Kotlin hosts use the [`ffi`] objects and supply the platform
//! keystore, task registry and listener through foreign traits.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use notifykit_core::{codec, KeyAlias, MemoryKeyProvider, SecureKeyStore};
//!
//! let store = SecureKeyStore::new(Arc::new(MemoryKeyProvider::new()));
//! let topic = KeyAlias::new("wc_topic_1").unwrap();
//! store.generate(&topic).unwrap();
//!
//! let key = store.retrieve(&topic).unwrap();
//! let envelope = codec::encrypt(&key, b"HelloWalletConnect", &[]).unwrap();
//! let plaintext = codec::decrypt(&key, envelope.as_bytes(), &[]).unwrap();
//! assert_eq!(plaintext, b"HelloWalletConnect");
//! ```

pub mod codec;

mod error;
pub use error::*;

pub mod keystore;
pub use keystore::{
    DeviceKeyProvider, DeviceKeystore, FileKeyProvider, KeyAlias, KeyHandle, KeyStoreConfig,
    KeystorePaths, MemoryKeyProvider, SecureKeyStore, SecureStorageProvider,
};

pub mod ffi;
pub use ffi::{DeliveryReport, NotifyKeyStore, NotifyPushReceiver};

pub mod logger;

pub mod push;
pub use push::{
    DeliveryFailure, FailureKind, NotificationDecryptFlow, NotificationListener, PayloadConsumer,
    PushMessage, PushReceiver,
};

pub mod worker;
pub use worker::{
    MemoryTaskRegistry, PlatformTaskRegistry, StartOutcome, StopOutcome, TaskRegistry,
    WorkerCoordinator,
};

uniffi::setup_scaffolding!("notifykit_core");
