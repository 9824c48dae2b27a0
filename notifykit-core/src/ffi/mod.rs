//! Objects exported to Swift and Kotlin.
//!
//! The host app supplies three implementations across the boundary:
//! a [`DeviceKeystore`](crate::keystore::DeviceKeystore) holding the topic
//! keys, a [`PlatformTaskRegistry`](crate::worker::PlatformTaskRegistry)
//! for the background service, and a
//! [`NotificationListener`](crate::push::NotificationListener) receiving the
//! decrypted payloads.
//!
//! # Example (Kotlin)
//!
//! ```kotlin
//! val keyStore = NotifyKeyStore.withDeviceKeystore(AndroidKeystore(), true)
//! keyStore.generate(topic)
//!
//! val receiver = NotifyPushReceiver(keyStore, ServiceRegistry(context), listener)
//! // FirebaseMessagingService.onMessageReceived
//! receiver.onMessage(remoteMessage.data)
//! ```

mod receiver;
mod store;

pub use receiver::{DeliveryReport, NotifyPushReceiver};
pub use store::NotifyKeyStore;
