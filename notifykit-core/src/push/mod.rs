//! Push-triggered decryption.
//!
//! A push transport hands over a data map naming a topic and an encrypted
//! blob. [`PushReceiver`] makes sure the background worker is running, then
//! [`NotificationDecryptFlow`] resolves the topic's key, opens the blob and
//! reports the plaintext or the failure to a [`PayloadConsumer`]. Host apps
//! receive those reports through a [`NotificationListener`].

mod flow;
mod listener;
mod message;
mod receiver;
#[cfg(test)]
mod tests_utils;

pub use flow::{NotificationDecryptFlow, PayloadConsumer};
pub use listener::{DeliveryFailure, FailureKind, ForeignListener, NotificationListener};
pub use message::{NotifyMessage, PushMessage, BLOB_FIELD, LEGACY_BLOB_FIELD, TOPIC_FIELD};
pub use receiver::{Delivery, PushReceiver};
