use std::sync::Arc;

use super::PushMessage;
use crate::codec;
use crate::error::{FlowError, FlowResult};
use crate::keystore::{KeyAlias, SecureKeyStore};

/// Receives the outcome of each decrypted push message.
pub trait PayloadConsumer: Send + Sync {
    /// Called with the plaintext of a message that authenticated.
    fn on_plaintext(&self, topic: &KeyAlias, plaintext: Vec<u8>);

    /// Called when a message could not be opened. No plaintext exists.
    fn on_failure(&self, topic: &KeyAlias, error: &FlowError);
}

/// Resolves the topic key, opens the blob and hands the result downstream.
///
/// There is no retry here; redelivery is the transport's call.
pub struct NotificationDecryptFlow {
    key_store: Arc<SecureKeyStore>,
    consumer: Arc<dyn PayloadConsumer>,
}

impl NotificationDecryptFlow {
    /// Creates a flow delivering to `consumer`.
    #[must_use]
    pub const fn new(key_store: Arc<SecureKeyStore>, consumer: Arc<dyn PayloadConsumer>) -> Self {
        Self {
            key_store,
            consumer,
        }
    }

    /// Decrypts one push message.
    ///
    /// The outcome is reported to the consumer and returned.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Key`] if the topic has no key or storage is unavailable.
    /// - [`FlowError::Decrypt`] if the blob is malformed or does not
    ///   authenticate.
    pub fn handle(&self, message: PushMessage) -> FlowResult<()> {
        let PushMessage { topic, blob } = message;
        match self.open(&topic, &blob) {
            Ok(plaintext) => {
                tracing::debug!(%topic, len = plaintext.len(), "push payload decrypted");
                self.consumer.on_plaintext(&topic, plaintext);
                Ok(())
            }
            Err(err) => {
                if err.is_security_event() {
                    tracing::warn!(%topic, error = %err, "push payload failed authentication");
                } else {
                    tracing::debug!(%topic, error = %err, "push payload not decrypted");
                }
                self.consumer.on_failure(&topic, &err);
                Err(err)
            }
        }
    }

    fn open(&self, topic: &KeyAlias, blob: &[u8]) -> FlowResult<Vec<u8>> {
        let handle = self.key_store.retrieve(topic)?;
        Ok(codec::decrypt(&handle, blob, &[])?)
    }
}
